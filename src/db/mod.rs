pub mod connection;
pub mod factory;
#[cfg(feature = "networked-sql")]
pub mod mysql;
pub mod sqlite;

pub use connection::{ConnectionParams, DriverChoice};
pub use factory::{ConnectionTester, Drivers, TestCode};
