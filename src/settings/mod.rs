pub mod database;

pub use database::{DatabasePanel, StatusLevel};
