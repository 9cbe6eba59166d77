//! Driver availability, connection testing and opening of the active backend.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::connection::{ConnectionParams, DatabaseConnection, DriverChoice, TableInfo};
use super::sqlite::SQLiteConnection;
use crate::config::{database, Settings};
use crate::crypto::CredentialCodec;

/// Which drivers this build can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drivers {
    networked_sql: bool,
}

impl Drivers {
    pub fn detect() -> Self {
        Self {
            networked_sql: cfg!(feature = "networked-sql"),
        }
    }

    pub fn sqlite_only() -> Self {
        Self {
            networked_sql: false,
        }
    }

    pub fn with_networked_sql() -> Self {
        Self {
            networked_sql: true,
        }
    }

    pub fn is_available(self, driver: DriverChoice) -> bool {
        match driver {
            DriverChoice::Sqlite => true,
            DriverChoice::NetworkedSql => self.networked_sql,
        }
    }
}

pub fn human_driver_name(driver: DriverChoice) -> &'static str {
    match driver {
        DriverChoice::Sqlite => "SQLite (embedded database)",
        DriverChoice::NetworkedSql => "MySQL/MariaDB (dedicated database)",
    }
}

/// Closed set of outcomes of a connection probe. Server error numbers are
/// kept where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCode {
    Ok,
    AccessDenied,
    UnknownDatabase,
    ConnectionError,
    CantConnect,
    UnknownHost,
    UnknownError,
}

impl TestCode {
    pub fn from_server_code(code: u16) -> Self {
        match code {
            1045 => TestCode::AccessDenied,
            1049 => TestCode::UnknownDatabase,
            2002 => TestCode::ConnectionError,
            2003 => TestCode::CantConnect,
            2005 => TestCode::UnknownHost,
            _ => TestCode::UnknownError,
        }
    }

    /// Whether the server is usable: a missing database is created on first
    /// start, so it counts as reachable.
    pub fn is_reachable(self) -> bool {
        matches!(self, TestCode::Ok | TestCode::UnknownDatabase)
    }
}

pub trait ConnectionTester: Send + Sync {
    fn test(&self, params: &ConnectionParams) -> TestCode;

    fn interpret(&self, code: TestCode) -> String {
        match code {
            TestCode::Ok => "MySQL server works as expected.",
            TestCode::UnknownDatabase => {
                "Selected database does not exist (yet). It will be created. It's okay."
            }
            TestCode::CantConnect | TestCode::ConnectionError => {
                "No MySQL server is running in the target destination."
            }
            TestCode::UnknownHost => "Hostname could not be resolved.",
            TestCode::AccessDenied => "Access denied. Invalid username or password used.",
            TestCode::UnknownError => "Unknown error.",
        }
        .to_string()
    }
}

/// Tester for the networked driver, if this build has one.
#[cfg(feature = "networked-sql")]
pub fn default_tester() -> Option<Arc<dyn ConnectionTester>> {
    Some(Arc::new(super::mysql::MySqlTester))
}

#[cfg(not(feature = "networked-sql"))]
pub fn default_tester() -> Option<Arc<dyn ConnectionTester>> {
    None
}

pub fn sqlite_database_path() -> Result<PathBuf> {
    Ok(Settings::data_dir()?
        .join("database")
        .join("local")
        .join("database.db"))
}

/// Networked profile as currently persisted, password decoded.
pub fn persisted_params(settings: &Settings, codec: &dyn CredentialCodec) -> ConnectionParams {
    ConnectionParams {
        hostname: settings.value(&database::MYSQL_HOSTNAME),
        port: settings.value(&database::MYSQL_PORT),
        database: settings.value(&database::MYSQL_DATABASE),
        username: settings.value(&database::MYSQL_USERNAME),
        password: codec.decode(&settings.value(&database::MYSQL_PASSWORD)),
    }
}

/// The driver the application should run on. Unknown or unavailable ids
/// fall back to SQLite.
pub fn active_driver(settings: &Settings, drivers: Drivers) -> DriverChoice {
    let id = settings.value(&database::ACTIVE_DRIVER);
    match DriverChoice::from_id(&id) {
        Some(driver) if drivers.is_available(driver) => driver,
        Some(driver) => {
            warn!(driver = driver.id(), "active driver is not available, using SQLite");
            DriverChoice::Sqlite
        }
        None => {
            warn!(driver = %id, "unknown active driver, using SQLite");
            DriverChoice::Sqlite
        }
    }
}

pub fn open_active(
    settings: &Settings,
    drivers: Drivers,
    codec: &dyn CredentialCodec,
) -> Result<Box<dyn DatabaseConnection>> {
    match active_driver(settings, drivers) {
        DriverChoice::Sqlite => {
            if settings.value(&database::USE_IN_MEMORY) {
                SQLiteConnection::open_in_memory()
            } else {
                SQLiteConnection::open(&sqlite_database_path()?)
            }
        }
        DriverChoice::NetworkedSql => open_networked(&persisted_params(settings, codec)),
    }
}

#[cfg(feature = "networked-sql")]
fn open_networked(params: &ConnectionParams) -> Result<Box<dyn DatabaseConnection>> {
    super::mysql::MySQLConnection::connect(params)
}

#[cfg(not(feature = "networked-sql"))]
fn open_networked(_params: &ConnectionParams) -> Result<Box<dyn DatabaseConnection>> {
    anyhow::bail!("this build has no networked SQL driver")
}

/// What the main window shows about the running backend.
#[derive(Debug, Clone)]
pub struct BackendSummary {
    pub driver: DriverChoice,
    pub location: String,
    pub tables: Vec<TableInfo>,
}

pub fn describe_active(
    settings: &Settings,
    drivers: Drivers,
    codec: &dyn CredentialCodec,
) -> Result<BackendSummary> {
    let mut conn = open_active(settings, drivers, codec)?;
    let tables = conn.list_tables()?;
    info!(
        driver = conn.driver().id(),
        location = %conn.location(),
        tables = tables.len(),
        "storage backend opened"
    );
    Ok(BackendSummary {
        driver: conn.driver(),
        location: conn.location(),
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DefaultTexts;

    impl ConnectionTester for DefaultTexts {
        fn test(&self, _params: &ConnectionParams) -> TestCode {
            TestCode::Ok
        }
    }

    #[test]
    fn sqlite_is_always_available() {
        assert!(Drivers::sqlite_only().is_available(DriverChoice::Sqlite));
        assert!(!Drivers::sqlite_only().is_available(DriverChoice::NetworkedSql));
        assert!(Drivers::with_networked_sql().is_available(DriverChoice::NetworkedSql));
    }

    #[test]
    fn server_codes_map_to_test_codes() {
        assert_eq!(TestCode::from_server_code(1045), TestCode::AccessDenied);
        assert_eq!(TestCode::from_server_code(1049), TestCode::UnknownDatabase);
        assert_eq!(TestCode::from_server_code(2003), TestCode::CantConnect);
        assert_eq!(TestCode::from_server_code(1234), TestCode::UnknownError);
    }

    #[test]
    fn only_ok_and_missing_database_are_reachable() {
        assert!(TestCode::Ok.is_reachable());
        assert!(TestCode::UnknownDatabase.is_reachable());
        assert!(!TestCode::AccessDenied.is_reachable());
        assert!(!TestCode::CantConnect.is_reachable());
        assert!(!TestCode::UnknownError.is_reachable());
    }

    #[test]
    fn default_interpretations_are_distinct_for_failures() {
        let tester = DefaultTexts;
        assert_ne!(
            tester.interpret(TestCode::AccessDenied),
            tester.interpret(TestCode::UnknownError)
        );
        assert_eq!(tester.interpret(TestCode::Ok), "MySQL server works as expected.");
    }

    #[test]
    fn unavailable_active_driver_falls_back_to_sqlite() {
        let mut settings = Settings::in_memory();
        settings
            .set_value(&database::ACTIVE_DRIVER, &"networked-sql".to_string())
            .unwrap();
        assert_eq!(active_driver(&settings, Drivers::sqlite_only()), DriverChoice::Sqlite);
        assert_eq!(
            active_driver(&settings, Drivers::with_networked_sql()),
            DriverChoice::NetworkedSql
        );

        settings
            .set_value(&database::ACTIVE_DRIVER, &"QPSQL".to_string())
            .unwrap();
        assert_eq!(
            active_driver(&settings, Drivers::with_networked_sql()),
            DriverChoice::Sqlite
        );
    }

    #[test]
    fn in_memory_backend_is_described() {
        let mut settings = Settings::in_memory();
        settings.set_value(&database::USE_IN_MEMORY, &true).unwrap();
        let codec = crate::crypto::TextCodec::default();

        let summary = describe_active(&settings, Drivers::sqlite_only(), &codec).unwrap();
        assert_eq!(summary.driver, DriverChoice::Sqlite);
        assert_eq!(summary.location, ":memory:");
        assert!(summary.tables.is_empty());
    }
}
