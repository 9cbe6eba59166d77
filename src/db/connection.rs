use anyhow::Result;

/// Storage backend the application runs on.
///
/// The ids are persisted in settings and used as selector payloads, so they
/// must not change without a settings migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverChoice {
    Sqlite,
    NetworkedSql,
}

impl DriverChoice {
    pub const SQLITE_ID: &'static str = "sqlite";
    pub const NETWORKED_SQL_ID: &'static str = "networked-sql";

    pub fn id(self) -> &'static str {
        match self {
            DriverChoice::Sqlite => Self::SQLITE_ID,
            DriverChoice::NetworkedSql => Self::NETWORKED_SQL_ID,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            Self::SQLITE_ID => Some(DriverChoice::Sqlite),
            Self::NETWORKED_SQL_ID => Some(DriverChoice::NetworkedSql),
            _ => None,
        }
    }
}

/// What the networked SQL driver needs to reach its server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub row_count: Option<usize>,
}

pub trait DatabaseConnection: Send {
    fn driver(&self) -> DriverChoice;
    /// File path, `:memory:` or `host:port/database`.
    fn location(&self) -> String;
    fn list_tables(&mut self) -> Result<Vec<TableInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_ids_are_stable() {
        assert_eq!(DriverChoice::Sqlite.id(), "sqlite");
        assert_eq!(DriverChoice::NetworkedSql.id(), "networked-sql");
        assert_eq!(DriverChoice::from_id("networked-sql"), Some(DriverChoice::NetworkedSql));
        assert_eq!(DriverChoice::from_id("QMYSQL"), None);
    }
}
