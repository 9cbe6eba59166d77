use anyhow::{Context, Result};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

use super::connection::{DatabaseConnection, DriverChoice, TableInfo};

pub struct SQLiteConnection {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SQLiteConnection {
    pub fn open(path: &Path) -> Result<Box<dyn DatabaseConnection>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        Ok(Box::new(SQLiteConnection {
            conn,
            path: Some(path.to_path_buf()),
        }))
    }

    pub fn open_in_memory() -> Result<Box<dyn DatabaseConnection>> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Ok(Box::new(SQLiteConnection { conn, path: None }))
    }
}

impl DatabaseConnection for SQLiteConnection {
    fn driver(&self) -> DriverChoice {
        DriverChoice::Sqlite
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }

    fn list_tables(&mut self) -> Result<Vec<TableInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut table_infos = Vec::new();
        for table in tables {
            let count: Result<usize, _> = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\"")),
                [],
                |row| row.get(0),
            );
            table_infos.push(TableInfo {
                name: table,
                row_count: count.ok(),
            });
        }

        Ok(table_infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn in_memory_database_starts_empty() {
        let mut conn = SQLiteConnection::open_in_memory().unwrap();
        assert_eq!(conn.location(), ":memory:");
        assert!(conn.list_tables().unwrap().is_empty());
    }

    #[test]
    fn lists_tables_with_row_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local").join("database.db");

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        {
            let raw = Connection::open(&path).unwrap();
            raw.execute_batch(
                "CREATE TABLE Feeds (id INTEGER PRIMARY KEY, url TEXT);
                 INSERT INTO Feeds (url) VALUES ('https://example.com/a.xml'), ('https://example.com/b.xml');
                 CREATE TABLE Messages (id INTEGER PRIMARY KEY);",
            )
            .unwrap();
        }

        let mut conn = SQLiteConnection::open(&path).unwrap();
        let tables = conn.list_tables().unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "Feeds");
        assert_eq!(tables[0].row_count, Some(2));
        assert_eq!(tables[1].name, "Messages");
        assert_eq!(tables[1].row_count, Some(0));
    }
}
