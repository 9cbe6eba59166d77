use anyhow::{Context, Result};
use mysql::prelude::*;
use mysql::{Conn, Opts, OptsBuilder, Pool, PooledConn, Row};
use std::io;
use std::net::ToSocketAddrs;
use std::time::Duration;
use tracing::debug;

use super::connection::{ConnectionParams, DatabaseConnection, DriverChoice, TableInfo};
use super::factory::{ConnectionTester, TestCode};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn opts(params: &ConnectionParams, with_database: bool) -> Opts {
    let db_name = if with_database && !params.database.is_empty() {
        Some(params.database.clone())
    } else {
        None
    };

    OptsBuilder::new()
        .ip_or_hostname(Some(params.hostname.clone()))
        .tcp_port(params.port)
        .user(Some(params.username.clone()))
        .pass(Some(params.password.clone()))
        .db_name(db_name)
        .tcp_connect_timeout(Some(CONNECT_TIMEOUT))
        .into()
}

pub struct MySQLConnection {
    conn: PooledConn,
    location: String,
}

impl MySQLConnection {
    pub fn connect(params: &ConnectionParams) -> Result<Box<dyn DatabaseConnection>> {
        let location = format!("{}:{}/{}", params.hostname, params.port, params.database);
        let pool = Pool::new(opts(params, true))
            .with_context(|| format!("Failed to reach MySQL server at {}", location))?;
        let conn = pool.get_conn()?;

        Ok(Box::new(MySQLConnection { conn, location }))
    }
}

impl DatabaseConnection for MySQLConnection {
    fn driver(&self) -> DriverChoice {
        DriverChoice::NetworkedSql
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn list_tables(&mut self) -> Result<Vec<TableInfo>> {
        let result: Vec<Row> = self.conn.query("SHOW TABLES")?;

        let mut tables = Vec::new();
        for row in result {
            let table_name: String = row.get(0).unwrap_or_default();

            let count_query = format!("SELECT COUNT(*) FROM `{}`", table_name.replace('`', "``"));
            let count: Option<u64> = self.conn.query_first(&count_query)?;

            tables.push(TableInfo {
                name: table_name,
                row_count: count.map(|c| c as usize),
            });
        }

        Ok(tables)
    }
}

/// Probes a MySQL/MariaDB server with a single short-lived connection.
#[derive(Debug, Default)]
pub struct MySqlTester;

impl MySqlTester {
    fn classify(error: &mysql::Error) -> TestCode {
        match error {
            mysql::Error::MySqlError(e) => TestCode::from_server_code(e.code),
            mysql::Error::IoError(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                TestCode::CantConnect
            }
            mysql::Error::IoError(_) | mysql::Error::DriverError(_) => TestCode::ConnectionError,
            _ => TestCode::UnknownError,
        }
    }
}

impl ConnectionTester for MySqlTester {
    fn test(&self, params: &ConnectionParams) -> TestCode {
        if (params.hostname.as_str(), params.port).to_socket_addrs().is_err() {
            return TestCode::UnknownHost;
        }

        match Conn::new(opts(params, true)) {
            Ok(_) => TestCode::Ok,
            Err(e) => {
                debug!(error = %e, host = %params.hostname, "MySQL test connection failed");
                Self::classify(&e)
            }
        }
    }
}
