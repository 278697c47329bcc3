//! PostgreSQL-backed connection.

use std::io::Read;

use postgres::{Client, NoTls};

use crate::error::{Error, Result};

use super::{Connector, DbConn};

fn db_err(e: postgres::Error) -> Error {
    Error::Database(e.to_string())
}

/// Connector building sync clients from a connection string or the
/// standard `PG*` environment variables.
pub struct PgConnector {
    config: postgres::Config,
}

impl PgConnector {
    /// Builds a connector from a `postgres://` URI or keyword string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] for an unparsable connection string.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let config = dsn.parse::<postgres::Config>().map_err(db_err)?;
        Ok(Self { config })
    }

    /// Builds a connector from `PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`,
    /// and `PGDATABASE`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = postgres::Config::new();
        if let Ok(host) = std::env::var("PGHOST") {
            config.host(&host);
        }
        if let Ok(port) = std::env::var("PGPORT") {
            if let Ok(port) = port.parse() {
                config.port(port);
            }
        }
        if let Ok(user) = std::env::var("PGUSER") {
            config.user(&user);
        }
        if let Ok(password) = std::env::var("PGPASSWORD") {
            config.password(&password);
        }
        if let Ok(dbname) = std::env::var("PGDATABASE") {
            config.dbname(&dbname);
        }
        Self { config }
    }
}

impl Connector for PgConnector {
    fn connect(&self) -> Result<Box<dyn DbConn>> {
        let client = self.config.connect(NoTls).map_err(db_err)?;
        Ok(Box::new(PgConn { client }))
    }
}

/// One sync client connection.
pub struct PgConn {
    client: Client,
}

impl DbConn for PgConn {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        self.client.execute(sql, &[]).map_err(db_err)
    }

    fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).map_err(db_err)
    }

    fn query_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>> {
        let rows = self.client.query(sql, &[]).map_err(db_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(row.len());
            for index in 0..row.len() {
                cells.push(row.try_get::<_, Option<String>>(index).map_err(db_err)?);
            }
            out.push(cells);
        }
        Ok(out)
    }

    fn copy_out<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Read + 'a>> {
        let reader = self.client.copy_out(sql).map_err(db_err)?;
        Ok(Box::new(reader))
    }

    fn copy_in(&mut self, sql: &str, data: &mut dyn Read) -> Result<u64> {
        let mut writer = self.client.copy_in(sql).map_err(db_err)?;
        std::io::copy(data, &mut writer)?;
        writer.finish().map_err(db_err)
    }
}
