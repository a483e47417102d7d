use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::SqlTemplateError;

use super::connection::SqliteDriver;

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteOptions {
    /// Database file, or `:memory:`.
    pub db_path: String,
    pub wal: bool,
    /// Busy timeout used when the statement policy sets none.
    pub busy_timeout_secs: Option<u64>,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self::new(":memory:".to_string())
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            wal: false,
            busy_timeout_secs: None,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    #[must_use]
    pub fn with_busy_timeout_secs(mut self, secs: u64) -> Self {
        self.busy_timeout_secs = Some(secs);
        self
    }

    /// Open the connection described by these options.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::SqliteError` if the database cannot be opened or the
    /// pragmas fail.
    pub fn open(&self) -> Result<SqliteDriver, SqlTemplateError> {
        let conn = if self.db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&self.db_path)?
        };

        if self.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        if let Some(secs) = self.busy_timeout_secs {
            conn.busy_timeout(Duration::from_secs(secs))?;
        }
        tracing::debug!(db_path = %self.db_path, wal = self.wal, "opened sqlite connection");
        Ok(SqliteDriver::new(conn))
    }
}
