use std::fmt;
use std::time::Duration;

use rusqlite::types::Value as SqliteValue;
use rusqlite::{Connection, Rows, Statement};

use crate::driver::{Cursor, Driver, DriverStatement, ResultEvent};
use crate::error::SqlTemplateError;
use crate::statement::ExecutePolicy;
use crate::types::{DriverType, DriverValue};

use super::params::{from_sqlite_value, to_sqlite_value};

/// A [`Driver`] over one rusqlite connection.
pub struct SqliteDriver {
    conn: Connection,
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteDriver {
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// # Errors
    ///
    /// Returns `SqlTemplateError::SqliteError` if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self, SqlTemplateError> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run a batch of statements outside the template engine (schema setup and the like).
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::SqliteError` on failure.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SqlTemplateError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

impl Driver for SqliteDriver {
    type Statement<'c>
        = SqliteStatement<'c>
    where
        Self: 'c;

    fn prepare<'c>(
        &'c mut self,
        sql: &str,
        policy: &ExecutePolicy,
    ) -> Result<SqliteStatement<'c>, SqlTemplateError> {
        if let Some(secs) = policy.timeout_secs {
            self.conn.busy_timeout(Duration::from_secs(secs))?;
        }
        let stmt = self.conn.prepare(sql)?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        tracing::trace!(sql, params = stmt.parameter_count(), "prepared sqlite statement");
        Ok(SqliteStatement {
            stmt,
            columns,
            pending: Pending::Unexecuted,
        })
    }
}

#[derive(Debug)]
enum Pending {
    Unexecuted,
    Cursor,
    Count(u64),
    Drained,
}

/// A prepared rusqlite statement. Yields one event: a cursor when the statement
/// returns columns, an update count otherwise.
///
/// Statements without columns run to completion in `execute`, so their errors are
/// execution errors. Row-returning statements are not stepped until the cursor is
/// read: an error raised by SQLite while producing a row, the first one included,
/// comes from [`SqliteCursor::next_row`] and the executor reports it while
/// extracting results.
pub struct SqliteStatement<'c> {
    stmt: Statement<'c>,
    columns: Vec<String>,
    pending: Pending,
}

impl fmt::Debug for SqliteStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("columns", &self.columns)
            .field("pending", &self.pending)
            .finish()
    }
}

impl DriverStatement for SqliteStatement<'_> {
    fn bind(
        &mut self,
        index: usize,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<(), SqlTemplateError> {
        self.stmt.raw_bind_parameter(index, to_sqlite_value(value))?;
        Ok(())
    }

    fn register_out(&mut self, index: usize, _driver_type: DriverType) -> Result<(), SqlTemplateError> {
        Err(SqlTemplateError::Unimplemented(format!(
            "SQLite has no output parameters (parameter {index})"
        )))
    }

    fn execute(&mut self) -> Result<(), SqlTemplateError> {
        self.pending = if self.stmt.column_count() > 0 {
            Pending::Cursor
        } else {
            let affected = self.stmt.raw_execute()?;
            Pending::Count(u64::try_from(affected).unwrap_or(u64::MAX))
        };
        Ok(())
    }

    fn next_result(&mut self) -> Result<Option<ResultEvent<'_>>, SqlTemplateError> {
        match std::mem::replace(&mut self.pending, Pending::Drained) {
            Pending::Unexecuted => Err(SqlTemplateError::DriverError(
                "statement has not been executed".to_string(),
            )),
            Pending::Cursor => Ok(Some(ResultEvent::Cursor(Box::new(SqliteCursor {
                rows: self.stmt.raw_query(),
                columns: &self.columns,
            })))),
            Pending::Count(count) => Ok(Some(ResultEvent::UpdateCount(count))),
            Pending::Drained => Ok(None),
        }
    }

    fn out_value(&mut self, index: usize) -> Result<DriverValue, SqlTemplateError> {
        Err(SqlTemplateError::Unimplemented(format!(
            "SQLite has no output parameters (parameter {index})"
        )))
    }
}

/// Rows of an executed [`SqliteStatement`]. The statement resets when this drops.
pub struct SqliteCursor<'s> {
    rows: Rows<'s>,
    columns: &'s [String],
}

impl Cursor for SqliteCursor<'_> {
    fn columns(&self) -> &[String] {
        self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<DriverValue>>, SqlTemplateError> {
        let Some(row) = self.rows.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for idx in 0..self.columns.len() {
            let value: SqliteValue = row.get(idx)?;
            values.push(from_sqlite_value(value));
        }
        Ok(Some(values))
    }
}
