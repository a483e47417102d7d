//! The synchronous driver interface the executor runs statements through.
//!
//! One [`Driver`] is a connection. [`Driver::prepare`] hands out a statement borrowing
//! it; after [`DriverStatement::execute`] the statement yields its results one event at
//! a time. Statements and cursors release their driver resources when dropped.

use crate::error::SqlTemplateError;
use crate::statement::ExecutePolicy;
use crate::types::{DriverType, DriverValue};

/// A database connection.
pub trait Driver {
    type Statement<'c>: DriverStatement
    where
        Self: 'c;

    /// Prepare `sql` (with `?` placeholders) under `policy`.
    ///
    /// # Errors
    ///
    /// Driver errors.
    fn prepare<'c>(
        &'c mut self,
        sql: &str,
        policy: &ExecutePolicy,
    ) -> Result<Self::Statement<'c>, SqlTemplateError>;
}

/// A prepared statement.
pub trait DriverStatement {
    /// Bind the 1-based parameter `index`.
    ///
    /// # Errors
    ///
    /// Driver errors.
    fn bind(
        &mut self,
        index: usize,
        value: DriverValue,
        driver_type: Option<DriverType>,
    ) -> Result<(), SqlTemplateError>;

    /// Declare parameter `index` as an output of `driver_type`.
    ///
    /// # Errors
    ///
    /// `Unimplemented` for drivers without output parameters.
    fn register_out(&mut self, index: usize, driver_type: DriverType) -> Result<(), SqlTemplateError>;

    /// # Errors
    ///
    /// Driver errors.
    fn execute(&mut self) -> Result<(), SqlTemplateError>;

    /// The next result of the execution, `None` once all have been read.
    ///
    /// # Errors
    ///
    /// Driver errors.
    fn next_result(&mut self) -> Result<Option<ResultEvent<'_>>, SqlTemplateError>;

    /// Value of an output parameter after execution.
    ///
    /// # Errors
    ///
    /// Driver errors, or `Unimplemented`.
    fn out_value(&mut self, index: usize) -> Result<DriverValue, SqlTemplateError>;
}

/// One result produced by an executed statement.
pub enum ResultEvent<'a> {
    Cursor(Box<dyn Cursor + 'a>),
    UpdateCount(u64),
}

impl std::fmt::Debug for ResultEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultEvent::Cursor(cursor) => f
                .debug_tuple("Cursor")
                .field(&cursor.columns())
                .finish(),
            ResultEvent::UpdateCount(count) => f.debug_tuple("UpdateCount").field(count).finish(),
        }
    }
}

/// A forward-only cursor over rows.
pub trait Cursor {
    /// Column names, in order.
    fn columns(&self) -> &[String];

    /// # Errors
    ///
    /// Driver errors.
    fn next_row(&mut self) -> Result<Option<Vec<DriverValue>>, SqlTemplateError>;
}
