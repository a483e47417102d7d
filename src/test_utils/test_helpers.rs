//! Helper utilities for testing and development.

use crate::results::{ColumnIndex, Row};
use crate::types::Value;
use std::sync::Arc;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<Value>) -> Row {
    Row::new(Arc::new(ColumnIndex::new(column_names, false)), values)
}
