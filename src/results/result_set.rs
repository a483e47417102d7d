use std::sync::Arc;

use super::row::{ColumnIndex, Row};
use crate::types::Value;

/// The rows of one cursor.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows read from the cursor
    pub results: Vec<Row>,
    /// Column index shared by all rows (set before the first row is added)
    columns: Option<Arc<ColumnIndex>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            columns: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Vec<String>, case_insensitive: bool) {
        self.columns = Some(Arc::new(ColumnIndex::new(column_names, case_insensitive)));
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&[String]> {
        self.columns.as_deref().map(ColumnIndex::names)
    }

    /// Add a row to the result set
    ///
    /// Rows added before the column names are known are dropped.
    pub fn add_row_values(&mut self, row_values: Vec<Value>) {
        if let Some(columns) = &self.columns {
            self.results.push(Row::new(Arc::clone(columns), row_values));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_the_column_index() {
        let mut rs = ResultSet::with_capacity(2);
        rs.add_row_values(vec![Value::Int(0)]);
        assert!(rs.is_empty());

        rs.set_column_names(vec!["n".into()], false);
        rs.add_row_values(vec![Value::Int(1)]);
        rs.add_row_values(vec![Value::Int(2)]);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.get_column_names(), Some(&["n".to_string()][..]));
        assert_eq!(rs.results[1].get("n"), Some(&Value::Int(2)));
    }
}
