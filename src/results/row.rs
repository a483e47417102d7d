use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::types::Value;

/// Column names of a cursor plus a name-to-index cache, shared by all of its rows.
#[derive(Debug)]
pub struct ColumnIndex {
    names: Vec<String>,
    index: HashMap<String, usize>,
    case_insensitive: bool,
}

impl ColumnIndex {
    #[must_use]
    pub fn new(names: Vec<String>, case_insensitive: bool) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let key = if case_insensitive {
                name.to_lowercase()
            } else {
                name.clone()
            };
            // first column wins when names repeat
            index.entry(key).or_insert(i);
        }
        Self {
            names,
            index,
            case_insensitive,
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Position of a column by name.
    #[must_use]
    pub fn position(&self, column_name: &str) -> Option<usize> {
        if self.case_insensitive {
            self.index.get(&column_name.to_lowercase()).copied()
        } else {
            self.index.get(column_name).copied()
        }
    }
}

/// A row from a result set
///
/// Values are already converted to host values; column lookups go through the
/// result set's shared [`ColumnIndex`].
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<ColumnIndex>,
    values: Vec<Value>,
}

impl Row {
    #[must_use]
    pub fn new(columns: Arc<ColumnIndex>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.position(column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Column name to value. Case-insensitive rows use lowercase keys; when names
    /// repeat the first column wins.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        for (name, value) in self.columns.names().iter().zip(&self.values) {
            let key = if self.columns.is_case_insensitive() {
                name.to_lowercase()
            } else {
                name.clone()
            };
            map.entry(key).or_insert_with(|| value.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_respects_case_mode() {
        let names = vec!["ID".to_string(), "Name".to_string()];
        let sensitive = Arc::new(ColumnIndex::new(names.clone(), false));
        let row = Row::new(sensitive, vec![Value::Int(1), Value::from("a")]);
        assert_eq!(row.get("Name"), Some(&Value::from("a")));
        assert_eq!(row.get("name"), None);

        let insensitive = Arc::new(ColumnIndex::new(names, true));
        let row = Row::new(insensitive, vec![Value::Int(1), Value::from("a")]);
        assert_eq!(row.get("name"), Some(&Value::from("a")));
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert!(row.to_map().contains_key("name"));
    }

    #[test]
    fn duplicate_columns_keep_the_first() {
        let names = vec!["a".to_string(), "a".to_string()];
        let row = Row::new(
            Arc::new(ColumnIndex::new(names, false)),
            vec![Value::Int(1), Value::Int(2)],
        );
        assert_eq!(row.get("a"), Some(&Value::Int(1)));
        assert_eq!(row.to_map().get("a"), Some(&Value::Int(1)));
    }
}
