use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::row::Row;
use crate::error::SqlTemplateError;
use crate::types::Value;

/// Turns one row into a host value.
///
/// The mapping layer registers its entity readers under a name; descriptors refer to
/// them with `rowMapper=` or a `javaType=` that is not a plain logical type.
pub trait RowReader: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Implementations return `SqlTemplateError::DemultiplexMismatch` when the row
    /// does not have the shape they expect.
    fn read_row(&self, row: &Row) -> Result<Value, SqlTemplateError>;
}

/// Reads a row as a column-name map (the default reader).
#[derive(Debug, Default, Clone, Copy)]
pub struct MapRowReader;

impl RowReader for MapRowReader {
    fn read_row(&self, row: &Row) -> Result<Value, SqlTemplateError> {
        Ok(Value::Map(row.to_map()))
    }
}

/// Reads a row as its list of values, in column order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListRowReader;

impl RowReader for ListRowReader {
    fn read_row(&self, row: &Row) -> Result<Value, SqlTemplateError> {
        Ok(Value::List(row.values().to_vec()))
    }
}

/// Row readers by name.
#[derive(Debug, Clone)]
pub struct RowReaderRegistry {
    readers: HashMap<String, Arc<dyn RowReader>>,
}

impl Default for RowReaderRegistry {
    fn default() -> Self {
        let mut readers: HashMap<String, Arc<dyn RowReader>> = HashMap::new();
        readers.insert("map".into(), Arc::new(MapRowReader));
        readers.insert("list".into(), Arc::new(ListRowReader));
        Self { readers }
    }
}

impl RowReaderRegistry {
    /// Registry with the built-in `map` and `list` readers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reader(mut self, name: impl Into<String>, reader: Arc<dyn RowReader>) -> Self {
        self.register(name, reader);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, reader: Arc<dyn RowReader>) {
        self.readers.insert(name.into(), reader);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn RowReader>> {
        self.readers.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.readers.contains_key(name)
    }

    /// Look up a reader, `None` selecting the map reader.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::DemultiplexMismatch` for an unregistered name.
    pub fn resolve(&self, name: Option<&str>) -> Result<&Arc<dyn RowReader>, SqlTemplateError> {
        let name = name.unwrap_or("map");
        self.get(name).ok_or_else(|| {
            SqlTemplateError::DemultiplexMismatch(format!("no row reader registered as `{name}`"))
        })
    }
}
