use std::collections::{BTreeMap, HashMap};

use serde_json::Value as JsonValue;

use crate::error::SqlTemplateError;
use crate::types::Value;

/// Supplies parameter values to a template by name.
///
/// Lookups are fallible so sources backed by something other than a map (a row, a
/// lazily loaded object) can report errors instead of pretending a value is absent.
pub trait ArgSource {
    /// Look up `name`. `Ok(None)` means the name is not present at all.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the value exists but cannot be produced.
    fn lookup(&self, name: &str) -> Result<Option<Value>, SqlTemplateError>;
}

impl ArgSource for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Result<Option<Value>, SqlTemplateError> {
        Ok(self.get(name).cloned())
    }
}

impl ArgSource for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Result<Option<Value>, SqlTemplateError> {
        Ok(self.get(name).cloned())
    }
}

/// A source with no values.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl ArgSource for EmptySource {
    fn lookup(&self, _name: &str) -> Result<Option<Value>, SqlTemplateError> {
        Ok(None)
    }
}

/// Map-backed parameter source.
///
/// ```rust
/// use sql_template::prelude::*;
///
/// let source = MapSource::new().with("ownerID", "123").with("ownerType", Value::Null);
/// assert_eq!(source.lookup("ownerID").unwrap(), Some(Value::from("123")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapSource {
    values: BTreeMap<String, Value>,
}

impl MapSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, replacing any previous one with the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Positional arguments, exposed as `arg0`, `arg1`, ... for `?` placeholders.
    #[must_use]
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| (format!("arg{idx}"), value.into()))
            .collect()
    }

    /// Build from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::ConfigError` if `json` is not an object (or null).
    pub fn from_json(json: JsonValue) -> Result<Self, SqlTemplateError> {
        match Value::from(json) {
            Value::Map(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(SqlTemplateError::ConfigError(format!(
                "parameter context must be a JSON object, got {}",
                other.render()
            ))),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MapSource {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ArgSource for MapSource {
    fn lookup(&self, name: &str) -> Result<Option<Value>, SqlTemplateError> {
        Ok(self.values.get(name).cloned())
    }
}

/// Per-compilation overlay that holds values written by `bind` rules.
///
/// The caller's source is only read; bound names shadow it for the rest of one
/// compilation and are dropped afterwards.
pub struct BindScope<'a> {
    base: &'a dyn ArgSource,
    bound: HashMap<String, Value>,
}

impl<'a> BindScope<'a> {
    #[must_use]
    pub fn new(base: &'a dyn ArgSource) -> Self {
        Self {
            base,
            bound: HashMap::new(),
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bound.insert(name.into(), value);
    }
}

impl ArgSource for BindScope<'_> {
    fn lookup(&self, name: &str) -> Result<Option<Value>, SqlTemplateError> {
        if let Some(value) = self.bound.get(name) {
            return Ok(Some(value.clone()));
        }
        self.base.lookup(name)
    }
}
