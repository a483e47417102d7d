use serde::{Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::types::Value;

/// One converted result event (or several, combined).
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    /// `rows` and `column` shapes: one value per row.
    Rows(Vec<Value>),
    /// `row` shape: the first row, `None` for an empty cursor.
    Row(Option<Value>),
    /// `scalar` shape, and OUT parameter values.
    Scalar(Value),
    UpdateCount(u64),
    /// Every event of one kind, in order (`MultipleResultPolicy::All`).
    Multiple(Vec<ResultValue>),
    /// The statement produced nothing of the requested kind.
    Empty,
}

impl ResultValue {
    #[must_use]
    pub fn as_rows(&self) -> Option<&[Value]> {
        match self {
            ResultValue::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_update_count(&self) -> Option<u64> {
        match self {
            ResultValue::UpdateCount(count) => Some(*count),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            ResultValue::Scalar(value) => Some(value),
            ResultValue::Row(row) => row.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_multiple(&self) -> Option<&[ResultValue]> {
        match self {
            ResultValue::Multiple(values) => Some(values),
            _ => None,
        }
    }

    /// Collapse into a plain value (lists for rows and combined results).
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            ResultValue::Rows(rows) => Value::List(rows),
            ResultValue::Row(row) => row.unwrap_or_default(),
            ResultValue::Scalar(value) => value,
            ResultValue::UpdateCount(count) => {
                Value::Int(i64::try_from(count).unwrap_or(i64::MAX))
            }
            ResultValue::Multiple(values) => {
                Value::List(values.into_iter().map(ResultValue::into_value).collect())
            }
            ResultValue::Empty => Value::Null,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            ResultValue::Rows(rows) => JsonValue::Array(rows.iter().map(Value::to_json).collect()),
            ResultValue::Row(row) => row.as_ref().map_or(JsonValue::Null, Value::to_json),
            ResultValue::Scalar(value) => value.to_json(),
            ResultValue::UpdateCount(count) => JsonValue::from(*count),
            ResultValue::Multiple(values) => {
                JsonValue::Array(values.iter().map(ResultValue::to_json).collect())
            }
            ResultValue::Empty => JsonValue::Null,
        }
    }
}

impl Serialize for ResultValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Named results of one execution, in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMap {
    entries: Vec<(String, ResultValue)>,
    case_insensitive: bool,
}

impl ResultMap {
    #[must_use]
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        if self.case_insensitive {
            self.entries
                .iter()
                .position(|(key, _)| key.eq_ignore_ascii_case(name))
        } else {
            self.entries.iter().position(|(key, _)| key == name)
        }
    }

    /// Store a result, replacing an earlier one with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: ResultValue) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResultValue> {
        self.position(name).map(|idx| &self.entries[idx].1)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<ResultValue> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut object = JsonMap::new();
        for (key, value) in &self.entries {
            object.insert(key.clone(), value.to_json());
        }
        JsonValue::Object(object)
    }
}

impl IntoIterator for ResultMap {
    type Item = (String, ResultValue);
    type IntoIter = std::vec::IntoIter<(String, ResultValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for ResultMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
