use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::SqlTemplateError;

/// Host values that flow through templates, bound arguments and results.
///
/// Parameter contexts are usually built from JSON, so nested lists and maps are
/// first-class values that expressions can walk:
/// ```rust
/// use sql_template::prelude::*;
///
/// let params = vec![
///     Value::Int(1),
///     Value::Text("alice".into()),
///     Value::List(vec![Value::Int(1), Value::Int(2)]),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Binary data
    Blob(Vec<u8>),
    /// JSON document bound as a single value
    Json(JsonValue),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let Value::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let Value::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(value) => Some(*value),
            Value::Date(date) => date.and_hms_opt(0, 0, 0),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        if let Value::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        if let Value::Map(map) = self {
            Some(map)
        } else {
            None
        }
    }

    /// Truthiness used by activation expressions and `if` rules.
    ///
    /// NULL, `false`, zero, and empty text/lists/maps are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Blob(b) => !b.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Json(json) => match json {
                JsonValue::Null => false,
                JsonValue::Bool(b) => *b,
                JsonValue::Array(items) => !items.is_empty(),
                JsonValue::Object(map) => !map.is_empty(),
                JsonValue::String(s) => !s.is_empty(),
                JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            },
            Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => true,
        }
    }

    /// Text form used by `${}` substitution and derived-value rules. NULL renders empty.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::Time(t) => t.format(TIME_FORMAT).to_string(),
            Value::Timestamp(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
            Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Value::Json(json) => json.to_string(),
            Value::List(_) | Value::Map(_) => self.to_json().to_string(),
        }
    }

    /// Convert into a JSON document. Temporal values become strings, blobs become byte arrays.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => JsonValue::from(*f),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => JsonValue::String(self.render()),
            Value::Blob(bytes) => JsonValue::from(bytes.clone()),
            Value::Json(json) => json.clone(),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.f";
pub(crate) const TIMESTAMP_FORMAT: &str = "%F %T%.f";

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    // Try "YYYY-MM-DD HH:MM:SS"
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    // Try "YYYY-MM-DD HH:MM:SS.SSS"
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    None
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            JsonValue::String(s) => Value::Text(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    Vec<u8> => Blob,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Host-side type of a bound argument or result column.
///
/// Names accepted by `javaType=` clauses map onto these variants; anything unrecognised
/// is kept as [`LogicalType::Other`] so it can name a row reader instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Char,
    Bytes,
    Date,
    Time,
    Timestamp,
    Json,
    List,
    Map,
    Other(String),
}

impl LogicalType {
    /// Parse a type name such as `i32`, `String`, `java.lang.Integer`, or `java.time.LocalDate`.
    #[must_use]
    pub fn from_name(name: &str) -> LogicalType {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "bool" | "boolean" | "java.lang.boolean" => LogicalType::Bool,
            "i8" | "byte" | "java.lang.byte" => LogicalType::Byte,
            "i16" | "short" | "java.lang.short" => LogicalType::Short,
            "i32" | "int" | "integer" | "java.lang.integer" => LogicalType::Int,
            "i64" | "long" | "java.lang.long" | "java.math.biginteger" => LogicalType::Long,
            "f32" | "float" | "java.lang.float" => LogicalType::Float,
            "f64" | "double" | "java.lang.double" => LogicalType::Double,
            "decimal" | "bigdecimal" | "java.math.bigdecimal" => LogicalType::Decimal,
            "string" | "str" | "text" | "java.lang.string" => LogicalType::String,
            "char" | "java.lang.character" => LogicalType::Char,
            "bytes" | "blob" | "vec<u8>" | "byte[]" => LogicalType::Bytes,
            "date" | "naivedate" | "java.time.localdate" | "java.sql.date" => LogicalType::Date,
            "time" | "naivetime" | "java.time.localtime" | "java.sql.time" => LogicalType::Time,
            "timestamp" | "datetime" | "naivedatetime" | "java.time.localdatetime"
            | "java.sql.timestamp" | "java.util.date" => LogicalType::Timestamp,
            "json" => LogicalType::Json,
            "list" | "vec" | "java.util.list" => LogicalType::List,
            "map" | "java.util.map" => LogicalType::Map,
            _ => LogicalType::Other(trimmed.to_string()),
        }
    }

    /// Runtime type of a value, `None` for NULL.
    #[must_use]
    pub fn of(value: &Value) -> Option<LogicalType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(LogicalType::Bool),
            Value::Int(_) => Some(LogicalType::Long),
            Value::Float(_) => Some(LogicalType::Double),
            Value::Text(_) => Some(LogicalType::String),
            Value::Date(_) => Some(LogicalType::Date),
            Value::Time(_) => Some(LogicalType::Time),
            Value::Timestamp(_) => Some(LogicalType::Timestamp),
            Value::Blob(_) => Some(LogicalType::Bytes),
            Value::Json(_) => Some(LogicalType::Json),
            Value::List(_) => Some(LogicalType::List),
            Value::Map(_) => Some(LogicalType::Map),
        }
    }

    #[must_use]
    pub fn is_other(&self) -> bool {
        matches!(self, LogicalType::Other(_))
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Other(name) => f.write_str(name),
            other => write!(f, "{other:?}"),
        }
    }
}

macro_rules! driver_types {
    ($($variant:ident = $name:literal, $code:literal;)*) => {
        /// Driver-level type codes, using the JDBC vocabulary accepted by `jdbcType=`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum DriverType {
            $($variant,)*
        }

        impl DriverType {
            /// Every known driver type, in declaration order.
            pub const ALL: &'static [DriverType] = &[$(DriverType::$variant,)*];

            /// The `java.sql.Types` code for this type.
            #[must_use]
            pub fn code(self) -> i32 {
                match self {
                    $(DriverType::$variant => $code,)*
                }
            }

            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(DriverType::$variant => $name,)*
                }
            }

            #[must_use]
            pub fn from_code(code: i32) -> Option<DriverType> {
                match code {
                    $($code => Some(DriverType::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

driver_types! {
    Bit = "BIT", -7;
    Tinyint = "TINYINT", -6;
    Smallint = "SMALLINT", 5;
    Integer = "INTEGER", 4;
    Bigint = "BIGINT", -5;
    Float = "FLOAT", 6;
    Real = "REAL", 7;
    Double = "DOUBLE", 8;
    Numeric = "NUMERIC", 2;
    Decimal = "DECIMAL", 3;
    Char = "CHAR", 1;
    Varchar = "VARCHAR", 12;
    Longvarchar = "LONGVARCHAR", -1;
    Nchar = "NCHAR", -15;
    Nvarchar = "NVARCHAR", -9;
    Date = "DATE", 91;
    Time = "TIME", 92;
    Timestamp = "TIMESTAMP", 93;
    TimeWithTimezone = "TIME_WITH_TIMEZONE", 2013;
    TimestampWithTimezone = "TIMESTAMP_WITH_TIMEZONE", 2014;
    Binary = "BINARY", -2;
    Varbinary = "VARBINARY", -3;
    Longvarbinary = "LONGVARBINARY", -4;
    Blob = "BLOB", 2004;
    Clob = "CLOB", 2005;
    Boolean = "BOOLEAN", 16;
    Null = "NULL", 0;
    Other = "OTHER", 1111;
    JavaObject = "JAVA_OBJECT", 2000;
    Array = "ARRAY", 2003;
    RefCursor = "REF_CURSOR", 2012;
}

impl DriverType {
    /// Parse a `jdbcType=` value case-insensitively. `INT` is accepted for `INTEGER`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<DriverType> {
        let upper = name.trim().to_ascii_uppercase();
        if upper == "INT" {
            return Some(DriverType::Integer);
        }
        DriverType::ALL.iter().copied().find(|t| t.name() == upper)
    }

    /// Default driver type used for a logical type when none is given.
    #[must_use]
    pub fn for_logical(logical: &LogicalType) -> DriverType {
        match logical {
            LogicalType::Bool => DriverType::Boolean,
            LogicalType::Byte => DriverType::Tinyint,
            LogicalType::Short => DriverType::Smallint,
            LogicalType::Int => DriverType::Integer,
            LogicalType::Long => DriverType::Bigint,
            LogicalType::Float => DriverType::Float,
            LogicalType::Double => DriverType::Double,
            LogicalType::Decimal => DriverType::Decimal,
            LogicalType::String | LogicalType::Json => DriverType::Varchar,
            LogicalType::Char => DriverType::Char,
            LogicalType::Bytes => DriverType::Varbinary,
            LogicalType::Date => DriverType::Date,
            LogicalType::Time => DriverType::Time,
            LogicalType::Timestamp => DriverType::Timestamp,
            LogicalType::List => DriverType::Array,
            LogicalType::Map => DriverType::JavaObject,
            LogicalType::Other(_) => DriverType::Other,
        }
    }
}

impl FromStr for DriverType {
    type Err = SqlTemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DriverType::from_name(s)
            .ok_or_else(|| SqlTemplateError::ParameterError(format!("unknown jdbcType `{s}`")))
    }
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a bound argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArgMode {
    #[default]
    In,
    Out,
    #[value(name = "inout")]
    #[serde(rename = "INOUT")]
    InOut,
}

impl ArgMode {
    #[must_use]
    pub fn from_name(name: &str) -> Option<ArgMode> {
        match name.trim().to_ascii_uppercase().as_str() {
            "IN" => Some(ArgMode::In),
            "OUT" => Some(ArgMode::Out),
            "INOUT" => Some(ArgMode::InOut),
            _ => None,
        }
    }

    /// Whether a value is written into the statement before execution.
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, ArgMode::In | ArgMode::InOut)
    }

    /// Whether a value is read back from the statement after execution.
    #[must_use]
    pub fn is_output(self) -> bool {
        matches!(self, ArgMode::Out | ArgMode::InOut)
    }
}

impl fmt::Display for ArgMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArgMode::In => "IN",
            ArgMode::Out => "OUT",
            ArgMode::InOut => "INOUT",
        })
    }
}

/// Values as a driver stores them. Codecs translate between these and [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum DriverValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl DriverValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, DriverValue::Null)
    }
}
