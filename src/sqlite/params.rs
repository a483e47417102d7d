use rusqlite::types::Value as SqliteValue;

use crate::types::DriverValue;

/// Convert a driver value into a rusqlite `Value`.
#[must_use]
pub fn to_sqlite_value(value: DriverValue) -> SqliteValue {
    match value {
        DriverValue::Null => SqliteValue::Null,
        DriverValue::Integer(i) => SqliteValue::Integer(i),
        DriverValue::Real(f) => SqliteValue::Real(f),
        DriverValue::Text(s) => SqliteValue::Text(s),
        DriverValue::Blob(b) => SqliteValue::Blob(b),
    }
}

/// Convert a value read from a `SQLite` row.
#[must_use]
pub fn from_sqlite_value(value: SqliteValue) -> DriverValue {
    match value {
        SqliteValue::Null => DriverValue::Null,
        SqliteValue::Integer(i) => DriverValue::Integer(i),
        SqliteValue::Real(f) => DriverValue::Real(f),
        SqliteValue::Text(s) => DriverValue::Text(s),
        SqliteValue::Blob(b) => DriverValue::Blob(b),
    }
}
