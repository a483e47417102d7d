use chrono::{DateTime, NaiveDate, NaiveTime};
use serde_json::Value as JsonValue;

use super::TypeCodec;
use crate::error::SqlTemplateError;
use crate::types::{
    DATE_FORMAT, DriverType, DriverValue, TIME_FORMAT, TIMESTAMP_FORMAT, Value, parse_timestamp,
};

fn mismatch(codec: &str, value: &impl std::fmt::Debug) -> SqlTemplateError {
    SqlTemplateError::ParameterError(format!("{codec} codec cannot convert {value:?}"))
}

/// Passthrough codec used whenever nothing more specific is registered.
#[derive(Debug, Default)]
pub struct UnknownCodec;

impl TypeCodec for UnknownCodec {
    fn name(&self) -> &str {
        "unknown"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        Ok(match value {
            Value::Null => DriverValue::Null,
            Value::Bool(b) => DriverValue::Integer(i64::from(*b)),
            Value::Int(i) => DriverValue::Integer(*i),
            Value::Float(f) => DriverValue::Real(*f),
            Value::Blob(bytes) => DriverValue::Blob(bytes.clone()),
            Value::Text(_)
            | Value::Date(_)
            | Value::Time(_)
            | Value::Timestamp(_)
            | Value::Json(_)
            | Value::List(_)
            | Value::Map(_) => DriverValue::Text(value.render()),
        })
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        Ok(match value {
            DriverValue::Null => Value::Null,
            DriverValue::Integer(i) => Value::Int(i),
            DriverValue::Real(f) => Value::Float(f),
            DriverValue::Text(s) => Value::Text(s),
            DriverValue::Blob(b) => Value::Blob(b),
        })
    }
}

#[derive(Debug, Default)]
pub struct BoolCodec;

impl TypeCodec for BoolCodec {
    fn name(&self) -> &str {
        "bool"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        match value {
            Value::Null => Ok(DriverValue::Null),
            Value::Bool(b) => Ok(DriverValue::Integer(i64::from(*b))),
            Value::Int(i) => Ok(DriverValue::Integer(i64::from(*i != 0))),
            Value::Text(s) => parse_bool(s)
                .map(|b| DriverValue::Integer(i64::from(b)))
                .ok_or_else(|| mismatch(self.name(), value)),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Integer(i) => Ok(Value::Bool(i != 0)),
            DriverValue::Text(ref s) => parse_bool(s)
                .map(Value::Bool)
                .ok_or_else(|| mismatch(self.name(), &value)),
            other => Err(mismatch(self.name(), &other)),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "y" | "yes" => Some(true),
        "false" | "f" | "0" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Integer codec, range-checked to a fixed bit width.
#[derive(Debug)]
pub struct IntCodec {
    name: &'static str,
    min: i64,
    max: i64,
}

impl IntCodec {
    #[must_use]
    pub fn i8() -> Self {
        Self { name: "byte", min: i64::from(i8::MIN), max: i64::from(i8::MAX) }
    }

    #[must_use]
    pub fn i16() -> Self {
        Self { name: "short", min: i64::from(i16::MIN), max: i64::from(i16::MAX) }
    }

    #[must_use]
    pub fn i32() -> Self {
        Self { name: "int", min: i64::from(i32::MIN), max: i64::from(i32::MAX) }
    }

    #[must_use]
    pub fn i64() -> Self {
        Self { name: "long", min: i64::MIN, max: i64::MAX }
    }

    fn checked(&self, i: i64) -> Result<i64, SqlTemplateError> {
        if (self.min..=self.max).contains(&i) {
            Ok(i)
        } else {
            Err(SqlTemplateError::ParameterError(format!(
                "{i} is out of range for {}",
                self.name
            )))
        }
    }

    fn coerce(&self, value: &Value) -> Result<Option<i64>, SqlTemplateError> {
        match value {
            Value::Null => Ok(None),
            Value::Int(i) => self.checked(*i).map(Some),
            Value::Bool(b) => Ok(Some(i64::from(*b))),
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) if f.fract() == 0.0 => self.checked(*f as i64).map(Some),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| mismatch(self.name, value))
                .and_then(|i| self.checked(i))
                .map(Some),
            other => Err(mismatch(self.name, other)),
        }
    }
}

impl TypeCodec for IntCodec {
    fn name(&self) -> &str {
        self.name
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        Ok(self
            .coerce(value)?
            .map_or(DriverValue::Null, DriverValue::Integer))
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        let host = match value {
            DriverValue::Null => return Ok(Value::Null),
            DriverValue::Integer(i) => Value::Int(i),
            DriverValue::Real(f) => Value::Float(f),
            DriverValue::Text(s) => Value::Text(s),
            DriverValue::Blob(b) => return Err(mismatch(self.name, &b)),
        };
        Ok(self.coerce(&host)?.map_or(Value::Null, Value::Int))
    }
}

#[derive(Debug)]
pub struct FloatCodec {
    name: &'static str,
}

impl FloatCodec {
    #[must_use]
    pub fn f32() -> Self {
        Self { name: "float" }
    }

    #[must_use]
    pub fn f64() -> Self {
        Self { name: "double" }
    }
}

impl TypeCodec for FloatCodec {
    fn name(&self) -> &str {
        self.name
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        match value {
            Value::Null => Ok(DriverValue::Null),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(DriverValue::Real)
                .map_err(|_| mismatch(self.name, value)),
            other => other
                .as_float()
                .map(DriverValue::Real)
                .ok_or_else(|| mismatch(self.name, other)),
        }
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Real(f) => Ok(Value::Float(f)),
            #[allow(clippy::cast_precision_loss)]
            DriverValue::Integer(i) => Ok(Value::Float(i as f64)),
            DriverValue::Text(ref s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(self.name, &value)),
            other => Err(mismatch(self.name, &other)),
        }
    }
}

/// Decimals travel as text so no precision is lost in either direction.
#[derive(Debug, Default)]
pub struct DecimalCodec;

impl TypeCodec for DecimalCodec {
    fn name(&self) -> &str {
        "decimal"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        match value {
            Value::Null => Ok(DriverValue::Null),
            Value::Int(_) | Value::Float(_) => Ok(DriverValue::Text(value.render())),
            Value::Text(s) if s.trim().parse::<f64>().is_ok() => {
                Ok(DriverValue::Text(s.trim().to_string()))
            }
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Integer(i) => Ok(Value::Text(i.to_string())),
            DriverValue::Real(f) => Ok(Value::Text(f.to_string())),
            DriverValue::Text(s) => Ok(Value::Text(s)),
            other => Err(mismatch(self.name(), &other)),
        }
    }
}

#[derive(Debug)]
pub struct TextCodec {
    name: &'static str,
}

impl TextCodec {
    #[must_use]
    pub fn string() -> Self {
        Self { name: "string" }
    }

    #[must_use]
    pub fn char() -> Self {
        Self { name: "char" }
    }
}

impl TypeCodec for TextCodec {
    fn name(&self) -> &str {
        self.name
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        match value {
            Value::Null => Ok(DriverValue::Null),
            Value::Blob(bytes) => String::from_utf8(bytes.clone())
                .map(DriverValue::Text)
                .map_err(|_| mismatch(self.name, value)),
            other => Ok(DriverValue::Text(other.render())),
        }
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        Ok(match value {
            DriverValue::Null => Value::Null,
            DriverValue::Integer(i) => Value::Text(i.to_string()),
            DriverValue::Real(f) => Value::Text(f.to_string()),
            DriverValue::Text(s) => Value::Text(s),
            DriverValue::Blob(b) => Value::Text(String::from_utf8_lossy(&b).into_owned()),
        })
    }
}

#[derive(Debug, Default)]
pub struct BytesCodec;

impl TypeCodec for BytesCodec {
    fn name(&self) -> &str {
        "bytes"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        match value {
            Value::Null => Ok(DriverValue::Null),
            Value::Blob(bytes) => Ok(DriverValue::Blob(bytes.clone())),
            Value::Text(s) => Ok(DriverValue::Blob(s.as_bytes().to_vec())),
            other => Err(mismatch(self.name(), other)),
        }
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Blob(b) => Ok(Value::Blob(b)),
            DriverValue::Text(s) => Ok(Value::Blob(s.into_bytes())),
            other => Err(mismatch(self.name(), &other)),
        }
    }
}

#[derive(Debug, Default)]
pub struct DateCodec;

impl TypeCodec for DateCodec {
    fn name(&self) -> &str {
        "date"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        let date = match value {
            Value::Null => return Ok(DriverValue::Null),
            Value::Date(d) => *d,
            Value::Timestamp(dt) => dt.date(),
            Value::Text(s) => parse_date(s).ok_or_else(|| mismatch(self.name(), value))?,
            other => return Err(mismatch(self.name(), other)),
        };
        Ok(DriverValue::Text(date.format(DATE_FORMAT).to_string()))
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Text(ref s) => parse_date(s)
                .map(Value::Date)
                .ok_or_else(|| mismatch(self.name(), &value)),
            other => Err(mismatch(self.name(), &other)),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(s.trim()).map(|dt| dt.date()))
}

#[derive(Debug, Default)]
pub struct TimeCodec;

impl TypeCodec for TimeCodec {
    fn name(&self) -> &str {
        "time"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        let time = match value {
            Value::Null => return Ok(DriverValue::Null),
            Value::Time(t) => *t,
            Value::Timestamp(dt) => dt.time(),
            Value::Text(s) => parse_time(s).ok_or_else(|| mismatch(self.name(), value))?,
            other => return Err(mismatch(self.name(), other)),
        };
        Ok(DriverValue::Text(time.format(TIME_FORMAT).to_string()))
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Text(ref s) => parse_time(s)
                .map(Value::Time)
                .ok_or_else(|| mismatch(self.name(), &value)),
            other => Err(mismatch(self.name(), &other)),
        }
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .ok()
        .or_else(|| NaiveTime::parse_from_str(s.trim(), "%H:%M").ok())
}

/// Timestamps are written as `YYYY-MM-DD HH:MM:SS[.fff]` text.
#[derive(Debug, Default)]
pub struct TimestampCodec;

impl TypeCodec for TimestampCodec {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        if value.is_null() {
            return Ok(DriverValue::Null);
        }
        let dt = value
            .as_timestamp()
            .ok_or_else(|| mismatch(self.name(), value))?;
        Ok(DriverValue::Text(dt.format(TIMESTAMP_FORMAT).to_string()))
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Text(ref s) => parse_timestamp(s.trim())
                .map(Value::Timestamp)
                .ok_or_else(|| mismatch(self.name(), &value)),
            // unix seconds
            DriverValue::Integer(secs) => DateTime::from_timestamp(secs, 0)
                .map(|dt| Value::Timestamp(dt.naive_utc()))
                .ok_or_else(|| mismatch(self.name(), &value)),
            other => Err(mismatch(self.name(), &other)),
        }
    }
}

#[derive(Debug, Default)]
pub struct JsonCodec;

impl TypeCodec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        match value {
            Value::Null => Ok(DriverValue::Null),
            Value::Text(s) => serde_json::from_str::<JsonValue>(s)
                .map(|json| DriverValue::Text(json.to_string()))
                .map_err(|e| SqlTemplateError::ParameterError(format!("invalid JSON text: {e}"))),
            other => Ok(DriverValue::Text(other.to_json().to_string())),
        }
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Null => Ok(Value::Null),
            DriverValue::Text(s) => serde_json::from_str::<JsonValue>(&s)
                .map(Value::Json)
                .map_err(|e| SqlTemplateError::ParameterError(format!("invalid JSON column: {e}"))),
            DriverValue::Blob(b) => serde_json::from_slice::<JsonValue>(&b)
                .map(Value::Json)
                .map_err(|e| SqlTemplateError::ParameterError(format!("invalid JSON column: {e}"))),
            DriverValue::Integer(i) => Ok(Value::Json(JsonValue::from(i))),
            DriverValue::Real(f) => Ok(Value::Json(JsonValue::from(f))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn int_codec_checks_range() {
        let codec = IntCodec::i32();
        assert_eq!(
            codec.to_driver(&Value::Int(7), None).unwrap(),
            DriverValue::Integer(7)
        );
        assert_eq!(
            codec.to_driver(&Value::from("42"), None).unwrap(),
            DriverValue::Integer(42)
        );
        assert!(codec.to_driver(&Value::Int(i64::MAX), None).is_err());
        assert!(codec.to_driver(&Value::from("abc"), None).is_err());
    }

    #[test]
    fn timestamp_codec_formats_like_sqlite_text() {
        let dt = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", "%Y-%m-%d %H:%M:%S").unwrap();
        let codec = TimestampCodec;
        let driver = codec.to_driver(&Value::Timestamp(dt), None).unwrap();
        assert_eq!(driver, DriverValue::Text("2024-01-02 03:04:05".into()));
        assert_eq!(codec.from_driver(driver, None).unwrap(), Value::Timestamp(dt));
    }

    #[test]
    fn bool_codec_reads_integers() {
        let codec = BoolCodec;
        assert_eq!(
            codec.from_driver(DriverValue::Integer(0), None).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            codec.to_driver(&Value::from("yes"), None).unwrap(),
            DriverValue::Integer(1)
        );
    }

    #[test]
    fn unknown_codec_passes_values_through() {
        let codec = UnknownCodec;
        assert_eq!(
            codec.to_driver(&Value::Null, None).unwrap(),
            DriverValue::Null
        );
        assert_eq!(
            codec.to_driver(&Value::List(vec![Value::Int(1)]), None).unwrap(),
            DriverValue::Text("[1]".into())
        );
        assert_eq!(
            codec.from_driver(DriverValue::Real(1.5), None).unwrap(),
            Value::Float(1.5)
        );
    }
}
