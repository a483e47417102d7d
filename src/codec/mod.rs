//! Type codecs and the chained registry that resolves them.
//!
//! A [`TypeRegistry`] maps logical types, driver types, the pair of both, and codec
//! names onto [`TypeCodec`] implementations. Resolution by type never fails: a key
//! missing from a registry is looked up in its base registry, and the default codec
//! answers when nothing in the chain matches.
//!
//! ```rust
//! use std::sync::Arc;
//! use sql_template::prelude::*;
//! use sql_template::codec::TextCodec;
//!
//! let types = TypeRegistryBuilder::from_base(TypeRegistry::builtin())
//!     .register_named("upper", Arc::new(TextCodec::string()))
//!     .build();
//! assert_eq!(types.resolve_logical(&LogicalType::Int).name(), "int");
//! assert!(types.resolve_named("upper").is_ok());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

mod builtin;

pub use builtin::{
    BoolCodec, BytesCodec, DateCodec, DecimalCodec, FloatCodec, IntCodec, JsonCodec, TextCodec,
    TimeCodec, TimestampCodec, UnknownCodec,
};

use crate::error::SqlTemplateError;
use crate::types::{DriverType, DriverValue, LogicalType, Value};

/// Converts host values to driver values and back.
pub trait TypeCodec: Send + Sync + fmt::Debug {
    /// Name used by `typeHandler=<name>` clauses.
    fn name(&self) -> &str;

    /// Convert a host value into the value handed to the driver.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::ParameterError` if the value cannot be represented.
    fn to_driver(
        &self,
        value: &Value,
        driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError>;

    /// Convert a driver value read from a cursor or OUT parameter into a host value.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::ParameterError` if the value cannot be represented.
    fn from_driver(
        &self,
        value: DriverValue,
        driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError>;
}

pub type CodecRef = Arc<dyn TypeCodec>;

lazy_static! {
    static ref BUILTIN_TYPES: Arc<TypeRegistry> = Arc::new(TypeRegistry::with_builtins());
}

/// Codec lookup tables, optionally chained to a base registry.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    base: Option<Arc<TypeRegistry>>,
    by_logical: HashMap<LogicalType, CodecRef>,
    by_driver: HashMap<DriverType, CodecRef>,
    by_cross: HashMap<(LogicalType, DriverType), CodecRef>,
    by_name: HashMap<String, CodecRef>,
    default_codec: Option<CodecRef>,
}

impl TypeRegistry {
    /// The shared registry holding the built-in codecs.
    #[must_use]
    pub fn builtin() -> Arc<TypeRegistry> {
        Arc::clone(&BUILTIN_TYPES)
    }

    fn with_builtins() -> Self {
        let mut registry = TypeRegistry::default();
        let unknown: CodecRef = Arc::new(UnknownCodec);
        let boolean: CodecRef = Arc::new(BoolCodec);
        let byte: CodecRef = Arc::new(IntCodec::i8());
        let short: CodecRef = Arc::new(IntCodec::i16());
        let int: CodecRef = Arc::new(IntCodec::i32());
        let long: CodecRef = Arc::new(IntCodec::i64());
        let float: CodecRef = Arc::new(FloatCodec::f32());
        let double: CodecRef = Arc::new(FloatCodec::f64());
        let decimal: CodecRef = Arc::new(DecimalCodec);
        let string: CodecRef = Arc::new(TextCodec::string());
        let character: CodecRef = Arc::new(TextCodec::char());
        let bytes: CodecRef = Arc::new(BytesCodec);
        let date: CodecRef = Arc::new(DateCodec);
        let time: CodecRef = Arc::new(TimeCodec);
        let timestamp: CodecRef = Arc::new(TimestampCodec);
        let json: CodecRef = Arc::new(JsonCodec);

        for (logical, codec) in [
            (LogicalType::Bool, &boolean),
            (LogicalType::Byte, &byte),
            (LogicalType::Short, &short),
            (LogicalType::Int, &int),
            (LogicalType::Long, &long),
            (LogicalType::Float, &float),
            (LogicalType::Double, &double),
            (LogicalType::Decimal, &decimal),
            (LogicalType::String, &string),
            (LogicalType::Char, &character),
            (LogicalType::Bytes, &bytes),
            (LogicalType::Date, &date),
            (LogicalType::Time, &time),
            (LogicalType::Timestamp, &timestamp),
            (LogicalType::Json, &json),
            (LogicalType::List, &json),
            (LogicalType::Map, &json),
        ] {
            registry.by_logical.insert(logical, Arc::clone(codec));
        }

        for (driver, codec) in [
            (DriverType::Bit, &boolean),
            (DriverType::Boolean, &boolean),
            (DriverType::Tinyint, &byte),
            (DriverType::Smallint, &short),
            (DriverType::Integer, &int),
            (DriverType::Bigint, &long),
            (DriverType::Float, &double),
            (DriverType::Real, &float),
            (DriverType::Double, &double),
            (DriverType::Numeric, &decimal),
            (DriverType::Decimal, &decimal),
            (DriverType::Char, &string),
            (DriverType::Nchar, &string),
            (DriverType::Varchar, &string),
            (DriverType::Nvarchar, &string),
            (DriverType::Longvarchar, &string),
            (DriverType::Clob, &string),
            (DriverType::Binary, &bytes),
            (DriverType::Varbinary, &bytes),
            (DriverType::Longvarbinary, &bytes),
            (DriverType::Blob, &bytes),
            (DriverType::Date, &date),
            (DriverType::Time, &time),
            (DriverType::TimeWithTimezone, &time),
            (DriverType::Timestamp, &timestamp),
            (DriverType::TimestampWithTimezone, &timestamp),
        ] {
            registry.by_driver.insert(driver, Arc::clone(codec));
        }

        // booleans stored in integer columns
        registry.by_cross.insert(
            (LogicalType::Bool, DriverType::Integer),
            Arc::clone(&boolean),
        );
        // JSON documents stored in text columns
        registry.by_cross.insert(
            (LogicalType::Json, DriverType::Varchar),
            Arc::clone(&json),
        );

        for codec in [
            &unknown, &boolean, &byte, &short, &int, &long, &float, &double, &decimal, &string,
            &character, &bytes, &date, &time, &timestamp, &json,
        ] {
            registry
                .by_name
                .insert(codec.name().to_string(), Arc::clone(codec));
        }

        registry.default_codec = Some(unknown);
        registry
    }

    /// Codec for a logical type, falling back to the default codec.
    #[must_use]
    pub fn resolve_logical(&self, logical: &LogicalType) -> CodecRef {
        self.find_logical(logical)
            .unwrap_or_else(|| self.default_codec())
    }

    /// Codec for a driver type, falling back to the default codec.
    #[must_use]
    pub fn resolve_driver(&self, driver: DriverType) -> CodecRef {
        self.find_driver(driver)
            .unwrap_or_else(|| self.default_codec())
    }

    /// Codec for a logical/driver pair. Tries the pair, then the logical type, then the
    /// driver type, then the default codec.
    #[must_use]
    pub fn resolve_cross(&self, logical: &LogicalType, driver: DriverType) -> CodecRef {
        self.find_cross(logical, driver)
            .or_else(|| self.find_logical(logical))
            .or_else(|| self.find_driver(driver))
            .unwrap_or_else(|| self.default_codec())
    }

    /// Resolve from whatever type information is available.
    #[must_use]
    pub fn resolve(&self, logical: Option<&LogicalType>, driver: Option<DriverType>) -> CodecRef {
        match (logical, driver) {
            (Some(logical), Some(driver)) => self.resolve_cross(logical, driver),
            (Some(logical), None) => self.resolve_logical(logical),
            (None, Some(driver)) => self.resolve_driver(driver),
            (None, None) => self.default_codec(),
        }
    }

    /// Codec registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::UnresolvedCodec` if no registry in the chain knows the name.
    pub fn resolve_named(&self, name: &str) -> Result<CodecRef, SqlTemplateError> {
        self.find_named(name)
            .ok_or_else(|| SqlTemplateError::UnresolvedCodec(name.to_string()))
    }

    #[must_use]
    pub fn default_codec(&self) -> CodecRef {
        if let Some(codec) = &self.default_codec {
            return Arc::clone(codec);
        }
        match &self.base {
            Some(base) => base.default_codec(),
            None => Arc::new(UnknownCodec),
        }
    }

    fn find_logical(&self, logical: &LogicalType) -> Option<CodecRef> {
        self.by_logical
            .get(logical)
            .cloned()
            .or_else(|| self.base.as_ref()?.find_logical(logical))
    }

    fn find_driver(&self, driver: DriverType) -> Option<CodecRef> {
        self.by_driver
            .get(&driver)
            .cloned()
            .or_else(|| self.base.as_ref()?.find_driver(driver))
    }

    fn find_cross(&self, logical: &LogicalType, driver: DriverType) -> Option<CodecRef> {
        self.by_cross
            .get(&(logical.clone(), driver))
            .cloned()
            .or_else(|| self.base.as_ref()?.find_cross(logical, driver))
    }

    fn find_named(&self, name: &str) -> Option<CodecRef> {
        self.by_name
            .get(name)
            .cloned()
            .or_else(|| self.base.as_ref()?.find_named(name))
    }
}

/// Assembles a registry from an optional base plus overrides. Last registration wins.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    registry: TypeRegistry,
}

impl TypeRegistryBuilder {
    /// An empty registry with no base; unresolved types use [`UnknownCodec`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_base(base: Arc<TypeRegistry>) -> Self {
        Self {
            registry: TypeRegistry {
                base: Some(base),
                ..TypeRegistry::default()
            },
        }
    }

    #[must_use]
    pub fn register_logical(mut self, logical: LogicalType, codec: CodecRef) -> Self {
        self.registry.by_logical.insert(logical, codec);
        self
    }

    #[must_use]
    pub fn register_driver(mut self, driver: DriverType, codec: CodecRef) -> Self {
        self.registry.by_driver.insert(driver, codec);
        self
    }

    #[must_use]
    pub fn register_cross(
        mut self,
        logical: LogicalType,
        driver: DriverType,
        codec: CodecRef,
    ) -> Self {
        self.registry.by_cross.insert((logical, driver), codec);
        self
    }

    #[must_use]
    pub fn register_named(mut self, name: impl Into<String>, codec: CodecRef) -> Self {
        self.registry.by_name.insert(name.into(), codec);
        self
    }

    #[must_use]
    pub fn default_codec(mut self, codec: CodecRef) -> Self {
        self.registry.default_codec = Some(codec);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<TypeRegistry> {
        Arc::new(self.registry)
    }
}
