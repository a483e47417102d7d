use std::fmt;

use crate::codec::{CodecRef, TypeRegistry};
use crate::error::SqlTemplateError;
use crate::types::{ArgMode, DriverType, DriverValue, LogicalType, Value};

/// One placeholder's worth of binding information.
///
/// Built by the rule engine and immutable afterwards. Every argument carries exactly
/// one codec, chosen when the argument is built.
#[derive(Clone)]
pub struct BoundArg {
    name: Option<String>,
    expr: Option<String>,
    value: Value,
    mode: ArgMode,
    driver_type: Option<DriverType>,
    logical_type: Option<LogicalType>,
    codec: CodecRef,
}

/// The explicit typing a `#{}` clause (or a rule) asks for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgTyping {
    pub name: Option<String>,
    pub mode: ArgMode,
    pub driver_type: Option<DriverType>,
    pub logical_type: Option<LogicalType>,
    pub codec_name: Option<String>,
}

impl ArgTyping {
    #[must_use]
    pub fn input() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ArgMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_driver_type(mut self, driver_type: DriverType) -> Self {
        self.driver_type = Some(driver_type);
        self
    }

    #[must_use]
    pub fn with_logical_type(mut self, logical_type: LogicalType) -> Self {
        self.logical_type = Some(logical_type);
        self
    }
}

impl BoundArg {
    /// Build an argument from an (already evaluated) value and its declared typing.
    ///
    /// OUT arguments ignore `value`. A NULL with no type information is typed as a
    /// string so the placeholder always binds.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::UnresolvedCodec` when `typing.codec_name` is unknown.
    pub fn build(
        types: &TypeRegistry,
        expr: Option<&str>,
        value: Value,
        typing: &ArgTyping,
    ) -> Result<BoundArg, SqlTemplateError> {
        let value = if typing.mode == ArgMode::Out {
            Value::Null
        } else {
            value
        };

        let mut logical_type = typing
            .logical_type
            .clone()
            .or_else(|| LogicalType::of(&value));
        let mut driver_type = typing.driver_type;
        if logical_type.is_none() && driver_type.is_none() {
            logical_type = Some(LogicalType::String);
            driver_type = Some(DriverType::Varchar);
        }
        if driver_type.is_none() {
            driver_type = logical_type.as_ref().map(DriverType::for_logical);
        }

        let codec = match &typing.codec_name {
            Some(name) => types.resolve_named(name)?,
            None => match (&typing.logical_type, typing.driver_type) {
                // explicit typing wins over the runtime type of the value
                (Some(logical), Some(driver)) => types.resolve_cross(logical, driver),
                (Some(logical), None) => types.resolve_logical(logical),
                (None, Some(driver)) => types.resolve_driver(driver),
                (None, None) => types.resolve(logical_type.as_ref(), None),
            },
        };

        Ok(BoundArg {
            name: typing.name.clone(),
            expr: expr.map(str::to_string),
            value,
            mode: typing.mode,
            driver_type,
            logical_type,
            codec,
        })
    }

    /// Shorthand for an IN argument typed from its runtime value.
    #[must_use]
    pub fn input(types: &TypeRegistry, expr: Option<&str>, value: Value) -> BoundArg {
        let logical_type = LogicalType::of(&value).unwrap_or(LogicalType::String);
        let driver_type = DriverType::for_logical(&logical_type);
        BoundArg {
            name: None,
            expr: expr.map(str::to_string),
            codec: types.resolve_logical(&logical_type),
            value,
            mode: ArgMode::In,
            driver_type: Some(driver_type),
            logical_type: Some(logical_type),
        }
    }

    /// Convert the value for the driver with this argument's codec.
    ///
    /// # Errors
    ///
    /// Returns whatever conversion error the codec reports.
    pub fn to_driver(&self) -> Result<DriverValue, SqlTemplateError> {
        self.codec.to_driver(&self.value, self.driver_type)
    }

    /// Convert a value returned for an OUT/INOUT argument.
    ///
    /// # Errors
    ///
    /// Returns whatever conversion error the codec reports.
    pub fn from_driver(&self, value: DriverValue) -> Result<Value, SqlTemplateError> {
        self.codec.from_driver(value, self.driver_type)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn expr(&self) -> Option<&str> {
        self.expr.as_deref()
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn mode(&self) -> ArgMode {
        self.mode
    }

    #[must_use]
    pub fn driver_type(&self) -> Option<DriverType> {
        self.driver_type
    }

    #[must_use]
    pub fn logical_type(&self) -> Option<&LogicalType> {
        self.logical_type.as_ref()
    }

    #[must_use]
    pub fn codec(&self) -> &CodecRef {
        &self.codec
    }

    /// Name an OUT value is stored under: declared name, else the expression.
    #[must_use]
    pub fn result_name(&self) -> Option<&str> {
        self.name().or(self.expr())
    }
}

impl fmt::Debug for BoundArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundArg")
            .field("name", &self.name)
            .field("expr", &self.expr)
            .field("value", &self.value)
            .field("mode", &self.mode)
            .field("driver_type", &self.driver_type)
            .field("logical_type", &self.logical_type)
            .field("codec", &self.codec.name())
            .finish()
    }
}

impl fmt::Display for BoundArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = self.result_name() {
            write!(f, "{label}=")?;
        }
        if self.mode == ArgMode::Out {
            return f.write_str("<out>");
        }
        write!(f, "{}", self.value.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_without_types_binds_as_string() {
        let types = TypeRegistry::builtin();
        let arg = BoundArg::build(&types, Some("missing"), Value::Null, &ArgTyping::input()).unwrap();
        assert_eq!(arg.logical_type(), Some(&LogicalType::String));
        assert_eq!(arg.driver_type(), Some(DriverType::Varchar));
        assert_eq!(arg.codec().name(), "string");
        assert_eq!(arg.to_driver().unwrap(), DriverValue::Null);
    }

    #[test]
    fn out_arguments_drop_their_value() {
        let types = TypeRegistry::builtin();
        let typing = ArgTyping::input()
            .with_mode(ArgMode::Out)
            .with_driver_type(DriverType::Integer);
        let arg = BoundArg::build(&types, Some("x"), Value::Int(9), &typing).unwrap();
        assert!(arg.value().is_null());
        assert_eq!(arg.codec().name(), "int");
        assert_eq!(arg.to_string(), "x=<out>");
    }

    #[test]
    fn runtime_type_picks_the_codec() {
        let types = TypeRegistry::builtin();
        let arg = BoundArg::build(&types, None, Value::Bool(true), &ArgTyping::input()).unwrap();
        assert_eq!(arg.codec().name(), "bool");
        assert_eq!(arg.driver_type(), Some(DriverType::Boolean));
    }

    #[test]
    fn unknown_type_handler_is_an_error() {
        let types = TypeRegistry::builtin();
        let typing = ArgTyping {
            codec_name: Some("nope".into()),
            ..ArgTyping::input()
        };
        assert!(matches!(
            BoundArg::build(&types, None, Value::Int(1), &typing),
            Err(SqlTemplateError::UnresolvedCodec(_))
        ));
    }
}
