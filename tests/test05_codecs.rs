use std::sync::Arc;

use chrono::NaiveDate;
use sql_template::prelude::*;
use sql_template::test_utils::{ScriptedDriver, ScriptedExecution};

/// Upper-cases text on the way in; reads back unchanged.
#[derive(Debug)]
struct UpperCodec;

impl TypeCodec for UpperCodec {
    fn name(&self) -> &str {
        "upper"
    }

    fn to_driver(
        &self,
        value: &Value,
        _driver_type: Option<DriverType>,
    ) -> Result<DriverValue, SqlTemplateError> {
        match value {
            Value::Null => Ok(DriverValue::Null),
            Value::Text(s) => Ok(DriverValue::Text(s.to_uppercase())),
            other => Err(SqlTemplateError::ParameterError(format!(
                "upper codec cannot convert {other:?}"
            ))),
        }
    }

    fn from_driver(
        &self,
        value: DriverValue,
        _driver_type: Option<DriverType>,
    ) -> Result<Value, SqlTemplateError> {
        match value {
            DriverValue::Text(s) => Ok(Value::Text(s)),
            DriverValue::Null => Ok(Value::Null),
            other => Err(SqlTemplateError::ParameterError(format!(
                "upper codec cannot read {other:?}"
            ))),
        }
    }
}

fn engine_with_upper() -> TemplateEngine {
    let types = TypeRegistryBuilder::from_base(TypeRegistry::builtin())
        .register_named("upper", Arc::new(UpperCodec))
        .build();
    TemplateEngine::builder().types(types).build()
}

#[test]
fn named_codec_converts_the_bound_value() {
    let engine = engine_with_upper();
    let plan = engine
        .compile_str(
            "select * from users where name = #{name, typeHandler=upper}",
            &MapSource::new().with("name", "alice"),
        )
        .unwrap();
    assert_eq!(plan.args[0].codec().name(), "upper");
    assert_eq!(plan.args[0].to_driver().unwrap(), DriverValue::Text("ALICE".into()));

    let mut driver = ScriptedDriver::new();
    let def = StatementDef::new("q", "update users set name = #{name, typeHandler=upper}").unwrap();
    StatementExecutor::new(&engine)
        .execute(&mut driver, &def, &MapSource::new().with("name", "bob"))
        .unwrap();
    let log = driver.log();
    assert_eq!(log.binds.len(), 1);
    assert_eq!(log.binds[0].1, DriverValue::Text("BOB".into()));
}

#[test]
fn unknown_named_codec_fails_compilation() {
    let err = TemplateEngine::new()
        .compile_str(
            "select #{name, typeHandler=upper}",
            &MapSource::new().with("name", "alice"),
        )
        .unwrap_err();
    assert!(matches!(err, SqlTemplateError::UnresolvedCodec(ref name) if name == "upper"));
}

#[test]
fn declared_driver_type_selects_a_range_checked_codec() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new("q", "select * from t where id = #{id, jdbcType=INTEGER}").unwrap();

    let mut driver = ScriptedDriver::new();
    StatementExecutor::new(&engine)
        .execute(&mut driver, &def, &MapSource::new().with("id", 42))
        .unwrap();
    assert_eq!(
        driver.log().binds,
        vec![(1, DriverValue::Integer(42), Some(DriverType::Integer))]
    );

    let mut driver = ScriptedDriver::new();
    let err = StatementExecutor::new(&engine)
        .execute(&mut driver, &def, &MapSource::new().with("id", i64::MAX))
        .unwrap_err();
    assert!(matches!(
        err,
        SqlTemplateError::StatementExecution {
            phase: ExecutionPhase::Bound,
            ..
        }
    ));
    assert!(matches!(err.root_cause(), SqlTemplateError::ParameterError(_)));
    assert!(driver.log().all_released());
}

#[test]
fn values_are_typed_from_their_runtime_type() {
    let engine = TemplateEngine::new();
    let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    let ctx = MapSource::new()
        .with("flag", true)
        .with("day", day)
        .with("tags", Value::List(vec![Value::from("a"), Value::from("b")]));
    let plan = engine
        .compile_str("insert into t values (#{flag}, #{day}, #{tags})", &ctx)
        .unwrap();
    let driver_values: Vec<DriverValue> = plan
        .args
        .iter()
        .map(|arg| arg.to_driver().unwrap())
        .collect();
    assert_eq!(
        driver_values,
        vec![
            DriverValue::Integer(1),
            DriverValue::Text("2024-03-09".into()),
            DriverValue::Text(r#"["a","b"]"#.into()),
        ]
    );
    assert_eq!(plan.args[1].driver_type(), Some(DriverType::Date));
}

#[test]
fn untyped_null_binds_as_varchar() {
    let plan = TemplateEngine::new()
        .compile_str("select #{missing}", &MapSource::new())
        .unwrap();
    assert_eq!(plan.args[0].driver_type(), Some(DriverType::Varchar));
    assert_eq!(plan.args[0].to_driver().unwrap(), DriverValue::Null);
}

#[test]
fn other_types_fall_back_to_the_default_codec() {
    let plan = TemplateEngine::new()
        .compile_str(
            "select #{bean, javaType=com.example.Bean}",
            &MapSource::new().with("bean", "opaque"),
        )
        .unwrap();
    assert_eq!(plan.args[0].codec().name(), "unknown");
    assert_eq!(plan.args[0].to_driver().unwrap(), DriverValue::Text("opaque".into()));
}

#[test]
fn result_columns_read_through_the_declared_logical_type() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new(
        "days",
        "select day from events @{resultSet, name=days, javaType=date, shape=column}",
    )
    .unwrap();
    let mut driver = ScriptedDriver::new().with_script(ScriptedExecution::new().with_rows(
        &["day"],
        vec![
            vec![DriverValue::Text("2024-03-09".into())],
            vec![DriverValue::Null],
        ],
    ));
    let results = StatementExecutor::new(&engine)
        .call(&mut driver, &def, &MapSource::new())
        .unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    assert_eq!(
        results.get("days"),
        Some(&ResultValue::Rows(vec![Value::Date(day), Value::Null]))
    );
}
