use std::collections::BTreeMap;

use sql_template::prelude::*;
use sql_template::test_utils::{FailPoint, ScriptedDriver, ScriptedExecution};

fn text(s: &str) -> DriverValue {
    DriverValue::Text(s.to_string())
}

fn row(pairs: &[(&str, Value)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn two_cursors() -> ScriptedExecution {
    ScriptedExecution::new()
        .with_rows(&["id"], vec![vec![DriverValue::Integer(1)]])
        .with_rows(&["name"], vec![vec![text("a")], vec![text("b")]])
}

#[test]
fn callable_results_are_stored_under_declared_names() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new(
        "proc",
        "call two_sets() @{resultSet, name=res1} @{resultSet, name=res2}",
    )
    .unwrap()
    .with_policy(ExecutePolicy::callable());
    let mut driver = ScriptedDriver::new().with_script(two_cursors());

    let results = StatementExecutor::new(&engine)
        .call(&mut driver, &def, &MapSource::new())
        .unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["res1", "res2"]);
    assert_eq!(
        results.get("res1"),
        Some(&ResultValue::Rows(vec![row(&[("id", Value::Int(1))])]))
    );
    assert_eq!(
        results.get("res2").and_then(ResultValue::as_rows).map(<[Value]>::len),
        Some(2)
    );

    let log = driver.log();
    assert_eq!(log.prepared, vec!["call two_sets()".to_string()]);
    assert!(log.all_released());
}

#[test]
fn undeclared_events_get_positional_names() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new("proc", "call mixed()")
        .unwrap()
        .with_policy(ExecutePolicy::callable());
    let script = ScriptedExecution::new()
        .with_rows(&["a"], vec![vec![DriverValue::Integer(1)]])
        .with_update_count(4)
        .with_rows(&["b"], Vec::new());
    let mut driver = ScriptedDriver::new().with_script(script);

    let results = StatementExecutor::new(&engine)
        .call(&mut driver, &def, &MapSource::new())
        .unwrap();
    assert_eq!(
        results.keys().collect::<Vec<_>>(),
        vec!["#result-set-1", "#update-count-2", "#result-set-3"]
    );
    assert_eq!(
        results.get("#update-count-2"),
        Some(&ResultValue::UpdateCount(4))
    );
    assert_eq!(results.get("#result-set-3"), Some(&ResultValue::Rows(Vec::new())));
}

#[test]
fn descriptors_apply_by_position_and_kind() {
    let engine = TemplateEngine::new();
    // position 2 declares a result set but the driver reports a count there
    let def = StatementDef::new(
        "proc",
        "call p() @{resultSet, name=first} @{resultSet, name=second} @{defaultResult, rowMapper=list}",
    )
    .unwrap()
    .with_policy(ExecutePolicy::callable());
    let script = ScriptedExecution::new()
        .with_rows(&["x", "y"], vec![vec![DriverValue::Integer(1), text("q")]])
        .with_update_count(2)
        .with_rows(&["z"], vec![vec![DriverValue::Real(0.5)]]);
    let mut driver = ScriptedDriver::new().with_script(script);

    let results = StatementExecutor::new(&engine)
        .call(&mut driver, &def, &MapSource::new())
        .unwrap();
    assert_eq!(
        results.keys().collect::<Vec<_>>(),
        vec!["first", "#update-count-2", "#result-set-3"]
    );
    // the default descriptor reads rows as lists
    assert_eq!(
        results.get("#result-set-3"),
        Some(&ResultValue::Rows(vec![Value::List(vec![Value::Float(0.5)])]))
    );
}

#[test]
fn shapes_convert_cursors() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new(
        "proc",
        "call p() \
         @{resultSet, name=total, javaType=java.lang.Long, shape=scalar} \
         @{resultSet, name=names, javaType=java.lang.String} \
         @{resultSet, name=one, shape=row} \
         @{resultSet, name=none, shape=row}",
    )
    .unwrap()
    .with_policy(ExecutePolicy::callable());
    let script = ScriptedExecution::new()
        .with_rows(&["count"], vec![vec![text("12")]])
        .with_rows(&["name"], vec![vec![text("a")], vec![text("b")]])
        .with_rows(
            &["id", "name"],
            vec![
                vec![DriverValue::Integer(1), text("a")],
                vec![DriverValue::Integer(2), text("b")],
            ],
        )
        .with_rows(&["id"], Vec::new());
    let mut driver = ScriptedDriver::new().with_script(script);

    let results = StatementExecutor::new(&engine)
        .call(&mut driver, &def, &MapSource::new())
        .unwrap();
    assert_eq!(results.get("total"), Some(&ResultValue::Scalar(Value::Int(12))));
    assert_eq!(
        results.get("names"),
        Some(&ResultValue::Rows(vec![Value::from("a"), Value::from("b")]))
    );
    assert_eq!(
        results.get("one"),
        Some(&ResultValue::Row(Some(row(&[
            ("id", Value::Int(1)),
            ("name", Value::from("a"))
        ]))))
    );
    assert_eq!(results.get("none"), Some(&ResultValue::Row(None)));
    assert!(driver.log().all_released());
}

#[test]
fn out_and_inout_parameters_are_read_back() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new(
        "proc",
        "call bump(#{x, mode=out, jdbcType=INTEGER}, #{y, name=total, mode=inout, jdbcType=BIGINT}, ?)",
    )
    .unwrap()
    .with_policy(ExecutePolicy::callable());
    let script = ScriptedExecution::new()
        .with_out(1, DriverValue::Integer(42))
        .with_out(2, DriverValue::Integer(6));
    let mut driver = ScriptedDriver::new().with_script(script);
    let ctx = MapSource::new().with("y", 5).with("arg0", "tag");

    let results = StatementExecutor::new(&engine)
        .call(&mut driver, &def, &ctx)
        .unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["x", "total"]);
    assert_eq!(results.get("x"), Some(&ResultValue::Scalar(Value::Int(42))));
    assert_eq!(results.get("total"), Some(&ResultValue::Scalar(Value::Int(6))));

    let log = driver.log();
    assert_eq!(
        log.registered_outs,
        vec![(1, DriverType::Integer), (2, DriverType::Bigint)]
    );
    let bound: Vec<usize> = log.binds.iter().map(|(idx, _, _)| *idx).collect();
    assert_eq!(bound, vec![2, 3]);
    assert_eq!(log.binds[0].1, DriverValue::Integer(5));
}

#[test]
fn multiple_result_policy_combines_plain_queries() {
    let engine = TemplateEngine::new();
    let executor = StatementExecutor::new(&engine);
    let def = |policy: MultipleResultPolicy| {
        StatementDef::new("q", "select 1; select 2")
            .unwrap()
            .with_policy(ExecutePolicy::default().with_multiple(policy))
    };

    let mut driver = ScriptedDriver::new().with_script(two_cursors());
    let first = executor
        .query(&mut driver, &def(MultipleResultPolicy::First), &MapSource::new())
        .unwrap();
    assert_eq!(first, ResultValue::Rows(vec![row(&[("id", Value::Int(1))])]));

    let mut driver = ScriptedDriver::new().with_script(two_cursors());
    let last = executor
        .query(&mut driver, &def(MultipleResultPolicy::Last), &MapSource::new())
        .unwrap();
    assert_eq!(last.as_rows().map(<[Value]>::len), Some(2));

    let mut driver = ScriptedDriver::new().with_script(two_cursors());
    let all = executor
        .query(&mut driver, &def(MultipleResultPolicy::All), &MapSource::new())
        .unwrap();
    assert_eq!(all.as_multiple().map(<[ResultValue]>::len), Some(2));

    let mut driver = ScriptedDriver::new()
        .with_script(ScriptedExecution::new().with_update_count(3));
    let outcome = executor
        .execute(&mut driver, &def(MultipleResultPolicy::First), &MapSource::new())
        .unwrap();
    assert_eq!(outcome, StatementOutcome::Value(ResultValue::UpdateCount(3)));

    let mut driver = ScriptedDriver::new();
    let empty = executor
        .query(&mut driver, &def(MultipleResultPolicy::All), &MapSource::new())
        .unwrap();
    assert_eq!(empty, ResultValue::Empty);
}

#[test]
fn declared_results_make_execute_return_a_map() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new("q", "select id from t @{resultSet, name=ids, rowMapper=list}").unwrap();
    let mut driver = ScriptedDriver::new().with_script(
        ScriptedExecution::new().with_rows(&["id"], vec![vec![DriverValue::Integer(3)]]),
    );
    let outcome = StatementExecutor::new(&engine)
        .execute(&mut driver, &def, &MapSource::new())
        .unwrap();
    let results = outcome.into_results().unwrap();
    assert_eq!(
        results.get("ids"),
        Some(&ResultValue::Rows(vec![Value::List(vec![Value::Int(3)])]))
    );
}

#[test]
fn case_insensitive_policy_matches_columns_and_keys() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new("proc", "call p() @{resultSet, name=Rows}")
        .unwrap()
        .with_policy(ExecutePolicy::callable().with_case_insensitive(true));
    let mut driver = ScriptedDriver::new().with_script(
        ScriptedExecution::new().with_rows(&["ID"], vec![vec![DriverValue::Integer(1)]]),
    );
    let results = StatementExecutor::new(&engine)
        .call(&mut driver, &def, &MapSource::new())
        .unwrap();
    assert_eq!(
        results.get("rows"),
        Some(&ResultValue::Rows(vec![row(&[("id", Value::Int(1))])]))
    );
}

fn failing_run(point: FailPoint) -> (SqlTemplateError, ScriptedDriver) {
    let engine = TemplateEngine::new();
    let def = StatementDef::new("q", "select * from t where id = #{id}").unwrap();
    let mut driver = ScriptedDriver::new().with_script(two_cursors().failing_at(point));
    let err = StatementExecutor::new(&engine)
        .query(&mut driver, &def, &MapSource::new().with("id", 7))
        .unwrap_err();
    (err, driver)
}

#[test]
fn driver_failures_report_their_phase() {
    for (point, phase) in [
        (FailPoint::Prepare, ExecutionPhase::Prepared),
        (FailPoint::Bind, ExecutionPhase::Bound),
        (FailPoint::Execute, ExecutionPhase::Executed),
        (FailPoint::Fetch, ExecutionPhase::Extracting),
    ] {
        let (err, driver) = failing_run(point);
        match &err {
            SqlTemplateError::StatementExecution {
                phase: reported,
                sql,
                args,
                ..
            } => {
                assert_eq!(*reported, phase);
                assert_eq!(sql, "select * from t where id = ?");
                assert!(args.contains('7'), "{args}");
            }
            other => panic!("expected a statement error, got {other:?}"),
        }
        assert!(matches!(err.root_cause(), SqlTemplateError::DriverError(_)));
        assert!(driver.log().all_released(), "{point:?}");
    }
}

#[test]
fn fetch_failure_releases_the_open_cursor() {
    let (_, driver) = failing_run(FailPoint::Fetch);
    let log = driver.log();
    assert_eq!(log.cursors_opened, 1);
    assert_eq!(log.cursors_closed, 1);
    assert_eq!(log.statements_closed, 1);
}

#[test]
fn compile_errors_are_not_wrapped() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new("q", "select @{nope, x}").unwrap();
    let mut driver = ScriptedDriver::new();
    assert!(matches!(
        StatementExecutor::new(&engine).query(&mut driver, &def, &MapSource::new()),
        Err(SqlTemplateError::UnresolvedRule(_))
    ));
    assert!(driver.log().prepared.is_empty());
}

#[test]
fn paging_rewrites_the_prepared_sql() {
    let engine = TemplateEngine::new();
    let def = StatementDef::new("q", "select * from t order by id")
        .unwrap()
        .with_policy(ExecutePolicy::default().with_page(Page::number(1, 20)));
    let mut driver = ScriptedDriver::new();
    StatementExecutor::new(&engine)
        .query(&mut driver, &def, &MapSource::new())
        .unwrap();
    let log = driver.log();
    assert_eq!(log.prepared, vec!["select * from t order by id LIMIT ? OFFSET ?".to_string()]);
    let values: Vec<&DriverValue> = log.binds.iter().map(|(_, v, _)| v).collect();
    assert_eq!(values, vec![&DriverValue::Integer(20), &DriverValue::Integer(20)]);

    let callable = StatementDef::new("c", "call p()")
        .unwrap()
        .with_policy(ExecutePolicy::callable().with_page(Page::new(0, 10)));
    assert!(matches!(
        StatementExecutor::new(&engine).call(&mut driver, &callable, &MapSource::new()),
        Err(SqlTemplateError::ConfigError(_))
    ));
}
