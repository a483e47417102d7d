use sql_template::prelude::*;

const OWNER_TEMPLATE: &str =
    "select * from t where 1=1 @{and, ownerId = #{ownerID}} @{and, ownerType = #{ownerType}}";

/// A source that refuses every lookup.
struct Refusing;

impl ArgSource for Refusing {
    fn lookup(&self, name: &str) -> Result<Option<Value>, SqlTemplateError> {
        Err(SqlTemplateError::Expression(format!("`{name}` must not be read")))
    }
}

#[test]
fn both_predicates_survive_when_bound() {
    let engine = TemplateEngine::new();
    let ctx = MapSource::new()
        .with("ownerID", "123")
        .with("ownerType", "SYSTEM");
    let plan = engine.compile_str(OWNER_TEMPLATE, &ctx).unwrap();
    assert_eq!(
        plan.sql,
        "select * from t where 1=1 and ownerId = ? and ownerType = ?"
    );
    assert_eq!(
        plan.values(),
        vec![&Value::from("123"), &Value::from("SYSTEM")]
    );
}

#[test]
fn null_predicate_is_dropped_without_trailing_space() {
    let engine = TemplateEngine::new();
    let ctx = MapSource::new()
        .with("ownerID", "123")
        .with("ownerType", Value::Null);
    let plan = engine.compile_str(OWNER_TEMPLATE, &ctx).unwrap();
    assert_eq!(plan.sql, "select * from t where 1=1 and ownerId = ?");
    assert_eq!(plan.values(), vec![&Value::from("123")]);

    // a missing key reads as NULL too
    let plan = engine
        .compile_str(OWNER_TEMPLATE, &MapSource::new().with("ownerID", "123"))
        .unwrap();
    assert_eq!(plan.sql, "select * from t where 1=1 and ownerId = ?");
}

#[test]
fn out_parameter_never_reads_the_context() {
    let engine = TemplateEngine::new();
    let plan = engine
        .compile_str("{call next_id(#{x, mode=out, jdbcType=INTEGER})}", &Refusing)
        .unwrap();
    assert_eq!(plan.sql, "{call next_id(?)}");
    let arg = &plan.args[0];
    assert_eq!(arg.mode(), ArgMode::Out);
    assert_eq!(arg.driver_type(), Some(DriverType::Integer));
    assert!(arg.value().is_null());
    assert_eq!(arg.result_name(), Some("x"));

    // an IN parameter does read it
    assert!(matches!(
        engine.compile_str("select #{x}", &Refusing),
        Err(SqlTemplateError::Expression(_))
    ));
}

#[test]
fn compilation_is_deterministic() {
    let engine = TemplateEngine::new();
    let ctx = MapSource::new().with("ownerID", "1").with("ownerType", "A");
    let first = engine.compile_str(OWNER_TEMPLATE, &ctx).unwrap();
    let second = engine.compile_str(OWNER_TEMPLATE, &ctx).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.values(), second.values());
    assert_eq!(first.args_snapshot(), second.args_snapshot());
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn every_parameter_form_becomes_a_placeholder() {
    let engine = TemplateEngine::new();
    let ctx = MapSource::new()
        .with("a", 1)
        .with("b", "two")
        .with("c", true)
        .with("arg0", 4.5);
    let plan = engine
        .compile_str("select * from t where a = #{a} and b = :b and c = &c and d = ?", &ctx)
        .unwrap();
    assert_eq!(
        plan.sql,
        "select * from t where a = ? and b = ? and c = ? and d = ?"
    );
    assert_eq!(
        plan.values(),
        vec![
            &Value::Int(1),
            &Value::from("two"),
            &Value::Bool(true),
            &Value::Float(4.5)
        ]
    );
}

#[test]
fn positional_arguments_follow_numbering() {
    let engine = TemplateEngine::new();
    let ctx = MapSource::positional(["x", "y"]);
    let plan = engine
        .compile_str("select * from t where a = ?2 and b = ?1", &ctx)
        .unwrap();
    assert_eq!(plan.sql, "select * from t where a = ? and b = ?");
    assert_eq!(plan.values(), vec![&Value::from("y"), &Value::from("x")]);
}

#[test]
fn raw_splices_text_and_nested_paths() {
    let engine = TemplateEngine::new();
    let ctx = MapSource::from_json(serde_json::json!({
        "table": "users",
        "filter": { "name": "ann", "ids": [1, 2] }
    }))
    .unwrap();
    let plan = engine
        .compile_str(
            "select * from ${table} where name = #{filter.name} and id = #{filter.ids[1]}",
            &ctx,
        )
        .unwrap();
    assert_eq!(plan.sql, "select * from users where name = ? and id = ?");
    assert_eq!(plan.values(), vec![&Value::from("ann"), &Value::Int(2)]);
}

#[test]
fn literals_and_comments_are_left_alone() {
    let engine = TemplateEngine::new();
    let plan = engine
        .compile_str(
            "select ':a', a::text -- :b\nfrom t where c = :c",
            &MapSource::new().with("c", 1),
        )
        .unwrap();
    assert_eq!(plan.sql, "select ':a', a::text -- :b\nfrom t where c = ?");
    assert_eq!(plan.args.len(), 1);
}

#[test]
fn syntax_errors_carry_the_template() {
    let engine = TemplateEngine::new();
    match engine.compile_str("select #{a", &MapSource::new()) {
        Err(SqlTemplateError::TemplateSyntax { template, .. }) => assert_eq!(template, "select #{a"),
        other => panic!("expected a syntax error, got {other:?}"),
    }
    assert!(engine.cache().is_empty());
}

#[test]
fn rule_payloads_are_checked_when_parsing() {
    for template in [
        "select @{if, a +, x}",
        "select * from t where 1=1 @{ifand, a +, x = 1}",
        "select @{eval, a +}",
        "select @{md5, (}",
        "select @{in, a +}",
        "select @{ifin, ok, a +}",
        "select @{bind, y, a +}",
        "select @{bind, y}",
        "select @{arg, x, mode=sideways}",
        "select @{arg, x, color=red}",
        "call p() @{resultSet, shape=cube}",
    ] {
        assert!(
            matches!(Template::parse(template), Err(SqlTemplateError::TemplateSyntax { .. })),
            "{template}"
        );
    }
    // a well-formed payload that reads nothing is fine until it is compiled
    assert!(Template::parse("select @{eval, a + 1} @{if, b, x} @{arg, c, mode=inout}").is_ok());
}

#[test]
fn plan_serializes_for_tooling() {
    let engine = TemplateEngine::new();
    let plan = engine
        .compile_str(
            "call p(#{id, jdbcType=BIGINT}) @{resultSet, name=rows}",
            &MapSource::new().with("id", 9),
        )
        .unwrap();
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["sql"], "call p(?)");
    assert_eq!(json["args"][0]["value"], 9);
    assert_eq!(json["args"][0]["jdbcType"], "BIGINT");
    assert_eq!(json["results"]["descriptors"][0]["name"], "rows");
}
