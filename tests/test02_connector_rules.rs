use std::sync::Arc;

use sql_template::prelude::*;

fn compile(template: &str, ctx: &MapSource) -> StatementPlan {
    TemplateEngine::new().compile_str(template, ctx).unwrap()
}

/// Collapse runs of whitespace left where omitted rules used to be.
fn squash(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
fn where_keyword_is_added_once() {
    let sql = "select * from t @{and, a = :a} @{and, b = :b}";
    let plan = compile(sql, &MapSource::new().with("a", 1).with("b", 2));
    assert_eq!(plan.sql, "select * from t where a = ? and b = ?");

    let plan = compile(sql, &MapSource::new().with("b", 2));
    assert_eq!(squash(&plan.sql), "select * from t where b = ?");

    let plan = compile(sql, &MapSource::new());
    assert_eq!(plan.sql, "select * from t");
    assert!(plan.args.is_empty());
}

#[test]
fn connectors_follow_the_text_not_the_grammar() {
    let ctx = MapSource::new().with("a", 1);
    // trailing identifiers ending in `or` / `and` read as open connectors
    assert_eq!(
        compile("select * from t where color @{and, a = :a}", &ctx).sql,
        "select * from t where color a = ?"
    );
    assert_eq!(
        compile("select * from t where brand @{or, a = :a}", &ctx).sql,
        "select * from t where brand a = ?"
    );
    // `where` inside another word counts as the keyword
    assert_eq!(
        compile("select * from somewhere @{and, a = :a}", &ctx).sql,
        "select * from somewhere and a = ?"
    );
    assert_eq!(
        compile("SELECT * FROM t WHERE x = 1 @{and, a = :a}", &ctx).sql,
        "SELECT * FROM t WHERE x = 1 and a = ?"
    );
    // an update whose table name ends in `set` is already open
    assert_eq!(
        compile("update t_offset @{set, a = :a}", &ctx).sql,
        "update t_offset a = ?"
    );
}

#[test]
fn or_connects_after_an_open_where() {
    let plan = compile(
        "select * from t where @{or, a = :a} @{or, b = :b}",
        &MapSource::new().with("a", 1).with("b", 2),
    );
    assert_eq!(plan.sql, "select * from t where a = ? or b = ?");
}

#[test]
fn set_connects_with_commas() {
    let sql = "update t set @{set, name = #{name}} @{set, age = #{age}} where id = #{id}";
    let plan = compile(
        sql,
        &MapSource::new().with("name", "ann").with("age", 30).with("id", 1),
    );
    assert_eq!(plan.sql, "update t set name = ? , age = ? where id = ?");
    assert_eq!(
        plan.values(),
        vec![&Value::from("ann"), &Value::Int(30), &Value::Int(1)]
    );

    let plan = compile(sql, &MapSource::new().with("name", "ann").with("id", 1));
    assert_eq!(squash(&plan.sql), "update t set name = ? where id = ?");
}

#[test]
fn set_without_parameters_is_kept() {
    let plan = compile(
        "update t set @{set, touched = 1} @{set, name = :name}",
        &MapSource::new(),
    );
    assert_eq!(plan.sql, "update t set touched = 1");
}

#[test]
fn omitted_set_retracts_a_trailing_comma() {
    let plan = compile(
        "update t set a = 1, @{set, b = #{b}} where id = 1",
        &MapSource::new(),
    );
    assert_eq!(plan.sql, "update t set a = 1 where id = 1");
}

#[test]
fn gated_rules_follow_their_activation() {
    let sql = "select * from t where 1=1 @{ifand, flag, active = 1}";
    let plan = compile(sql, &MapSource::new().with("flag", true));
    assert_eq!(plan.sql, "select * from t where 1=1 and active = 1");
    let plan = compile(sql, &MapSource::new().with("flag", false));
    assert_eq!(plan.sql, "select * from t where 1=1");

    let sql = "select * from t @{if, n > 2, limit 10}";
    assert_eq!(compile(sql, &MapSource::new().with("n", 3)).sql, "select * from t limit 10");
    assert_eq!(compile(sql, &MapSource::new().with("n", 1)).sql, "select * from t");
}

#[test]
fn missing_activation_is_a_syntax_error() {
    assert!(matches!(
        Template::parse("select 1 @{if}"),
        Err(SqlTemplateError::TemplateSyntax { .. })
    ));
}

#[test]
fn no_null_keeps_bodies_with_a_value() {
    let sql = "select * from t where 1=1 @{nonull, and a = :a}";
    assert_eq!(
        compile(sql, &MapSource::new().with("a", 1)).sql,
        "select * from t where 1=1 and a = ?"
    );
    assert_eq!(compile(sql, &MapSource::new()).sql, "select * from t where 1=1");
}

#[test]
fn in_expands_lists() {
    let sql = "select * from t where id in @{in, :ids}";
    let plan = compile(
        sql,
        &MapSource::new().with("ids", Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])),
    );
    assert_eq!(plan.sql, "select * from t where id in (?, ?, ?)");
    assert_eq!(
        plan.values(),
        vec![&Value::Int(1), &Value::Int(2), &Value::Int(3)]
    );
    assert_eq!(plan.args[1].expr(), Some("ids[1]"));

    let plan = compile(sql, &MapSource::new().with("ids", 7));
    assert_eq!(plan.sql, "select * from t where id in (?)");

    let plan = compile(sql, &MapSource::new().with("ids", Value::List(Vec::new())));
    assert_eq!(plan.sql, "select * from t where id in");
    assert!(plan.args.is_empty());
}

#[test]
fn in_inside_a_predicate_is_dropped_when_empty() {
    let sql = "select * from t where 1=1 @{and, id in @{in, :ids}}";
    let plan = compile(sql, &MapSource::new());
    assert_eq!(plan.sql, "select * from t where 1=1");

    let plan = compile(
        sql,
        &MapSource::new().with("ids", Value::List(vec![Value::Int(4), Value::Int(5)])),
    );
    assert_eq!(plan.sql, "select * from t where 1=1 and id in (?, ?)");
}

#[test]
fn derived_value_rules() {
    let plan = compile(
        "insert into u (pw, n) values (@{md5, pw}, @{eval, n + 1})",
        &MapSource::new().with("pw", "abc").with("n", 1),
    );
    assert_eq!(plan.sql, "insert into u (pw, n) values (?, ?)");
    assert_eq!(
        plan.values(),
        vec![
            &Value::from("900150983cd24fb0d6963f7d28e17f72"),
            &Value::Int(2)
        ]
    );

    let plan = compile("values (@{uuid36}, @{uuid32})", &MapSource::new());
    let ids: Vec<String> = plan.values().iter().map(|v| v.render()).collect();
    assert_eq!(ids[0].len(), 36);
    assert_eq!(ids[0].matches('-').count(), 4);
    assert_eq!(ids[1].len(), 32);
    assert!(ids[1].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn text_and_bind() {
    let plan = compile(
        "select * from t @{text, order by id}",
        &MapSource::new(),
    );
    assert_eq!(plan.sql, "select * from t order by id");

    let plan = compile(
        "select @{bind, full, first + ' ' + last}:full",
        &MapSource::new().with("first", "a").with("last", "b"),
    );
    assert_eq!(plan.sql, "select ?");
    assert_eq!(plan.values(), vec![&Value::from("a b")]);
}

#[test]
fn arg_rule_takes_param_options() {
    let plan = compile(
        "select @{arg, n, jdbcType=VARCHAR}",
        &MapSource::new().with("n", 5),
    );
    assert_eq!(plan.sql, "select ?");
    assert_eq!(plan.args[0].driver_type(), Some(DriverType::Varchar));
}

#[derive(Debug)]
struct Tenant;

impl RuleHandler for Tenant {
    fn uses_activation(&self) -> bool {
        true
    }

    fn execute(
        &self,
        ctx: &mut RenderContext<'_>,
        builder: &mut SqlBuilder,
        invocation: &RuleInvocation<'_>,
    ) -> Result<(), SqlTemplateError> {
        let column = invocation.value.unwrap_or("tenant_id");
        let tenant = ctx.lookup("tenant")?.unwrap_or_default();
        builder.append_text(&format!("{column} = "));
        builder.append_placeholder(BoundArg::input(ctx.types(), Some("tenant"), tenant));
        Ok(())
    }
}

#[test]
fn custom_rules_use_the_default_activation_test() {
    let rules = RuleRegistryBuilder::from_base(RuleRegistry::builtin())
        .register_handler("tenant", Arc::new(Tenant))
        .build();
    let engine = TemplateEngine::builder().rules(rules).build();
    let sql = "select * from t where @{tenant, scoped, org_id}";

    let plan = engine
        .compile_str(sql, &MapSource::new().with("scoped", true).with("tenant", 9))
        .unwrap();
    assert_eq!(plan.sql, "select * from t where org_id = ?");
    assert_eq!(plan.values(), vec![&Value::Int(9)]);

    // the default test admits every invocation
    let plan = engine
        .compile_str(sql, &MapSource::new().with("scoped", false).with("tenant", 9))
        .unwrap();
    assert_eq!(plan.sql, "select * from t where org_id = ?");
}
