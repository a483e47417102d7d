use md5::{Digest, Md5};
use uuid::Uuid;

use super::RuleInvocation;
use super::conditional::single_target;
use crate::arg::{ArgTyping, BoundArg};
use crate::builder::SqlBuilder;
use crate::engine::RenderContext;
use crate::error::SqlTemplateError;
use crate::types::{LogicalType, Value};

pub(super) fn arg(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    let Some(spec) = invocation.param else {
        return Err(SqlTemplateError::Expression(format!(
            "rule `{}` needs a parameter: `{}`",
            invocation.name,
            invocation.value.unwrap_or_default()
        )));
    };
    ctx.bind_param(spec, builder)
}

pub(super) fn include(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    let id = invocation.value.map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Err(SqlTemplateError::ConfigError(
            "include needs a fragment id".into(),
        ));
    }
    ctx.include(id, builder)
}

pub(super) fn eval(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    let Some(target) = single_target(invocation)? else {
        return Err(missing_expression(invocation));
    };
    let value = target.expr.eval(ctx.source())?;
    let arg = BoundArg::build(ctx.types(), Some(&target.source), value, &target.typing)?;
    builder.append_placeholder(arg);
    Ok(())
}

pub(super) fn md5(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    let Some(target) = single_target(invocation)? else {
        return Err(missing_expression(invocation));
    };
    let value = match target.expr.eval(ctx.source())? {
        Value::Null => Value::Null,
        value => {
            let mut hasher = Md5::new();
            hasher.update(value.render().as_bytes());
            Value::Text(hex::encode(hasher.finalize()))
        }
    };
    let typing = ArgTyping::input().with_logical_type(LogicalType::String);
    let arg = BoundArg::build(ctx.types(), Some(&target.source), value, &typing)?;
    builder.append_placeholder(arg);
    Ok(())
}

pub(super) fn uuid(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
    hyphenated: bool,
) {
    let id = Uuid::new_v4();
    let text = if hyphenated {
        id.hyphenated().to_string()
    } else {
        id.simple().to_string()
    };
    builder.append_placeholder(BoundArg::input(
        ctx.types(),
        Some(invocation.name),
        Value::Text(text),
    ));
}

pub(super) fn bind(
    ctx: &mut RenderContext<'_>,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    let name = invocation.active.map(str::trim).unwrap_or_default();
    let Some(target) = invocation.target.filter(|_| !name.is_empty()) else {
        return Err(SqlTemplateError::ConfigError(
            "bind needs a name and an expression: @{bind, name, expr}".into(),
        ));
    };
    let value = target.expr.eval(ctx.source())?;
    ctx.bind(name, value);
    Ok(())
}

fn missing_expression(invocation: &RuleInvocation<'_>) -> SqlTemplateError {
    SqlTemplateError::Expression(format!("rule `{}` needs an expression", invocation.name))
}
