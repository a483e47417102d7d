use super::{ConditionKind, RuleInvocation};
use crate::arg::BoundArg;
use crate::builder::SqlBuilder;
use crate::engine::RenderContext;
use crate::error::SqlTemplateError;
use crate::template::RuleTarget;
use crate::types::Value;

pub(super) fn when(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    if let Some(body) = invocation.body {
        ctx.render(body, builder)?;
    }
    Ok(())
}

pub(super) fn no_null(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    let scratch = ctx.render_scratch(invocation.body)?;
    if has_non_null(&scratch) {
        builder.absorb(scratch);
    }
    Ok(())
}

pub(super) fn condition(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
    kind: ConditionKind,
    gated: bool,
) -> Result<(), SqlTemplateError> {
    let scratch = ctx.render_scratch(invocation.body)?;
    let keep = if scratch.sql().trim().is_empty() {
        false
    } else if gated {
        true
    } else {
        match kind {
            // no parameters, or only NULL ones, drops the predicate
            ConditionKind::And | ConditionKind::Or => has_non_null(&scratch),
            ConditionKind::Set => scratch.args().is_empty() || has_non_null(&scratch),
        }
    };

    if keep {
        builder.append_clause(kind.clause(), scratch);
    } else if kind == ConditionKind::Set {
        builder.retract_trailing(",");
    }
    Ok(())
}

fn has_non_null(builder: &SqlBuilder) -> bool {
    builder.args().iter().any(|arg| !arg.value().is_null())
}

pub(super) fn expand_in(
    ctx: &mut RenderContext<'_>,
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
) -> Result<(), SqlTemplateError> {
    let Some(target) = single_target(invocation)? else {
        return Ok(());
    };
    let value = target.expr.eval(ctx.source())?;
    let items = match value {
        Value::Null => return Ok(()),
        Value::List(items) => items,
        scalar => vec![scalar],
    };
    if items.is_empty() {
        return Ok(());
    }

    builder.append_text("(");
    for (idx, item) in items.into_iter().enumerate() {
        if idx > 0 {
            builder.append_text(", ");
        }
        let label = format!("{}[{idx}]", target.source);
        let arg = BoundArg::build(ctx.types(), Some(&label), item, &target.typing)?;
        builder.append_placeholder(arg);
    }
    builder.append_text(")");
    Ok(())
}

/// The one expression a rule value names.
pub(super) fn single_target<'a>(
    invocation: &RuleInvocation<'a>,
) -> Result<Option<&'a RuleTarget>, SqlTemplateError> {
    if invocation.value.is_none() {
        return Ok(None);
    }
    invocation.target.map(Some).ok_or_else(|| {
        SqlTemplateError::Expression(format!(
            "rule `{}` needs a single expression, got `{}`",
            invocation.name,
            invocation.value.unwrap_or_default()
        ))
    })
}
