use super::RuleInvocation;
use crate::builder::SqlBuilder;
use crate::error::SqlTemplateError;
use crate::results::{ResultDescriptor, ResultKind, ResultShape};
use crate::template::split_clause;
use crate::types::LogicalType;

pub(super) fn declare(
    builder: &mut SqlBuilder,
    invocation: &RuleInvocation<'_>,
    kind: Option<ResultKind>,
) -> Result<(), SqlTemplateError> {
    let payload = invocation.value.unwrap_or_default();
    let descriptor = parse_descriptor(kind.unwrap_or(ResultKind::ResultSet), payload)?;
    match kind {
        Some(_) => builder.push_result(descriptor),
        None => builder.set_default_result(descriptor),
    }
    Ok(())
}

/// Parse `name=..., javaType=..., rowMapper=..., shape=...` into a descriptor.
pub(crate) fn parse_descriptor(
    kind: ResultKind,
    payload: &str,
) -> Result<ResultDescriptor, SqlTemplateError> {
    let mut descriptor = match kind {
        ResultKind::ResultSet => ResultDescriptor::result_set(),
        ResultKind::UpdateCount => ResultDescriptor::update_count(),
    };
    let mut shape = None;
    for clause in payload.split(',').filter(|c| !c.trim().is_empty()) {
        let (key, value) = split_clause(clause, payload)?;
        match key.as_str() {
            "name" => descriptor = descriptor.with_name(value),
            "javatype" => descriptor = descriptor.with_logical_type(LogicalType::from_name(value)),
            "rowmapper" => descriptor = descriptor.with_row_reader(value),
            "shape" => {
                shape = Some(ResultShape::from_name(value).ok_or_else(|| {
                    SqlTemplateError::syntax(payload, format!("unknown result shape `{value}`"))
                })?);
            }
            _ => {
                return Err(SqlTemplateError::syntax(
                    payload,
                    format!("unknown result option `{key}`"),
                ));
            }
        }
    }
    // an explicit shape wins over the one implied by javaType
    if let Some(shape) = shape {
        descriptor = descriptor.with_shape(shape);
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_options() {
        let d = parse_descriptor(ResultKind::ResultSet, "name=res1").unwrap();
        assert_eq!(d.name.as_deref(), Some("res1"));
        assert_eq!(d.shape, ResultShape::Rows);

        let d = parse_descriptor(ResultKind::ResultSet, "name = total, javaType=java.lang.Long, shape=scalar")
            .unwrap();
        assert_eq!(d.logical_type, Some(LogicalType::Long));
        assert_eq!(d.shape, ResultShape::Scalar);

        let d = parse_descriptor(ResultKind::ResultSet, "rowMapper=list, shape=row").unwrap();
        assert_eq!(d.row_reader.as_deref(), Some("list"));
        assert_eq!(d.shape, ResultShape::Row);

        let d = parse_descriptor(ResultKind::UpdateCount, "").unwrap();
        assert_eq!(d.kind, ResultKind::UpdateCount);
    }

    #[test]
    fn rejects_unknown_options() {
        assert!(parse_descriptor(ResultKind::ResultSet, "color=red").is_err());
        assert!(parse_descriptor(ResultKind::ResultSet, "shape=cube").is_err());
        assert!(parse_descriptor(ResultKind::ResultSet, "name").is_err());
    }
}
