use lazy_static::lazy_static;
use regex::Regex;

use super::scanner::split_top_level;
use crate::arg::ArgTyping;
use crate::error::SqlTemplateError;
use crate::expr::Expr;
use crate::types::{ArgMode, DriverType, LogicalType};

const MAX_FIELDS: usize = 10;

lazy_static! {
    static ref CONFIG_CLAUSE: Regex =
        Regex::new(r"^\s*(?i:name|mode|jdbcType|javaType|typeHandler)\s*=($|[^=])")
            .expect("valid config clause regex");
}

/// A parsed `#{expr, key=value...}` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Expression text as written.
    pub source: Option<String>,
    pub expr: Option<Expr>,
    pub typing: ArgTyping,
}

impl ParamSpec {
    /// A plain IN parameter for an expression, as produced by `:name` and `?`.
    pub(crate) fn for_expr(source: &str, template: &str) -> Result<ParamSpec, SqlTemplateError> {
        let expr = Expr::parse(source).map_err(|e| SqlTemplateError::syntax(template, e.to_string()))?;
        Ok(ParamSpec {
            source: Some(source.to_string()),
            expr: Some(expr),
            typing: ArgTyping::input(),
        })
    }

    /// Parse the inside of `#{...}` (also the value of `@{arg, ...}`).
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` for an empty expression, a clause
    /// that is not `key=value`, an unknown key, a bad `mode`/`jdbcType`, too many
    /// fields, or an expression that does not parse.
    pub fn parse(payload: &str, template: &str) -> Result<ParamSpec, SqlTemplateError> {
        let fields = split_top_level(payload);
        if fields.len() > MAX_FIELDS {
            return Err(SqlTemplateError::syntax(
                template,
                format!("`#{{{payload}}}` has more than {MAX_FIELDS} fields"),
            ));
        }

        let (source, clauses) = match fields.split_first() {
            Some((first, rest)) if !CONFIG_CLAUSE.is_match(first) => {
                let first = first.trim();
                if first.is_empty() {
                    return Err(SqlTemplateError::syntax(
                        template,
                        format!("`#{{{payload}}}` has an empty expression"),
                    ));
                }
                (Some(first), rest)
            }
            _ => (None, fields.as_slice()),
        };

        let mut typing = ArgTyping::input();
        for clause in clauses {
            apply_clause(&mut typing, clause, template)?;
        }

        // `#{name=x}` reads `x`; OUT parameters need no expression at all
        let source = source
            .map(str::to_string)
            .or_else(|| typing.name.clone().filter(|_| typing.mode.is_input()));
        let expr = match &source {
            Some(text) => Some(
                Expr::parse(text).map_err(|e| SqlTemplateError::syntax(template, e.to_string()))?,
            ),
            None if typing.mode.is_input() => {
                return Err(SqlTemplateError::syntax(
                    template,
                    format!("`#{{{payload}}}` has no expression"),
                ));
            }
            None => None,
        };

        Ok(ParamSpec {
            source,
            expr,
            typing,
        })
    }
}

/// Split `key=value` clauses (used by `#{}` and the result rules).
pub(crate) fn split_clause<'a>(
    clause: &'a str,
    template: &str,
) -> Result<(String, &'a str), SqlTemplateError> {
    let Some((key, value)) = clause.split_once('=') else {
        return Err(SqlTemplateError::syntax(
            template,
            format!("`{}` is not a key=value clause", clause.trim()),
        ));
    };
    let value = value.trim();
    let value = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
        .unwrap_or(value);
    Ok((key.trim().to_ascii_lowercase(), value))
}

fn apply_clause(
    typing: &mut ArgTyping,
    clause: &str,
    template: &str,
) -> Result<(), SqlTemplateError> {
    let (key, value) = split_clause(clause, template)?;
    match key.as_str() {
        "name" => typing.name = Some(value.to_string()),
        "mode" => {
            typing.mode = ArgMode::from_name(value).ok_or_else(|| {
                SqlTemplateError::syntax(template, format!("unknown mode `{value}`"))
            })?;
        }
        "jdbctype" => {
            typing.driver_type = Some(DriverType::from_name(value).ok_or_else(|| {
                SqlTemplateError::syntax(template, format!("unknown jdbcType `{value}`"))
            })?);
        }
        "javatype" => typing.logical_type = Some(LogicalType::from_name(value)),
        "typehandler" => typing.codec_name = Some(value.to_string()),
        _ => {
            return Err(SqlTemplateError::syntax(
                template,
                format!("unknown parameter option `{key}`"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(payload: &str) -> Result<ParamSpec, SqlTemplateError> {
        ParamSpec::parse(payload, payload)
    }

    #[test]
    fn expression_with_options() {
        let spec = parse("x, mode=out, jdbcType=INTEGER").unwrap();
        assert_eq!(spec.source.as_deref(), Some("x"));
        assert_eq!(spec.typing.mode, ArgMode::Out);
        assert_eq!(spec.typing.driver_type, Some(DriverType::Integer));

        let spec = parse("user.id,javaType=java.lang.Long, typeHandler=long,name=uid").unwrap();
        assert_eq!(spec.typing.logical_type, Some(LogicalType::Long));
        assert_eq!(spec.typing.codec_name.as_deref(), Some("long"));
        assert_eq!(spec.typing.name.as_deref(), Some("uid"));
    }

    #[test]
    fn comparison_is_an_expression_not_a_clause() {
        let spec = parse("name == 'a'").unwrap();
        assert!(spec.expr.is_some());
    }

    #[test]
    fn out_parameter_without_expression() {
        let spec = parse("name=total, mode=OUT, jdbcType=int").unwrap();
        assert!(spec.expr.is_none());
        assert_eq!(spec.typing.name.as_deref(), Some("total"));

        let spec = parse("name=total").unwrap();
        assert_eq!(spec.source.as_deref(), Some("total"));
    }

    #[test]
    fn malformed_payloads() {
        assert!(parse("").is_err());
        assert!(parse("  ").is_err());
        assert!(parse("x, mode").is_err());
        assert!(parse("x, mode=sideways").is_err());
        assert!(parse("x, jdbcType=NOPE").is_err());
        assert!(parse("x, color=red").is_err());
        assert!(parse("x +").is_err());
        assert!(parse("a,name=1,name=2,name=3,name=4,name=5,name=6,name=7,name=8,name=9,name=10").is_err());
    }
}
