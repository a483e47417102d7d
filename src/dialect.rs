use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arg::BoundArg;
use crate::builder::StatementPlan;
use crate::codec::TypeRegistry;
use crate::error::SqlTemplateError;
use crate::types::Value;

/// A page of rows: skip `offset`, return at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    #[must_use]
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Page `number` (0-based) of `size` rows.
    #[must_use]
    pub fn number(number: u64, size: u64) -> Self {
        Self {
            offset: number.saturating_mul(size),
            limit: size,
        }
    }
}

/// Database-specific SQL rewriting the executor needs.
pub trait PageDialect: Send + Sync + fmt::Debug {
    /// Rewrite a compiled plan to return only `page`.
    ///
    /// # Errors
    ///
    /// Implementations return `SqlTemplateError::ConfigError` when the page cannot be
    /// expressed.
    fn paginate(
        &self,
        plan: StatementPlan,
        page: Page,
        types: &TypeRegistry,
    ) -> Result<StatementPlan, SqlTemplateError>;

    /// Quote an identifier for this database.
    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }
}

/// `... LIMIT ? OFFSET ?`, understood by SQLite, PostgreSQL and MySQL.
#[derive(Debug, Default, Clone, Copy)]
pub struct LimitOffsetDialect;

impl PageDialect for LimitOffsetDialect {
    fn paginate(
        &self,
        mut plan: StatementPlan,
        page: Page,
        types: &TypeRegistry,
    ) -> Result<StatementPlan, SqlTemplateError> {
        let limit = i64::try_from(page.limit)
            .map_err(|_| SqlTemplateError::ConfigError(format!("page limit {} is too large", page.limit)))?;
        let offset = i64::try_from(page.offset).map_err(|_| {
            SqlTemplateError::ConfigError(format!("page offset {} is too large", page.offset))
        })?;
        plan.sql.push_str(" LIMIT ? OFFSET ?");
        plan.args
            .push(BoundArg::input(types, Some("#page.limit"), Value::Int(limit)));
        plan.args
            .push(BoundArg::input(types, Some("#page.offset"), Value::Int(offset)));
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SqlBuilder;

    #[test]
    fn appends_limit_and_offset_arguments() {
        let mut builder = SqlBuilder::new();
        builder.append_text("select * from t order by id");
        let plan = LimitOffsetDialect
            .paginate(builder.into_plan(), Page::number(2, 10), &TypeRegistry::builtin())
            .unwrap();
        assert_eq!(plan.sql, "select * from t order by id LIMIT ? OFFSET ?");
        assert_eq!(plan.values(), vec![&Value::Int(10), &Value::Int(20)]);
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(LimitOffsetDialect.quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
