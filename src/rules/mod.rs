//! Named rules invoked by `@{name, ...}` tokens.
//!
//! Built-in rules are variants of the closed [`Rule`] enum; user rules implement
//! [`RuleHandler`] and are registered as [`Rule::Custom`]. Names are matched
//! case-insensitively, and a [`RuleRegistry`] built from a base registry falls back
//! to it for names it does not define.
//!
//! ```rust
//! use std::sync::Arc;
//! use sql_template::prelude::*;
//!
//! #[derive(Debug)]
//! struct Tenant;
//!
//! impl RuleHandler for Tenant {
//!     fn execute(
//!         &self,
//!         ctx: &mut RenderContext<'_>,
//!         builder: &mut SqlBuilder,
//!         _invocation: &RuleInvocation<'_>,
//!     ) -> Result<(), SqlTemplateError> {
//!         let tenant = ctx.lookup("tenant")?.unwrap_or_default();
//!         builder.append_placeholder(BoundArg::input(ctx.types(), Some("tenant"), tenant));
//!         Ok(())
//!     }
//! }
//!
//! let rules = RuleRegistryBuilder::from_base(RuleRegistry::builtin())
//!     .register_handler("tenant", Arc::new(Tenant))
//!     .build();
//! let engine = TemplateEngine::builder().rules(rules).build();
//! let plan = engine
//!     .compile_str("select * from t where tenant_id = @{tenant}", &MapSource::new().with("tenant", 7))
//!     .unwrap();
//! assert_eq!(plan.sql, "select * from t where tenant_id = ?");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

mod conditional;
mod result;
mod value;

pub(crate) use result::parse_descriptor;

use crate::builder::{Clause, SqlBuilder};
use crate::engine::RenderContext;
use crate::error::SqlTemplateError;
use crate::results::ResultKind;
use crate::expr::Expr;
use crate::template::{ParamSpec, RuleTarget, Template};

/// What a rule sees of its `@{...}` token.
#[derive(Debug, Clone, Copy)]
pub struct RuleInvocation<'a> {
    /// Rule name as written.
    pub name: &'a str,
    /// Activation expression, for rules that use one.
    pub active: Option<&'a str>,
    /// Rule value text.
    pub value: Option<&'a str>,
    /// Rule value parsed as a template.
    pub body: Option<&'a Template>,
    /// Activation expression, parsed.
    pub active_expr: Option<&'a Expr>,
    /// Rule value read as one expression, when it is one.
    pub target: Option<&'a RuleTarget>,
    /// Rule value read as a `#{}` payload, when it is one.
    pub param: Option<&'a ParamSpec>,
}

/// A user-supplied rule.
pub trait RuleHandler: Send + Sync + fmt::Debug {
    /// Whether the first field after the name is an activation expression.
    fn uses_activation(&self) -> bool {
        false
    }

    /// Decide whether the rule runs at all.
    ///
    /// # Errors
    ///
    /// Implementations return expression or lookup errors.
    fn test(
        &self,
        _ctx: &RenderContext<'_>,
        _invocation: &RuleInvocation<'_>,
    ) -> Result<bool, SqlTemplateError> {
        Ok(true)
    }

    /// Append SQL, arguments or result descriptors for this invocation.
    ///
    /// # Errors
    ///
    /// Implementations return whatever prevents them from rendering.
    fn execute(
        &self,
        ctx: &mut RenderContext<'_>,
        builder: &mut SqlBuilder,
        invocation: &RuleInvocation<'_>,
    ) -> Result<(), SqlTemplateError>;
}

/// Clause and null-handling of the conditional predicate rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    And,
    Or,
    Set,
}

impl ConditionKind {
    pub(crate) fn clause(self) -> Clause {
        match self {
            ConditionKind::And => Clause::WhereAnd,
            ConditionKind::Or => Clause::WhereOr,
            ConditionKind::Set => Clause::Set,
        }
    }
}

/// A registered rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// `text`: copy the value verbatim.
    Text,
    /// `arg` / `parameter`: same as `#{}`.
    Arg,
    /// `include`: splice a registered fragment.
    Include,
    /// `if`: render the body when the activation expression holds.
    If,
    /// `nonull` / `notnull`: render the body when one of its parameters is non-NULL.
    NoNull,
    /// `and`, `or`, `set`, and their `if` forms when `gated`.
    Condition { kind: ConditionKind, gated: bool },
    /// `in` / `ifin`: expand a list into `(?, ?, ...)`.
    In { gated: bool },
    /// `eval`: bind the value of an expression.
    Eval,
    /// `md5`: bind the hex MD5 of an expression.
    Md5,
    /// `uuid32` / `uuid36`: bind a random UUID.
    Uuid { hyphenated: bool },
    /// `bind`: store a value in the compilation scope.
    Bind,
    /// `resultSet`, `resultUpdate`, and `defaultResult` (`None`).
    Result(Option<ResultKind>),
    Custom(Arc<dyn RuleHandler>),
}

impl Rule {
    #[must_use]
    pub fn uses_activation(&self) -> bool {
        match self {
            Rule::If | Rule::Bind => true,
            Rule::Condition { gated, .. } | Rule::In { gated } => *gated,
            Rule::Custom(handler) => handler.uses_activation(),
            _ => false,
        }
    }

    /// # Errors
    ///
    /// Returns `SqlTemplateError::Expression` when the activation expression is
    /// missing, did not parse, or fails to evaluate.
    pub fn test(
        &self,
        ctx: &RenderContext<'_>,
        invocation: &RuleInvocation<'_>,
    ) -> Result<bool, SqlTemplateError> {
        match self {
            Rule::Custom(handler) => handler.test(ctx, invocation),
            // the first field of `bind` is the target name
            Rule::Bind => Ok(true),
            rule if rule.uses_activation() => {
                let Some(active) = invocation.active_expr else {
                    return Err(SqlTemplateError::Expression(format!(
                        "rule `{}` needs an activation expression",
                        invocation.name
                    )));
                };
                ctx.test(active)
            }
            _ => Ok(true),
        }
    }

    /// # Errors
    ///
    /// Propagates evaluation, codec and configuration errors from the rule.
    pub fn execute(
        &self,
        ctx: &mut RenderContext<'_>,
        builder: &mut SqlBuilder,
        invocation: &RuleInvocation<'_>,
    ) -> Result<(), SqlTemplateError> {
        match self {
            Rule::Text => {
                if let Some(value) = invocation.value {
                    builder.append_text(value);
                }
                Ok(())
            }
            Rule::Arg => value::arg(ctx, builder, invocation),
            Rule::Include => value::include(ctx, builder, invocation),
            Rule::If => conditional::when(ctx, builder, invocation),
            Rule::NoNull => conditional::no_null(ctx, builder, invocation),
            Rule::Condition { kind, gated } => {
                conditional::condition(ctx, builder, invocation, *kind, *gated)
            }
            Rule::In { .. } => conditional::expand_in(ctx, builder, invocation),
            Rule::Eval => value::eval(ctx, builder, invocation),
            Rule::Md5 => value::md5(ctx, builder, invocation),
            Rule::Uuid { hyphenated } => {
                value::uuid(ctx, builder, invocation, *hyphenated);
                Ok(())
            }
            Rule::Bind => value::bind(ctx, invocation),
            Rule::Result(kind) => result::declare(builder, invocation, *kind),
            Rule::Custom(handler) => handler.execute(ctx, builder, invocation),
        }
    }

    /// Cleanup when [`Rule::test`] said no.
    pub(crate) fn skipped(&self, builder: &mut SqlBuilder) {
        if let Rule::Condition {
            kind: ConditionKind::Set,
            ..
        } = self
        {
            builder.retract_trailing(",");
        }
    }
}

lazy_static! {
    static ref BUILTIN_RULES: Arc<RuleRegistry> = Arc::new(RuleRegistry::with_builtins());
}

/// Rules by (case-insensitive) name.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    base: Option<Arc<RuleRegistry>>,
    rules: HashMap<String, Rule>,
}

impl RuleRegistry {
    /// The shared registry holding the built-in rules.
    #[must_use]
    pub fn builtin() -> Arc<RuleRegistry> {
        Arc::clone(&BUILTIN_RULES)
    }

    fn with_builtins() -> Self {
        let rules = [
            ("text", Rule::Text),
            ("arg", Rule::Arg),
            ("parameter", Rule::Arg),
            ("include", Rule::Include),
            ("if", Rule::If),
            ("nonull", Rule::NoNull),
            ("notnull", Rule::NoNull),
            ("and", condition(ConditionKind::And, false)),
            ("or", condition(ConditionKind::Or, false)),
            ("set", condition(ConditionKind::Set, false)),
            ("ifand", condition(ConditionKind::And, true)),
            ("ifor", condition(ConditionKind::Or, true)),
            ("ifset", condition(ConditionKind::Set, true)),
            ("in", Rule::In { gated: false }),
            ("ifin", Rule::In { gated: true }),
            ("eval", Rule::Eval),
            ("md5", Rule::Md5),
            ("uuid32", Rule::Uuid { hyphenated: false }),
            ("uuid36", Rule::Uuid { hyphenated: true }),
            ("bind", Rule::Bind),
            ("resultset", Rule::Result(Some(ResultKind::ResultSet))),
            ("resultupdate", Rule::Result(Some(ResultKind::UpdateCount))),
            ("defaultresult", Rule::Result(None)),
        ];
        Self {
            base: None,
            rules: rules
                .into_iter()
                .map(|(name, rule)| (name.to_string(), rule))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        let key = name.trim().to_ascii_lowercase();
        self.lookup(&key)
    }

    fn lookup(&self, key: &str) -> Option<&Rule> {
        self.rules
            .get(key)
            .or_else(|| self.base.as_deref().and_then(|base| base.lookup(key)))
    }

    /// # Errors
    ///
    /// Returns `SqlTemplateError::UnresolvedRule` when no registry in the chain knows
    /// `name`.
    pub fn resolve(&self, name: &str) -> Result<&Rule, SqlTemplateError> {
        self.get(name)
            .ok_or_else(|| SqlTemplateError::UnresolvedRule(name.trim().to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

fn condition(kind: ConditionKind, gated: bool) -> Rule {
    Rule::Condition { kind, gated }
}

/// Assembles a [`RuleRegistry`], usually on top of [`RuleRegistry::builtin`].
#[derive(Debug, Default)]
pub struct RuleRegistryBuilder {
    base: Option<Arc<RuleRegistry>>,
    rules: HashMap<String, Rule>,
}

impl RuleRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_base(base: Arc<RuleRegistry>) -> Self {
        Self {
            base: Some(base),
            rules: HashMap::new(),
        }
    }

    /// Register (or override) a rule. Later registrations of a name win.
    #[must_use]
    pub fn register(mut self, name: &str, rule: Rule) -> Self {
        self.rules.insert(name.trim().to_ascii_lowercase(), rule);
        self
    }

    #[must_use]
    pub fn register_handler(self, name: &str, handler: Arc<dyn RuleHandler>) -> Self {
        self.register(name, Rule::Custom(handler))
    }

    #[must_use]
    pub fn build(self) -> Arc<RuleRegistry> {
        Arc::new(RuleRegistry {
            base: self.base,
            rules: self.rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        let rules = RuleRegistry::builtin();
        assert!(matches!(rules.get("resultSet"), Some(Rule::Result(Some(ResultKind::ResultSet)))));
        assert!(matches!(rules.get(" IFAND "), Some(Rule::Condition { gated: true, .. })));
        assert!(matches!(rules.resolve("nope"), Err(SqlTemplateError::UnresolvedRule(n)) if n == "nope"));
    }

    #[test]
    fn overrides_shadow_the_base() {
        let rules = RuleRegistryBuilder::from_base(RuleRegistry::builtin())
            .register("AND", Rule::Text)
            .build();
        assert!(matches!(rules.get("and"), Some(Rule::Text)));
        assert!(matches!(rules.get("or"), Some(Rule::Condition { .. })));
        assert!(matches!(RuleRegistry::builtin().get("and"), Some(Rule::Condition { .. })));
    }

    #[test]
    fn activation_use() {
        let rules = RuleRegistry::builtin();
        for name in ["if", "ifand", "ifor", "ifset", "ifin", "bind"] {
            assert!(rules.get(name).unwrap().uses_activation(), "{name}");
        }
        for name in ["and", "or", "set", "in", "text", "eval", "md5", "resultSet"] {
            assert!(!rules.get(name).unwrap().uses_activation(), "{name}");
        }
    }
}
