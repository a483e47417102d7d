//! The template engine: registries, options and the render loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::arg::BoundArg;
use crate::builder::{SqlBuilder, StatementPlan};
use crate::codec::TypeRegistry;
use crate::context::{ArgSource, BindScope};
use crate::dialect::{LimitOffsetDialect, PageDialect};
use crate::error::SqlTemplateError;
use crate::expr::Expr;
use crate::results::{RowReader, RowReaderRegistry};
use crate::rules::{Rule, RuleInvocation, RuleRegistry};
use crate::statement::{FragmentRegistry, StatementDef};
use crate::template::{Node, ParamSpec, Template, TemplateCache};
use crate::types::{ArgMode, Value};

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Deepest chain of nested `include`s before compilation fails.
    pub max_include_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_include_depth: 16,
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn with_max_include_depth(mut self, max_include_depth: usize) -> Self {
        self.max_include_depth = max_include_depth;
        self
    }
}

/// Compiles templates into [`StatementPlan`]s.
///
/// An engine is immutable once built and can be shared between threads; the only
/// state it mutates is its template cache.
#[derive(Debug)]
pub struct TemplateEngine {
    types: Arc<TypeRegistry>,
    rules: Arc<RuleRegistry>,
    fragments: FragmentRegistry,
    readers: RowReaderRegistry,
    dialect: Arc<dyn PageDialect>,
    options: EngineOptions,
    cache: TemplateCache,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TemplateEngine {
    /// Engine with the built-in codecs, rules and row readers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> TemplateEngineBuilder {
        TemplateEngineBuilder::default()
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[must_use]
    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    #[must_use]
    pub fn fragments(&self) -> &FragmentRegistry {
        &self.fragments
    }

    #[must_use]
    pub fn readers(&self) -> &RowReaderRegistry {
        &self.readers
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn PageDialect {
        self.dialect.as_ref()
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Render a parsed template against a parameter source.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedRule`, `UnresolvedFragment`, `UnresolvedCodec`,
    /// `Expression` or `ConfigError` depending on what the template asks for.
    pub fn compile(
        &self,
        template: &Template,
        source: &dyn ArgSource,
    ) -> Result<StatementPlan, SqlTemplateError> {
        let mut ctx = RenderContext::new(self, source);
        let mut builder = SqlBuilder::new();
        if let Err(err) = ctx.render(template, &mut builder) {
            tracing::warn!("failed to compile `{}`: {}", template.source(), err);
            return Err(err);
        }
        let plan = builder.into_plan();
        tracing::debug!(sql = %plan.sql, args = plan.args.len(), "compiled template");
        Ok(plan)
    }

    /// Parse (through the cache) and compile template text.
    ///
    /// # Errors
    ///
    /// `TemplateSyntax` from parsing, then the errors of [`TemplateEngine::compile`].
    pub fn compile_str(
        &self,
        template: &str,
        source: &dyn ArgSource,
    ) -> Result<StatementPlan, SqlTemplateError> {
        let parsed = self.cache.get_or_parse(template)?;
        self.compile(&parsed, source)
    }

    /// Load-time checks of a statement against this engine: every rule, included
    /// fragment and row reader it names must exist.
    ///
    /// # Errors
    ///
    /// `UnresolvedRule`, `UnresolvedFragment`, or `DemultiplexMismatch` for a missing
    /// row reader.
    pub fn validate(&self, def: &StatementDef) -> Result<(), SqlTemplateError> {
        for node in def.template.rules() {
            if let Rule::Include = self.rules.resolve(&node.name)? {
                self.fragments.resolve(node.value().unwrap_or_default())?;
            }
        }
        for reader in def.row_readers()? {
            self.readers.resolve(Some(&reader))?;
        }
        Ok(())
    }
}

/// Assembles a [`TemplateEngine`].
#[derive(Debug, Default)]
pub struct TemplateEngineBuilder {
    types: Option<Arc<TypeRegistry>>,
    rules: Option<Arc<RuleRegistry>>,
    fragments: FragmentRegistry,
    readers: RowReaderRegistry,
    dialect: Option<Arc<dyn PageDialect>>,
    options: EngineOptions,
}

impl TemplateEngineBuilder {
    #[must_use]
    pub fn types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    #[must_use]
    pub fn rules(mut self, rules: Arc<RuleRegistry>) -> Self {
        self.rules = Some(rules);
        self
    }

    #[must_use]
    pub fn fragments(mut self, fragments: FragmentRegistry) -> Self {
        self.fragments = fragments;
        self
    }

    #[must_use]
    pub fn reader(mut self, name: impl Into<String>, reader: Arc<dyn RowReader>) -> Self {
        self.readers.register(name, reader);
        self
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Arc<dyn PageDialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    #[must_use]
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn build(self) -> TemplateEngine {
        TemplateEngine {
            types: self.types.unwrap_or_else(TypeRegistry::builtin),
            rules: self.rules.unwrap_or_else(RuleRegistry::builtin),
            fragments: self.fragments,
            readers: self.readers,
            dialect: self
                .dialect
                .unwrap_or_else(|| Arc::new(LimitOffsetDialect)),
            options: self.options,
            cache: TemplateCache::new(),
        }
    }
}

/// State of one compilation, handed to rules.
pub struct RenderContext<'a> {
    engine: &'a TemplateEngine,
    scope: BindScope<'a>,
    include_stack: Vec<String>,
}

impl<'a> RenderContext<'a> {
    fn new(engine: &'a TemplateEngine, source: &'a dyn ArgSource) -> Self {
        Self {
            engine,
            scope: BindScope::new(source),
            include_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &TemplateEngine {
        self.engine
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        self.engine.types()
    }

    /// Parameter source for this compilation, including `bind` results.
    #[must_use]
    pub fn source(&self) -> &dyn ArgSource {
        &self.scope
    }

    /// # Errors
    ///
    /// Propagates lookup errors from the caller's source.
    pub fn lookup(&self, name: &str) -> Result<Option<Value>, SqlTemplateError> {
        self.scope.lookup(name)
    }

    /// Store a value for the rest of this compilation.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.scope.bind(name, value);
    }

    /// Evaluate `expr`, reduced to a boolean.
    ///
    /// # Errors
    ///
    /// `Expression` when it does not evaluate.
    pub fn test(&self, expr: &Expr) -> Result<bool, SqlTemplateError> {
        expr.test(&self.scope)
    }

    /// Render a template's nodes into `builder`.
    ///
    /// # Errors
    ///
    /// The first error raised by any node.
    pub fn render(
        &mut self,
        template: &Template,
        builder: &mut SqlBuilder,
    ) -> Result<(), SqlTemplateError> {
        for node in template.nodes() {
            match node {
                Node::Text(text) => builder.append_text(text),
                Node::Param(spec) | Node::Named(spec) | Node::Position { param: spec, .. } => {
                    self.bind_param(spec, builder)?;
                }
                Node::Raw { expr, .. } => {
                    let value = expr.eval(&self.scope)?;
                    builder.append_text(&value.render());
                }
                Node::Rule(node) => {
                    let engine = self.engine;
                    let rule = engine.rules().resolve(&node.name)?;
                    let uses_activation = rule.uses_activation();
                    let (value, body) = node.payload(uses_activation);
                    let invocation = RuleInvocation {
                        name: &node.name,
                        active: if uses_activation { node.first() } else { None },
                        value,
                        body,
                        active_expr: if uses_activation { node.active_expr() } else { None },
                        target: node.target(uses_activation),
                        param: node.param(),
                    };
                    if rule.test(self, &invocation)? {
                        rule.execute(self, builder, &invocation)?;
                    } else {
                        rule.skipped(builder);
                    }
                }
            }
        }
        Ok(())
    }

    /// Render into a fresh builder, e.g. to inspect a conditional body before
    /// deciding whether to keep it.
    ///
    /// # Errors
    ///
    /// Same as [`RenderContext::render`].
    pub fn render_scratch(
        &mut self,
        template: Option<&Template>,
    ) -> Result<SqlBuilder, SqlTemplateError> {
        let mut scratch = SqlBuilder::new();
        if let Some(template) = template {
            self.render(template, &mut scratch)?;
        }
        Ok(scratch)
    }

    /// Evaluate a parameter and append its placeholder. OUT parameters never read
    /// their expression.
    ///
    /// # Errors
    ///
    /// Evaluation errors, and `UnresolvedCodec` for an unknown `typeHandler`.
    pub fn bind_param(
        &mut self,
        spec: &ParamSpec,
        builder: &mut SqlBuilder,
    ) -> Result<(), SqlTemplateError> {
        let value = match &spec.expr {
            Some(expr) if spec.typing.mode != ArgMode::Out => expr.eval(&self.scope)?,
            _ => Value::Null,
        };
        let arg = BoundArg::build(self.types(), spec.source.as_deref(), value, &spec.typing)?;
        tracing::trace!("bind {}", arg);
        builder.append_placeholder(arg);
        Ok(())
    }

    /// Render a registered fragment in place.
    ///
    /// # Errors
    ///
    /// `UnresolvedFragment` for an unknown id; `ConfigError` for include cycles or
    /// chains deeper than `max_include_depth`.
    pub fn include(&mut self, id: &str, builder: &mut SqlBuilder) -> Result<(), SqlTemplateError> {
        let engine = self.engine;
        let fragment = engine.fragments().resolve(id)?;
        if self.include_stack.iter().any(|open| open == id) {
            return Err(SqlTemplateError::ConfigError(format!(
                "include cycle: {} -> {id}",
                self.include_stack.join(" -> ")
            )));
        }
        if self.include_stack.len() >= engine.options().max_include_depth {
            return Err(SqlTemplateError::ConfigError(format!(
                "includes nested deeper than {} at `{id}`",
                engine.options().max_include_depth
            )));
        }
        self.include_stack.push(id.to_string());
        let rendered = self.render(fragment, builder);
        self.include_stack.pop();
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MapSource;

    #[test]
    fn raw_substitution_and_params() {
        let engine = TemplateEngine::new();
        let source = MapSource::new().with("table", "users").with("id", 5);
        let plan = engine
            .compile_str("select * from ${table} where id = #{id}", &source)
            .unwrap();
        assert_eq!(plan.sql, "select * from users where id = ?");
        assert_eq!(plan.values(), vec![&Value::Int(5)]);
    }

    #[test]
    fn bind_is_visible_to_later_nodes_only() {
        let engine = TemplateEngine::new();
        let plan = engine
            .compile_str(
                "select :x, @{bind, x, 'late'} :x",
                &MapSource::new().with("x", "early"),
            )
            .unwrap();
        assert_eq!(plan.sql, "select ?,  ?");
        assert_eq!(plan.values(), vec![&Value::from("early"), &Value::from("late")]);
    }

    #[test]
    fn include_detects_cycles_and_depth() {
        let fragments = FragmentRegistry::new()
            .with_fragment("a", "x @{include, b}")
            .unwrap()
            .with_fragment("b", "y @{include, a}")
            .unwrap()
            .with_fragment("leaf", "id = :id")
            .unwrap();
        let engine = TemplateEngine::builder().fragments(fragments).build();

        let err = engine
            .compile_str("select @{include, a}", &MapSource::new())
            .unwrap_err();
        assert!(matches!(err, SqlTemplateError::ConfigError(ref m) if m.contains("cycle")), "{err}");

        let plan = engine
            .compile_str("where @{include, leaf}", &MapSource::new().with("id", 1))
            .unwrap();
        assert_eq!(plan.sql, "where id = ?");

        assert!(matches!(
            engine.compile_str("@{include, nope}", &MapSource::new()),
            Err(SqlTemplateError::UnresolvedFragment(_))
        ));

        let shallow = TemplateEngine::builder()
            .fragments(FragmentRegistry::new().with_fragment("leaf", "1").unwrap())
            .options(EngineOptions::default().with_max_include_depth(0))
            .build();
        assert!(matches!(
            shallow.compile_str("@{include, leaf}", &MapSource::new()),
            Err(SqlTemplateError::ConfigError(_))
        ));
    }

    #[test]
    fn unknown_rule_fails_at_compile() {
        let engine = TemplateEngine::new();
        assert!(matches!(
            engine.compile_str("select @{frobnicate, x}", &MapSource::new()),
            Err(SqlTemplateError::UnresolvedRule(name)) if name == "frobnicate"
        ));
    }

    #[test]
    fn validate_checks_readers_and_fragments() {
        let engine = TemplateEngine::new();
        let def = StatementDef::new("s", "call p() @{resultSet, name=a, rowMapper=bean}").unwrap();
        assert!(matches!(
            engine.validate(&def),
            Err(SqlTemplateError::DemultiplexMismatch(_))
        ));
        let def = StatementDef::new("s", "select @{include, cols}").unwrap();
        assert!(matches!(
            engine.validate(&def),
            Err(SqlTemplateError::UnresolvedFragment(_))
        ));
        let def = StatementDef::new("s", "call p() @{resultSet, name=a, rowMapper=list}").unwrap();
        assert!(engine.validate(&def).is_ok());
    }
}
