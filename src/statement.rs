//! Statement definitions, their execution policies, and named fragments.
//!
//! Definitions can be built in code or loaded from JSON:
//!
//! ```rust
//! use sql_template::prelude::*;
//!
//! let registry = StatementRegistry::load_json(r#"{
//!     "fragments": { "cols": "id, name" },
//!     "statements": [
//!         { "id": "byOwner",
//!           "template": "select @{include, cols} from t where 1=1 @{and, owner = :owner}",
//!           "policy": { "kind": "prepared", "multiple": "first" } }
//!     ]
//! }"#).unwrap();
//! assert!(registry.get("byOwner").is_some());
//! assert!(registry.fragments().get("cols").is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::dialect::Page;
use crate::error::SqlTemplateError;
use crate::results::ResultKind;
use crate::rules::parse_descriptor;
use crate::template::Template;

/// How a statement is sent to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Plain text, no placeholders expected.
    Statement,
    /// Prepared with bound arguments.
    #[default]
    Prepared,
    /// A procedure call with OUT parameters and any number of results.
    Callable,
}

/// How several results of the same kind are combined by a plain query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleResultPolicy {
    #[default]
    First,
    Last,
    All,
}

/// Execution settings of a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutePolicy {
    pub kind: StatementKind,
    /// Seconds, handed to the driver.
    pub timeout_secs: Option<u64>,
    pub fetch_size: Option<u32>,
    pub scrollable: bool,
    /// Case-insensitive column names and result keys.
    pub case_insensitive: bool,
    pub multiple: MultipleResultPolicy,
    pub page: Option<Page>,
}

impl Default for ExecutePolicy {
    fn default() -> Self {
        Self {
            kind: StatementKind::Prepared,
            timeout_secs: None,
            fetch_size: None,
            scrollable: false,
            case_insensitive: false,
            multiple: MultipleResultPolicy::First,
            page: None,
        }
    }
}

impl ExecutePolicy {
    #[must_use]
    pub fn callable() -> Self {
        Self::default().with_kind(StatementKind::Callable)
    }

    #[must_use]
    pub fn with_kind(mut self, kind: StatementKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    #[must_use]
    pub fn with_scrollable(mut self, scrollable: bool) -> Self {
        self.scrollable = scrollable;
        self
    }

    #[must_use]
    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    #[must_use]
    pub fn with_multiple(mut self, multiple: MultipleResultPolicy) -> Self {
        self.multiple = multiple;
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }
}

/// A named, parsed statement.
#[derive(Debug, Clone)]
pub struct StatementDef {
    pub id: String,
    pub template: Arc<Template>,
    pub policy: ExecutePolicy,
    /// Row reader for results without a descriptor.
    pub result_type: Option<String>,
}

impl StatementDef {
    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` for a blank id or a template that
    /// does not parse.
    pub fn new(id: &str, template: &str) -> Result<Self, SqlTemplateError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SqlTemplateError::syntax(template, "statement id is blank"));
        }
        Ok(Self {
            id: id.to_string(),
            template: Arc::new(Template::parse(template)?),
            policy: ExecutePolicy::default(),
            result_type: None,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ExecutePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_result_type(mut self, result_type: impl Into<String>) -> Self {
        self.result_type = Some(result_type.into());
        self
    }

    /// Row reader names this statement refers to: its result type and the readers
    /// named by result rules in the template.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` for result rules with bad options.
    pub fn row_readers(&self) -> Result<Vec<String>, SqlTemplateError> {
        let mut readers: Vec<String> = self.result_type.iter().cloned().collect();
        for rule in self.template.rules() {
            let kind = match rule.name.to_ascii_lowercase().as_str() {
                "resultset" | "defaultresult" => ResultKind::ResultSet,
                "resultupdate" => ResultKind::UpdateCount,
                _ => continue,
            };
            let descriptor = parse_descriptor(kind, rule.value().unwrap_or_default())?;
            readers.extend(descriptor.row_reader);
        }
        Ok(readers)
    }

    /// Names of all rules the template uses.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        self.template.rules().into_iter().map(|r| r.name.as_str()).collect()
    }
}

/// Named template fragments spliced by `@{include, id}`.
#[derive(Debug, Clone, Default)]
pub struct FragmentRegistry {
    fragments: HashMap<String, Arc<Template>>,
}

impl FragmentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register a fragment.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` for a blank or duplicate id, or a
    /// fragment that does not parse.
    pub fn register(&mut self, id: &str, template: &str) -> Result<(), SqlTemplateError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SqlTemplateError::syntax(template, "fragment id is blank"));
        }
        if self.fragments.contains_key(id) {
            return Err(SqlTemplateError::syntax(
                template,
                format!("fragment `{id}` is defined twice"),
            ));
        }
        self.fragments
            .insert(id.to_string(), Arc::new(Template::parse(template)?));
        Ok(())
    }

    /// # Errors
    ///
    /// Same as [`FragmentRegistry::register`].
    pub fn with_fragment(mut self, id: &str, template: &str) -> Result<Self, SqlTemplateError> {
        self.register(id, template)?;
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Template>> {
        self.fragments.get(id)
    }

    /// # Errors
    ///
    /// Returns `SqlTemplateError::UnresolvedFragment` for an unknown id.
    pub fn resolve(&self, id: &str) -> Result<&Arc<Template>, SqlTemplateError> {
        self.get(id)
            .ok_or_else(|| SqlTemplateError::UnresolvedFragment(id.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Serialized form read by [`StatementRegistry::load_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementSource {
    pub fragments: HashMap<String, String>,
    pub statements: Vec<StatementEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementEntry {
    pub id: String,
    pub template: String,
    #[serde(default)]
    pub policy: ExecutePolicy,
    #[serde(default)]
    pub result_type: Option<String>,
}

/// Statements by id, plus the fragments they include.
#[derive(Debug, Clone, Default)]
pub struct StatementRegistry {
    statements: HashMap<String, Arc<StatementDef>>,
    fragments: FragmentRegistry,
}

impl StatementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` if the id is already taken.
    pub fn register(&mut self, def: StatementDef) -> Result<(), SqlTemplateError> {
        if self.statements.contains_key(&def.id) {
            return Err(SqlTemplateError::syntax(
                def.template.source(),
                format!("statement `{}` is defined twice", def.id),
            ));
        }
        self.statements.insert(def.id.clone(), Arc::new(def));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<StatementDef>> {
        self.statements.get(id)
    }

    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` for an unknown id.
    pub fn resolve(&self, id: &str) -> Result<&Arc<StatementDef>, SqlTemplateError> {
        self.get(id)
            .ok_or_else(|| SqlTemplateError::syntax(id, format!("no statement with id `{id}`")))
    }

    #[must_use]
    pub fn fragments(&self) -> &FragmentRegistry {
        &self.fragments
    }

    pub fn fragments_mut(&mut self) -> &mut FragmentRegistry {
        &mut self.fragments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<StatementDef>> {
        self.statements.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Build a registry from its serialized form.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` for templates that do not parse and
    /// duplicate ids.
    pub fn from_source(source: StatementSource) -> Result<Self, SqlTemplateError> {
        let mut registry = Self::new();
        let mut fragments: Vec<_> = source.fragments.into_iter().collect();
        fragments.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, template) in fragments {
            registry.fragments.register(&id, &template)?;
        }
        for entry in source.statements {
            let mut def = StatementDef::new(&entry.id, &entry.template)?.with_policy(entry.policy);
            def.result_type = entry.result_type;
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// # Errors
    ///
    /// Returns `SqlTemplateError::ConfigError` for malformed JSON, and the errors of
    /// [`StatementRegistry::from_source`].
    pub fn load_json(json: &str) -> Result<Self, SqlTemplateError> {
        let source: StatementSource = serde_json::from_str(json)
            .map_err(|e| SqlTemplateError::ConfigError(format!("statement file: {e}")))?;
        Self::from_source(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = StatementRegistry::new();
        registry.register(StatementDef::new("a", "select 1").unwrap()).unwrap();
        let err = registry
            .register(StatementDef::new("a", "select 2").unwrap())
            .unwrap_err();
        assert!(matches!(err, SqlTemplateError::TemplateSyntax { .. }));
        assert!(StatementDef::new("  ", "select 1").is_err());

        let mut fragments = FragmentRegistry::new();
        fragments.register("f", "a = 1").unwrap();
        assert!(fragments.register("f", "a = 2").is_err());
        assert!(matches!(
            fragments.resolve("g"),
            Err(SqlTemplateError::UnresolvedFragment(_))
        ));
    }

    #[test]
    fn malformed_templates_fail_at_load() {
        let err = StatementRegistry::load_json(
            r#"{"statements": [{"id": "x", "template": "select #{a"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SqlTemplateError::TemplateSyntax { .. }));
        assert!(matches!(
            StatementRegistry::load_json("{not json"),
            Err(SqlTemplateError::ConfigError(_))
        ));
    }

    #[test]
    fn policy_defaults_and_json() {
        let policy: ExecutePolicy =
            serde_json::from_str(r#"{"kind": "callable", "multiple": "all", "page": {"offset": 5, "limit": 10}}"#)
                .unwrap();
        assert_eq!(policy.kind, StatementKind::Callable);
        assert_eq!(policy.multiple, MultipleResultPolicy::All);
        assert_eq!(policy.page, Some(Page::new(5, 10)));
        assert!(!policy.case_insensitive);
        assert_eq!(ExecutePolicy::default().kind, StatementKind::Prepared);
    }

    #[test]
    fn collects_row_readers_from_result_rules() {
        let def = StatementDef::new(
            "p",
            "call p() @{resultSet, name=a, rowMapper=bean} @{defaultResult, javaType=userBean}",
        )
        .unwrap()
        .with_result_type("other");
        assert_eq!(def.row_readers().unwrap(), vec!["other", "bean", "userBean"]);
        assert_eq!(def.rule_names(), vec!["resultSet", "defaultResult"]);
    }
}
