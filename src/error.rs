use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;

use crate::executor::ExecutionPhase;

#[derive(Debug, Error)]
pub enum SqlTemplateError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Template syntax error in `{template}`: {message}")]
    TemplateSyntax { template: String, message: String },

    #[error("Unknown rule: {0}")]
    UnresolvedRule(String),

    #[error("Unknown type codec: {0}")]
    UnresolvedCodec(String),

    #[error("Unknown fragment: {0}")]
    UnresolvedFragment(String),

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Statement failed while {phase}: {source}\n  sql: {sql}\n  args: [{args}]")]
    StatementExecution {
        phase: ExecutionPhase,
        sql: String,
        args: String,
        #[source]
        source: Box<SqlTemplateError>,
    },

    #[error("Result mapping error: {0}")]
    DemultiplexMismatch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlTemplateError {
    pub(crate) fn syntax(template: &str, message: impl Into<String>) -> Self {
        SqlTemplateError::TemplateSyntax {
            template: template.to_string(),
            message: message.into(),
        }
    }

    /// The error that caused a failed statement, or `self` for every other variant.
    #[must_use]
    pub fn root_cause(&self) -> &SqlTemplateError {
        match self {
            SqlTemplateError::StatementExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
