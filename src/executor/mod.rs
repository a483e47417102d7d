//! Running compiled statements through a [`Driver`](crate::driver::Driver) and
//! reading their results back.

use std::fmt;

use serde::Serialize;

mod demux;
mod run;

pub use run::StatementExecutor;

use crate::results::{ResultMap, ResultValue};

/// Where a statement is in its execution.
///
/// A failure is reported with the phase that was in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Prepared,
    Bound,
    Executed,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionPhase::Prepared => "preparing",
            ExecutionPhase::Bound => "binding",
            ExecutionPhase::Executed => "executing",
            ExecutionPhase::Extracting => "extracting results",
            ExecutionPhase::Done => "done",
            ExecutionPhase::Failed => "failed",
        })
    }
}

/// What [`StatementExecutor::execute`] returns.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// Callable statements and templates that declare their results.
    Results(ResultMap),
    /// Plain queries, combined by the statement's `MultipleResultPolicy`.
    Value(ResultValue),
}

impl StatementOutcome {
    #[must_use]
    pub fn into_results(self) -> Option<ResultMap> {
        match self {
            StatementOutcome::Results(map) => Some(map),
            StatementOutcome::Value(_) => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<ResultValue> {
        match self {
            StatementOutcome::Value(value) => Some(value),
            StatementOutcome::Results(_) => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StatementOutcome::Results(map) => map.to_json(),
            StatementOutcome::Value(value) => value.to_json(),
        }
    }
}
