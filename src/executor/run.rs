use crate::builder::StatementPlan;
use crate::context::ArgSource;
use crate::driver::{Driver, DriverStatement, ResultEvent};
use crate::engine::TemplateEngine;
use crate::error::SqlTemplateError;
use crate::results::{ResultKind, ResultMap, ResultValue};
use crate::statement::{MultipleResultPolicy, StatementDef, StatementKind};
use crate::types::DriverType;

use super::demux::{Demux, Extracted};
use super::{ExecutionPhase, StatementOutcome};

/// Runs [`StatementDef`]s compiled by one engine.
///
/// The executor holds no connection state; each call borrows the driver it is given
/// and drops every statement handle and cursor before returning.
#[derive(Debug, Clone, Copy)]
pub struct StatementExecutor<'e> {
    engine: &'e TemplateEngine,
}

struct Execution {
    events: Vec<Extracted>,
    outs: Vec<(String, ResultValue)>,
}

impl<'e> StatementExecutor<'e> {
    #[must_use]
    pub fn new(engine: &'e TemplateEngine) -> Self {
        Self { engine }
    }

    #[must_use]
    pub fn engine(&self) -> &'e TemplateEngine {
        self.engine
    }

    /// Compile `def` against `source` and apply its paging.
    ///
    /// # Errors
    ///
    /// Compilation errors, or `ConfigError` for a paged callable statement.
    pub fn prepare_plan(
        &self,
        def: &StatementDef,
        source: &dyn ArgSource,
    ) -> Result<StatementPlan, SqlTemplateError> {
        let plan = self.engine.compile(&def.template, source)?;
        match def.policy.page {
            Some(_) if def.policy.kind == StatementKind::Callable => Err(SqlTemplateError::ConfigError(
                format!("callable statement `{}` cannot be paged", def.id),
            )),
            Some(page) => self.engine.dialect().paginate(plan, page, self.engine.types()),
            None => Ok(plan),
        }
    }

    /// Compile and run `def`.
    ///
    /// Callable statements and templates with result rules return a [`ResultMap`];
    /// anything else returns one value combined by the statement's
    /// [`MultipleResultPolicy`].
    ///
    /// # Errors
    ///
    /// Compilation errors as they are, and driver failures wrapped in
    /// `SqlTemplateError::StatementExecution`.
    pub fn execute<D: Driver>(
        &self,
        driver: &mut D,
        def: &StatementDef,
        source: &dyn ArgSource,
    ) -> Result<StatementOutcome, SqlTemplateError> {
        let plan = self.prepare_plan(def, source)?;
        let named = def.policy.kind == StatementKind::Callable || !plan.results.is_empty();
        let execution = self.run(driver, def, &plan)?;
        Ok(if named {
            StatementOutcome::Results(into_map(execution, def.policy.case_insensitive))
        } else {
            StatementOutcome::Value(combine(execution.events, def.policy.multiple))
        })
    }

    /// Run `def` and return every result by name.
    ///
    /// # Errors
    ///
    /// See [`StatementExecutor::execute`].
    pub fn call<D: Driver>(
        &self,
        driver: &mut D,
        def: &StatementDef,
        source: &dyn ArgSource,
    ) -> Result<ResultMap, SqlTemplateError> {
        let plan = self.prepare_plan(def, source)?;
        let execution = self.run(driver, def, &plan)?;
        Ok(into_map(execution, def.policy.case_insensitive))
    }

    /// Run `def` and combine its results with the statement's
    /// [`MultipleResultPolicy`]. Cursors win over update counts.
    ///
    /// # Errors
    ///
    /// See [`StatementExecutor::execute`].
    pub fn query<D: Driver>(
        &self,
        driver: &mut D,
        def: &StatementDef,
        source: &dyn ArgSource,
    ) -> Result<ResultValue, SqlTemplateError> {
        let plan = self.prepare_plan(def, source)?;
        let execution = self.run(driver, def, &plan)?;
        Ok(combine(execution.events, def.policy.multiple))
    }

    fn run<D: Driver>(
        &self,
        driver: &mut D,
        def: &StatementDef,
        plan: &StatementPlan,
    ) -> Result<Execution, SqlTemplateError> {
        let fail = |phase: ExecutionPhase| {
            move |source: SqlTemplateError| failed(def, plan, phase, source)
        };

        tracing::trace!(statement = %def.id, phase = %ExecutionPhase::Prepared, "statement phase");
        let mut stmt = driver
            .prepare(&plan.sql, &def.policy)
            .map_err(fail(ExecutionPhase::Prepared))?;

        tracing::trace!(statement = %def.id, phase = %ExecutionPhase::Bound, "statement phase");
        for (offset, arg) in plan.args.iter().enumerate() {
            let index = offset + 1;
            if arg.mode().is_input() {
                let value = arg.to_driver().map_err(fail(ExecutionPhase::Bound))?;
                tracing::trace!(index, arg = %arg, "bind");
                stmt.bind(index, value, arg.driver_type())
                    .map_err(fail(ExecutionPhase::Bound))?;
            }
            if arg.mode().is_output() {
                stmt.register_out(index, arg.driver_type().unwrap_or(DriverType::Other))
                    .map_err(fail(ExecutionPhase::Bound))?;
            }
        }

        tracing::trace!(statement = %def.id, phase = %ExecutionPhase::Executed, "statement phase");
        stmt.execute().map_err(fail(ExecutionPhase::Executed))?;

        tracing::trace!(statement = %def.id, phase = %ExecutionPhase::Extracting, "statement phase");
        let mut demux = Demux::new(
            self.engine.types(),
            self.engine.readers(),
            &plan.results,
            def.result_type.as_deref(),
            def.policy.case_insensitive,
        );
        let mut events = Vec::new();
        while let Some(event) = stmt.next_result().map_err(fail(ExecutionPhase::Extracting))? {
            let extracted = match event {
                ResultEvent::Cursor(mut cursor) => demux.cursor(&mut *cursor),
                ResultEvent::UpdateCount(count) => Ok(demux.update_count(count)),
            }
            .map_err(fail(ExecutionPhase::Extracting))?;
            events.push(extracted);
        }

        let mut outs = Vec::new();
        for (offset, arg) in plan.args.iter().enumerate() {
            if !arg.mode().is_output() {
                continue;
            }
            let index = offset + 1;
            let raw = stmt
                .out_value(index)
                .map_err(fail(ExecutionPhase::Extracting))?;
            let value = arg
                .from_driver(raw)
                .map_err(fail(ExecutionPhase::Extracting))?;
            let name = arg
                .result_name()
                .map_or_else(|| format!("#out-{index}"), str::to_string);
            outs.push((name, ResultValue::Scalar(value)));
        }

        tracing::trace!(
            statement = %def.id,
            phase = %ExecutionPhase::Done,
            events = events.len(),
            outs = outs.len(),
            "statement phase"
        );
        Ok(Execution { events, outs })
    }
}

fn failed(
    def: &StatementDef,
    plan: &StatementPlan,
    phase: ExecutionPhase,
    source: SqlTemplateError,
) -> SqlTemplateError {
    tracing::trace!(statement = %def.id, phase = %ExecutionPhase::Failed, "statement phase");
    tracing::error!(statement = %def.id, sql = %plan.sql, "statement failed while {phase}: {source}");
    SqlTemplateError::StatementExecution {
        phase,
        sql: plan.sql.clone(),
        args: plan.args_snapshot(),
        source: Box::new(source),
    }
}

fn into_map(execution: Execution, case_insensitive: bool) -> ResultMap {
    let mut map = ResultMap::new(case_insensitive);
    for event in execution.events {
        map.insert(event.name, event.value);
    }
    for (name, value) in execution.outs {
        map.insert(name, value);
    }
    map
}

fn combine(events: Vec<Extracted>, policy: MultipleResultPolicy) -> ResultValue {
    let has_cursor = events.iter().any(|e| e.kind == ResultKind::ResultSet);
    let wanted = if has_cursor {
        ResultKind::ResultSet
    } else {
        ResultKind::UpdateCount
    };
    let mut values: Vec<ResultValue> = events
        .into_iter()
        .filter(|e| e.kind == wanted)
        .map(|e| e.value)
        .collect();
    match policy {
        MultipleResultPolicy::First if !values.is_empty() => values.swap_remove(0),
        MultipleResultPolicy::Last => values.pop().unwrap_or(ResultValue::Empty),
        MultipleResultPolicy::All if !values.is_empty() => ResultValue::Multiple(values),
        _ => ResultValue::Empty,
    }
}
