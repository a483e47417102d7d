use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{Cursor, Driver, DriverStatement, ResultEvent};
use crate::error::SqlTemplateError;
use crate::statement::ExecutePolicy;
use crate::types::{DriverType, DriverValue};

/// One event a scripted statement produces after execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedEvent {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<DriverValue>>,
    },
    UpdateCount(u64),
}

/// Where a scripted execution fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Prepare,
    Bind,
    Execute,
    /// Cursors fail on their first row; without a cursor, `next_result` fails.
    Fetch,
}

/// What the next prepared statement of a [`ScriptedDriver`] does.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecution {
    pub events: Vec<ScriptedEvent>,
    /// Output parameter values by 1-based index.
    pub outs: HashMap<usize, DriverValue>,
    pub fail_at: Option<FailPoint>,
}

impl ScriptedExecution {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rows(mut self, columns: &[&str], rows: Vec<Vec<DriverValue>>) -> Self {
        self.events.push(ScriptedEvent::Rows {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        });
        self
    }

    #[must_use]
    pub fn with_update_count(mut self, count: u64) -> Self {
        self.events.push(ScriptedEvent::UpdateCount(count));
        self
    }

    #[must_use]
    pub fn with_out(mut self, index: usize, value: DriverValue) -> Self {
        self.outs.insert(index, value);
        self
    }

    #[must_use]
    pub fn failing_at(mut self, point: FailPoint) -> Self {
        self.fail_at = Some(point);
        self
    }
}

/// Everything a [`ScriptedDriver`] was asked to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverLog {
    pub prepared: Vec<String>,
    pub policies: Vec<ExecutePolicy>,
    pub binds: Vec<(usize, DriverValue, Option<DriverType>)>,
    pub registered_outs: Vec<(usize, DriverType)>,
    pub executions: usize,
    pub statements_closed: usize,
    pub cursors_opened: usize,
    pub cursors_closed: usize,
}

impl DriverLog {
    /// Every statement and cursor that was handed out has been dropped.
    #[must_use]
    pub fn all_released(&self) -> bool {
        self.statements_closed == self.prepared.len() && self.cursors_closed == self.cursors_opened
    }
}

type SharedLog = Arc<Mutex<DriverLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, DriverLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

fn scripted_failure(point: FailPoint) -> SqlTemplateError {
    SqlTemplateError::DriverError(format!("scripted failure at {point:?}"))
}

/// A driver that plays back [`ScriptedExecution`]s, one per prepared statement.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    scripts: VecDeque<ScriptedExecution>,
    log: SharedLog,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_script(mut self, script: ScriptedExecution) -> Self {
        self.push(script);
        self
    }

    pub fn push(&mut self, script: ScriptedExecution) {
        self.scripts.push_back(script);
    }

    /// Snapshot of the log so far.
    #[must_use]
    pub fn log(&self) -> DriverLog {
        lock(&self.log).clone()
    }
}

impl Driver for ScriptedDriver {
    type Statement<'c>
        = ScriptedStatement
    where
        Self: 'c;

    fn prepare<'c>(
        &'c mut self,
        sql: &str,
        policy: &ExecutePolicy,
    ) -> Result<ScriptedStatement, SqlTemplateError> {
        let script = self.scripts.pop_front().unwrap_or_default();
        if script.fail_at == Some(FailPoint::Prepare) {
            return Err(scripted_failure(FailPoint::Prepare));
        }
        {
            let mut log = lock(&self.log);
            log.prepared.push(sql.to_string());
            log.policies.push(policy.clone());
        }
        Ok(ScriptedStatement {
            events: script.events.iter().cloned().collect(),
            script,
            executed: false,
            log: Arc::clone(&self.log),
        })
    }
}

/// A statement handed out by [`ScriptedDriver`]. Dropping it is logged.
#[derive(Debug)]
pub struct ScriptedStatement {
    script: ScriptedExecution,
    events: VecDeque<ScriptedEvent>,
    executed: bool,
    log: SharedLog,
}

impl ScriptedStatement {
    fn fails_at(&self, point: FailPoint) -> bool {
        self.script.fail_at == Some(point)
    }
}

impl DriverStatement for ScriptedStatement {
    fn bind(
        &mut self,
        index: usize,
        value: DriverValue,
        driver_type: Option<DriverType>,
    ) -> Result<(), SqlTemplateError> {
        if self.fails_at(FailPoint::Bind) {
            return Err(scripted_failure(FailPoint::Bind));
        }
        lock(&self.log).binds.push((index, value, driver_type));
        Ok(())
    }

    fn register_out(&mut self, index: usize, driver_type: DriverType) -> Result<(), SqlTemplateError> {
        lock(&self.log).registered_outs.push((index, driver_type));
        Ok(())
    }

    fn execute(&mut self) -> Result<(), SqlTemplateError> {
        if self.fails_at(FailPoint::Execute) {
            return Err(scripted_failure(FailPoint::Execute));
        }
        lock(&self.log).executions += 1;
        self.executed = true;
        Ok(())
    }

    fn next_result(&mut self) -> Result<Option<ResultEvent<'_>>, SqlTemplateError> {
        if !self.executed {
            return Err(SqlTemplateError::DriverError(
                "statement has not been executed".to_string(),
            ));
        }
        let fail_fetch = self.fails_at(FailPoint::Fetch);
        if fail_fetch
            && !self
                .events
                .iter()
                .any(|e| matches!(e, ScriptedEvent::Rows { .. }))
        {
            return Err(scripted_failure(FailPoint::Fetch));
        }
        match self.events.pop_front() {
            None => Ok(None),
            Some(ScriptedEvent::UpdateCount(count)) => Ok(Some(ResultEvent::UpdateCount(count))),
            Some(ScriptedEvent::Rows { columns, rows }) => {
                lock(&self.log).cursors_opened += 1;
                Ok(Some(ResultEvent::Cursor(Box::new(ScriptedCursor {
                    columns,
                    rows: rows.into(),
                    fail: fail_fetch,
                    log: Arc::clone(&self.log),
                }))))
            }
        }
    }

    fn out_value(&mut self, index: usize) -> Result<DriverValue, SqlTemplateError> {
        Ok(self
            .script
            .outs
            .get(&index)
            .cloned()
            .unwrap_or(DriverValue::Null))
    }
}

impl Drop for ScriptedStatement {
    fn drop(&mut self) {
        lock(&self.log).statements_closed += 1;
    }
}

struct ScriptedCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<DriverValue>>,
    fail: bool,
    log: SharedLog,
}

impl Cursor for ScriptedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<DriverValue>>, SqlTemplateError> {
        if self.fail {
            return Err(scripted_failure(FailPoint::Fetch));
        }
        Ok(self.rows.pop_front())
    }
}

impl Drop for ScriptedCursor {
    fn drop(&mut self) {
        lock(&self.log).cursors_closed += 1;
    }
}
