use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value as JsonValue;
use sql_template::context::MapSource;
use sql_template::engine::TemplateEngine;
use sql_template::error::SqlTemplateError;
use sql_template::executor::StatementExecutor;
use sql_template::sqlite::SqliteOptions;
use sql_template::statement::{ExecutePolicy, FragmentRegistry, StatementDef};

use crate::args::{RunArgs, TemplateArgs};

/// Inline text, or the contents of the file named after a leading `@`.
fn read_input(input: &str) -> Result<String, SqlTemplateError> {
    match input.strip_prefix('@') {
        Some(path) => read_file(Path::new(path)),
        None => Ok(input.to_string()),
    }
}

fn read_file(path: &Path) -> Result<String, SqlTemplateError> {
    fs::read_to_string(path).map_err(|err| {
        SqlTemplateError::ConfigError(format!("failed to read {}: {err}", path.display()))
    })
}

fn load_context(args: &TemplateArgs) -> Result<MapSource, SqlTemplateError> {
    let Some(context) = &args.context else {
        return Ok(MapSource::new());
    };
    let json: JsonValue = serde_json::from_str(&read_input(context)?)
        .map_err(|err| SqlTemplateError::ConfigError(format!("invalid context JSON: {err}")))?;
    MapSource::from_json(json)
}

fn build_engine(args: &TemplateArgs) -> Result<TemplateEngine, SqlTemplateError> {
    let mut fragments = FragmentRegistry::new();
    if let Some(path) = &args.fragments {
        let entries: BTreeMap<String, String> = serde_json::from_str(&read_file(path)?)
            .map_err(|err| SqlTemplateError::ConfigError(format!("invalid fragments JSON: {err}")))?;
        for (id, template) in &entries {
            fragments.register(id, template)?;
        }
        tracing::debug!(count = fragments.len(), "loaded fragments");
    }
    Ok(TemplateEngine::builder().fragments(fragments).build())
}

pub(crate) fn compile(args: &TemplateArgs) -> Result<JsonValue, SqlTemplateError> {
    let engine = build_engine(args)?;
    let context = load_context(args)?;
    let template = read_input(&args.template)?;
    let plan = engine.compile_str(&template, &context)?;
    serde_json::to_value(&plan)
        .map_err(|err| SqlTemplateError::ConfigError(format!("failed to serialize plan: {err}")))
}

pub(crate) fn run(args: &RunArgs) -> Result<JsonValue, SqlTemplateError> {
    let engine = build_engine(&args.template)?;
    let context = load_context(&args.template)?;
    let template = read_input(&args.template.template)?;

    let mut policy = ExecutePolicy::default()
        .with_multiple(args.policy)
        .with_case_insensitive(args.case_insensitive);
    if let Some(timeout) = args.timeout {
        policy = policy.with_timeout_secs(timeout.as_secs().max(1));
    }
    let def = StatementDef::new("cli", &template)?.with_policy(policy);
    engine.validate(&def)?;

    let mut driver = SqliteOptions::new(args.db.display().to_string())
        .with_wal(args.wal)
        .open()?;
    let outcome = StatementExecutor::new(&engine).execute(&mut driver, &def, &context)?;
    Ok(outcome.to_json())
}
