use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sql_template::statement::MultipleResultPolicy;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, Clone, Copy, ValueEnum, Serialize)]
pub(crate) enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile and run dynamic SQL templates")]
pub(crate) struct Args {
    #[command(subcommand)]
    pub(crate) command: Command,
    #[arg(long, value_enum, default_value = "warn", global = true)]
    pub(crate) log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print the compiled SQL, arguments and result descriptors as JSON
    Compile(TemplateArgs),
    /// Compile, execute against a SQLite database and print the results as JSON
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub(crate) struct TemplateArgs {
    /// Template text, or `@path` to read it from a file
    #[arg(long)]
    pub(crate) template: String,
    /// JSON object of parameters, or `@path`
    #[arg(long)]
    pub(crate) context: Option<String>,
    /// JSON object mapping fragment ids to templates, for `@{include}`
    #[arg(long)]
    pub(crate) fragments: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub(crate) template: TemplateArgs,
    #[arg(long)]
    pub(crate) db: PathBuf,
    #[arg(long, value_enum, default_value = "first")]
    pub(crate) policy: MultipleResultPolicy,
    #[arg(long)]
    pub(crate) case_insensitive: bool,
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) timeout: Option<Duration>,
    #[arg(long)]
    pub(crate) wal: bool,
}
