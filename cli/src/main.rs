mod args;
mod commands;

use clap::Parser;

use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(args.log_level.as_level())
        .init();

    let result = match &args.command {
        Command::Compile(template) => commands::compile(template),
        Command::Run(run) => commands::run(run),
    };

    match result {
        Ok(json) => {
            let text = serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string());
            println!("{text}");
        }
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
