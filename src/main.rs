use clap::Parser;
use colored::*;
use lambda::cli::commands::{self, RunContext};
use lambda::cli::{formatter, Cli, Commands};
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter, e.g. `LAMBDA_LOG=lambda=debug`.
const LOG_ENV: &str = "LAMBDA_LOG";

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    let level = match cli.verbosity() {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
    formatter::init();

    if cfg!(debug_assertions) {
        tracing::warn!(
            "This is a debug build; searches run many times slower than with `cargo build --release`"
        );
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = RunContext::load(cli.config.as_deref(), cli.threads, cli.verbosity())?;
    tracing::debug!("Using {} threads", if ctx.threads == 0 { num_cpus::get() } else { ctx.threads });

    match cli.command {
        Commands::Index(args) => commands::index::run(args, &ctx),
        Commands::Search(args) => commands::search::run(args, &ctx),
    }
}
