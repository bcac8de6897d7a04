//! bpkg — a thin command-line front end over the build plan engine.
//!
//! This binary only wires configuration loading, the package database and
//! the planner together; it does not parse package specs, fetch over the
//! network or invoke a real build system (spec.md §2 "CLI entry point").

mod commands;
mod executor;
mod manifest;
mod repo;
mod setup;

use clap::Parser;
use commands::{Cli, Commands};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 if cli.quiet => Level::ERROR,
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder().with_default_directive(log_level.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).without_time().init();

    let result = match &cli.command {
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Configure(args) => commands::configure::run(args),
        Commands::Status(args) => commands::status::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
