//! Argument parsing (spec.md §2 "CLI entry point": wiring only, no
//! package-spec lexing or prompts).

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod configure;
pub mod plan;
pub mod status;

#[derive(Debug, Parser)]
#[command(name = "bpkg", version, about = "Build plan computation engine for build2-style multi-configuration package management")]
pub struct Cli {
    /// Increase logging verbosity; repeat for more detail.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all logging below errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute and render the build plan.
    Plan(PlanArgs),
    /// Resolve per-package `config.*` variable assignments for the plan.
    Configure(PlanArgs),
    /// Show the persisted selected packages next to what's available.
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Configuration manifest (`[[configurations]]`, per `bpkg_config::loader`).
    #[arg(long, env = "BPKG_CONFIG")]
    pub config: PathBuf,

    /// Package database (`[[available]]`/`[[selected]]`/`[[selection]]`).
    #[arg(long, env = "BPKG_DB")]
    pub db: PathBuf,

    /// Render the plan without claiming it was actually applied.
    #[arg(long)]
    pub simulate: bool,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    /// Configuration manifest (`[[configurations]]`, per `bpkg_config::loader`).
    #[arg(long, env = "BPKG_CONFIG")]
    pub config: PathBuf,

    /// Package database (`[[available]]`/`[[selected]]`/`[[selection]]`).
    #[arg(long, env = "BPKG_DB")]
    pub db: PathBuf,
}
