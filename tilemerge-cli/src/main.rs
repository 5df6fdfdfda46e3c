//! tilemerge CLI.
//!
//! Runs merge tasks against tile stores, checkpoints progress to a status
//! snapshot after every batch, and resumes interrupted runs by replaying
//! the command stored in the snapshot.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::{merge, resume, task, validate};

#[derive(Debug, Parser)]
#[command(name = "tilemerge", about = "Merge raster map tile pyramids", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a merge task
    Merge(merge::MergeArgs),
    /// Resume an interrupted run from its status snapshot
    Resume(resume::ResumeArgs),
    /// Build a task file from flags
    Task(task::TaskArgs),
    /// Check a task file without running it
    Validate(validate::ValidateArgs),
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Merge(args) => {
            // Stored verbatim in the ledger so `resume` can replay it
            let command = std::env::args().skip(1).collect();
            merge::run(args, command).map(summary_exit)
        }
        Command::Resume(args) => resume::run(args).map(summary_exit),
        Command::Task(args) => task::run(args).map(|()| ExitCode::SUCCESS),
        Command::Validate(args) => validate::run(args).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Failed batches stay claimed in the snapshot; exit nonzero so operators
/// know a resume is needed.
fn summary_exit(summary: tilemerge::job::JobSummary) -> ExitCode {
    if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "{} batch(es) failed and were left claimed; run `tilemerge resume`",
            summary.batches_failed
        );
        ExitCode::FAILURE
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
