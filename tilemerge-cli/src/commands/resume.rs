//! Resume a crashed or interrupted merge run.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser};
use tracing::info;

use tilemerge::job::JobSummary;
use tilemerge::status::BatchStatusManager;

use crate::error::CliError;
use crate::{Cli, Command};

/// Arguments for the `resume` command.
#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Status snapshot written by the interrupted run
    #[arg(long, default_value = "status.json")]
    pub status: PathBuf,
}

/// Restore the ledger, return in-flight batches to pending, and replay the
/// stored merge command under the restored ledger.
pub fn run(args: &ResumeArgs) -> Result<JobSummary, CliError> {
    let snapshot = fs::read_to_string(&args.status)?;
    let manager = BatchStatusManager::restore(&snapshot)?;
    manager.reset_batch_status();

    let stored = manager.command();
    if stored.is_empty() {
        return Err(CliError::InvalidResume(
            "snapshot carries no command to replay".to_string(),
        ));
    }
    info!(command = ?stored, "replaying stored command");

    let cli = Cli::try_parse_from(std::iter::once("tilemerge".to_string()).chain(stored))
        .map_err(|err| CliError::InvalidResume(err.to_string()))?;
    match cli.command {
        Command::Merge(merge_args) => super::merge::run_restored(&merge_args, &manager),
        _ => Err(CliError::InvalidResume(
            "stored command is not a merge".to_string(),
        )),
    }
}
