//! CLI error type.

use thiserror::Error;

use tilemerge::job::JobError;
use tilemerge::source::SourceError;
use tilemerge::status::LedgerError;

/// Errors surfaced to the user by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading or writing a task or status file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The task file is not a valid merge task.
    #[error("invalid task file: {0}")]
    TaskParse(#[from] serde_json::Error),

    /// The status snapshot could not be restored.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The merge job aborted.
    #[error(transparent)]
    Job(#[from] JobError),

    /// A tile store named by the task is unusable.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A command-line argument could not be interpreted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The status snapshot cannot drive a resume.
    #[error("cannot resume: {0}")]
    InvalidResume(String),
}
