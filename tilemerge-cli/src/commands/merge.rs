//! Run a merge task from a task file.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use tilemerge::job::{JobError, JobRunner, JobSummary};
use tilemerge::status::BatchStatusManager;
use tilemerge::task::{MergeTask, SourceKind};

use crate::error::CliError;

/// Arguments for the `merge` command.
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Path to the merge task JSON file
    #[arg(long)]
    pub task: PathBuf,

    /// Where the ledger snapshot is checkpointed after every batch
    #[arg(long, default_value = "status.json")]
    pub status: PathBuf,
}

/// Start a fresh merge run.
///
/// `command` is the raw CLI invocation, stored in the ledger so `resume`
/// can replay it.
pub fn run(args: &MergeArgs, command: Vec<String>) -> Result<JobSummary, CliError> {
    let task = load_task(&args.task)?;
    let is_new = match task.target.kind {
        SourceKind::Fs => !Path::new(&task.target.path).exists(),
        SourceKind::Memory => true,
    };
    let manager = BatchStatusManager::new(is_new, command);
    execute(&task, &manager, &args.status)
}

/// Continue a run under a ledger restored from a snapshot.
pub fn run_restored(
    args: &MergeArgs,
    manager: &BatchStatusManager,
) -> Result<JobSummary, CliError> {
    let task = load_task(&args.task)?;
    execute(&task, manager, &args.status)
}

pub fn load_task(path: &Path) -> Result<MergeTask, CliError> {
    let json = fs::read_to_string(path)?;
    Ok(MergeTask::from_json(&json)?)
}

fn execute(
    task: &MergeTask,
    manager: &BatchStatusManager,
    status_path: &Path,
) -> Result<JobSummary, CliError> {
    let summary = JobRunner::new().run(task, manager, |ledger| {
        let snapshot = ledger.snapshot()?;
        fs::write(status_path, snapshot).map_err(JobError::from)
    })?;
    info!(
        tiles = summary.tiles_written,
        completed = summary.batches_completed,
        failed = summary.batches_failed,
        "merge run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilemerge::format::TileFormat;

    #[test]
    fn test_load_task_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        fs::write(
            &path,
            r#"{
                "target": {"path": "/tiles/out", "kind": "fs", "origin": "LL"},
                "sources": [],
                "bounds": [],
                "format": "png",
                "strategy": "fixed"
            }"#,
        )
        .unwrap();

        let task = load_task(&path).unwrap();
        assert_eq!(task.target.path, "/tiles/out");
        assert_eq!(task.format, TileFormat::Png);
        assert!(!task.upload_only);
    }

    #[test]
    fn test_load_task_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        fs::write(&path, "{not json").unwrap();

        let result = load_task(&path);
        assert!(matches!(result, Err(CliError::TaskParse(_))));
    }

    #[test]
    fn test_load_task_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_task(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
