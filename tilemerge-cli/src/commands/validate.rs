//! Check a task file without running it.

use std::path::PathBuf;

use clap::Args;

use tilemerge::job::plan_batches;
use tilemerge::task::SourceKind;

use crate::error::CliError;

/// Arguments for the `validate` command.
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Path to the merge task JSON file
    #[arg(long)]
    pub task: PathBuf,
}

/// Parse the task, open every source, and report the batch plan.
pub fn run(args: &ValidateArgs) -> Result<(), CliError> {
    let task = super::merge::load_task(&args.task)?;

    for descriptor in &task.sources {
        // Opening is the existence check for filesystem stores
        descriptor.open()?;
        println!("source ok: {} ({})", descriptor.path, descriptor.origin);
    }
    let target_exists = match task.target.kind {
        SourceKind::Fs => std::path::Path::new(&task.target.path).exists(),
        SourceKind::Memory => false,
    };
    println!(
        "target: {} ({})",
        task.target.path,
        if target_exists { "existing" } else { "will be created" }
    );

    let plan = plan_batches(&task.bounds, task.batch_size).map_err(tilemerge::job::JobError::from)?;
    println!(
        "{} tiles across {} bounds, {} batches of at most {} tiles",
        task.tile_count(),
        task.bounds.len(),
        plan.len(),
        task.batch_size
    );
    Ok(())
}
