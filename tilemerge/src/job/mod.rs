//! Batch-driven merge job execution.
//!
//! [`JobRunner`] turns a [`MergeTask`] into ledger batches and drains them:
//! claim a batch, merge every tile address it covers, write the results to
//! the target, mark the batch complete and checkpoint the ledger. A batch
//! that fails is logged and left claimed, so a later resume re-runs it
//! after [`BatchStatusManager::reset_batch_status`].
//!
//! Batch identifiers are derived from the tile ranges they cover, so a
//! resumed job recomputes the same plan and matches restored identifiers
//! without storing the plan anywhere.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::coord::{CoordError, TileBounds};
use crate::format::TileFormatStrategy;
use crate::merge::{MergeError, TileMerger};
use crate::source::{Source, SourceError};
use crate::status::{BatchStatusManager, LedgerError};
use crate::task::MergeTask;
use crate::tile::TileFetch;

/// Errors that abort a merge job outright.
///
/// Per-batch merge failures do not abort the job; they are counted in the
/// summary and the batch stays claimed for resume.
#[derive(Debug, Error)]
pub enum JobError {
    /// A source or the target could not be opened or written.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Compositing failed outside any batch context.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The ledger could not be snapshotted or restored.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Batch planning produced an invalid tile range.
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// Checkpointing failed.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a finished (or partially finished) run accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Tiles written to the target across all completed batches.
    pub tiles_written: u64,
    /// Batches completed in this run.
    pub batches_completed: usize,
    /// Batches that failed and were left claimed in the ledger.
    pub batches_failed: usize,
}

impl JobSummary {
    /// Whether every claimed batch completed.
    pub fn is_clean(&self) -> bool {
        self.batches_failed == 0
    }
}

/// The ledger identifier of a batch, derived from the range it covers.
pub fn batch_id(bounds: TileBounds) -> String {
    format!(
        "{}/{}-{}/{}-{}",
        bounds.zoom(),
        bounds.min_x(),
        bounds.max_x(),
        bounds.min_y(),
        bounds.max_y()
    )
}

/// Split tile ranges into batches of at most `batch_size` tiles.
///
/// Each range is cut into horizontal bands covering the full x extent, so
/// the plan is deterministic: the same bounds and batch size always
/// produce the same identifiers, which is what lets a resumed job match
/// the identifiers restored from a snapshot.
///
/// # Errors
///
/// Returns `CoordError` if a sub-range fails validation, which only
/// happens for bounds that were invalid to begin with.
pub fn plan_batches(
    bounds: &[TileBounds],
    batch_size: u64,
) -> Result<Vec<(String, TileBounds)>, CoordError> {
    let mut plan = Vec::new();
    for range in bounds {
        if range.is_empty() {
            continue;
        }
        let width = u64::from(range.max_x() - range.min_x());
        let band = (batch_size / width).max(1) as u32;
        let mut y = range.min_y();
        while y < range.max_y() {
            let end = range.max_y().min(y + band);
            let chunk = TileBounds::new(range.zoom(), range.min_x(), range.max_x(), y, end)?;
            plan.push((batch_id(chunk), chunk));
            y = end;
        }
    }
    Ok(plan)
}

/// Drains the batches of one merge task.
pub struct JobRunner {
    merger: TileMerger,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner {
    pub fn new() -> Self {
        // Adapters translate to lower-left at the source boundary, so the
        // pipeline itself always runs lower-left
        Self {
            merger: TileMerger::default(),
        }
    }

    /// Run the task until no claimable batch remains.
    ///
    /// `checkpoint` is invoked after every completed batch and once more
    /// after a clean drain; callers persist the ledger snapshot there.
    ///
    /// On a fresh ledger the plan is assigned first; on a restored ledger
    /// the existing batches are drained instead, and a restored identifier
    /// with no counterpart in the current plan is dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `JobError` if the target or a source cannot be opened, a
    /// write to the target fails, or checkpointing fails. Merge failures
    /// inside a batch are reported through the summary instead.
    pub fn run<F>(
        &self,
        task: &MergeTask,
        manager: &BatchStatusManager,
        mut checkpoint: F,
    ) -> Result<JobSummary, JobError>
    where
        F: FnMut(&BatchStatusManager) -> Result<(), JobError>,
    {
        let target = if manager.is_new_target() {
            task.target.create()?
        } else {
            task.target.open()?
        };
        let sources = task
            .sources
            .iter()
            .map(|descriptor| descriptor.open())
            .collect::<Result<Vec<_>, _>>()?;

        let layer = task.target.path.clone();
        let plan: HashMap<String, TileBounds> =
            plan_batches(&task.bounds, task.batch_size)?.into_iter().collect();

        if manager.initialize_layer(&layer) {
            for id in plan.keys() {
                manager.assign_batch(&layer, id);
            }
            info!(layer = %layer, batches = plan.len(), "assigned batch plan");
        } else {
            info!(
                layer = %layer,
                remaining = manager.remaining_batches(&layer),
                "resuming existing batch plan"
            );
        }

        let mut summary = JobSummary::default();
        while let Some(id) = manager.claim_batch(&layer) {
            let Some(&bounds) = plan.get(&id) else {
                warn!(batch = %id, "restored batch does not match current plan, dropping");
                manager.complete_batch(&layer, &id, 0);
                continue;
            };
            manager.set_current_batch(&layer, Some(id.clone()));
            info!(batch = %id, tiles = bounds.size(), "merging batch");

            match self.merge_batch(task, target.as_ref(), &sources, bounds) {
                Ok(written) => {
                    manager.complete_batch(&layer, &id, written);
                    manager.set_current_batch(&layer, None);
                    summary.tiles_written += written;
                    summary.batches_completed += 1;
                    checkpoint(manager)?;
                }
                Err(err) => {
                    error!(batch = %id, error = %err, "batch failed, left claimed for resume");
                    summary.batches_failed += 1;
                }
            }
        }

        if summary.is_clean() {
            manager.complete_layer(&layer);
            target.finalize()?;
            checkpoint(manager)?;
            info!(
                layer = %layer,
                tiles = manager.total_completed_tiles(&layer),
                "layer complete"
            );
        }
        Ok(summary)
    }

    /// Merge every tile address a batch covers and write the results.
    ///
    /// Writes are buffered for the whole batch, so a batch that fails
    /// midway leaves the target untouched.
    fn merge_batch(
        &self,
        task: &MergeTask,
        target: &dyn Source,
        sources: &[Box<dyn Source>],
        bounds: TileBounds,
    ) -> Result<u64, JobError> {
        let strategy = TileFormatStrategy::new(task.format, task.strategy);
        let mut merged = Vec::new();

        for coord in bounds.coords() {
            let mut fetches: Vec<TileFetch<'_>> = Vec::with_capacity(sources.len() + 1);
            if task.upload_only {
                // Slot for the write target; the merger skips it unread
                fetches.push(Box::new(move || target.get_tile(coord)));
            }
            for source in sources {
                let source = source.as_ref();
                fetches.push(Box::new(move || source.corresponding_tile(coord, true)));
            }
            if !task.upload_only {
                // Existing target data is the bottom layer
                fetches.push(Box::new(move || target.corresponding_tile(coord, true)));
            }

            if let Some(tile) =
                self.merger
                    .merge_tiles(fetches, coord, strategy, task.upload_only)?
            {
                merged.push(tile);
            }
        }

        let written = merged.len() as u64;
        if !merged.is_empty() {
            target.write_tiles(&merged)?;
        }
        Ok(written)
    }
}
