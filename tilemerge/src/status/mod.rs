//! Batch progress ledger.
//!
//! [`BatchStatusManager`] tracks which batches of a merge job are pending,
//! claimed, or completed, per target layer. The whole ledger serializes to
//! a JSON snapshot after every completed batch, so a crashed job can be
//! restored and resumed: completed batches are gone from the ledger,
//! claimed-but-incomplete ones are reset to pending and re-run.
//!
//! Claiming and completing are atomic under one coarse mutex; the batch
//! tables themselves are concurrent maps so read-only lookups never take
//! the lock.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The snapshot is not valid ledger JSON. Resuming from a corrupt
    /// snapshot must fail loudly rather than silently redo or skip work.
    #[error("malformed status snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),
}

/// State of the merge target itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BaseLayerStatus {
    /// Whether the target store was created by this job. A resumed job
    /// must not re-run target creation.
    pub is_new: bool,
}

/// Per-layer batch bookkeeping.
///
/// `batches` maps batch identifier to a claimed flag. Completed batches
/// are removed outright, so any entry still present after a crash is
/// unfinished work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStatus {
    batch_identifier: Option<String>,
    is_done: bool,
    total_completed_tiles: u64,
    batches: Arc<DashMap<String, bool>>,
}

impl LayerStatus {
    fn new() -> Self {
        Self {
            batch_identifier: None,
            is_done: false,
            total_completed_tiles: 0,
            batches: Arc::new(DashMap::new()),
        }
    }

    /// The batch the layer is currently working on, if any.
    pub fn current_batch(&self) -> Option<&str> {
        self.batch_identifier.as_deref()
    }

    /// Whether the layer has finished all of its batches.
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// Tiles written across all completed batches.
    pub fn total_completed_tiles(&self) -> u64 {
        self.total_completed_tiles
    }

    /// Number of batches still pending or claimed.
    pub fn remaining_batches(&self) -> usize {
        self.batches.len()
    }

    fn claim(&mut self) -> Option<String> {
        let pending = self
            .batches
            .iter()
            .find_map(|entry| (!*entry.value()).then(|| entry.key().clone()));
        let id = pending?;
        self.batches.insert(id.clone(), true);
        Some(id)
    }
}

/// The serialized shape of the whole ledger.
#[derive(Debug, Serialize, Deserialize)]
struct ManagerState {
    base_layer: BaseLayerStatus,
    states: HashMap<String, LayerStatus>,
    /// The command-line arguments that started the job, replayed on resume.
    command: Vec<String>,
}

/// Thread-safe ledger of batch progress for a merge job.
pub struct BatchStatusManager {
    state: Mutex<ManagerState>,
}

impl BatchStatusManager {
    /// Create a fresh ledger for a job started with `command`.
    pub fn new(is_new_target: bool, command: Vec<String>) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                base_layer: BaseLayerStatus { is_new: is_new_target },
                states: HashMap::new(),
                command,
            }),
        }
    }

    /// Restore a ledger from a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MalformedSnapshot`] if the snapshot does not
    /// parse; a corrupt status file means resuming is unsafe.
    pub fn restore(snapshot: &str) -> Result<Self, LedgerError> {
        let state: ManagerState = serde_json::from_str(snapshot)?;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Serialize the ledger to a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if serialization fails.
    pub fn snapshot(&self) -> Result<String, LedgerError> {
        Ok(serde_json::to_string_pretty(&*self.state.lock())?)
    }

    /// The command-line arguments stored for resuming.
    pub fn command(&self) -> Vec<String> {
        self.state.lock().command.clone()
    }

    /// Whether the target store was created by this job.
    pub fn is_new_target(&self) -> bool {
        self.state.lock().base_layer.is_new
    }

    /// Register a layer, keeping existing progress if already present.
    ///
    /// Returns `true` if the layer was not known before. A restored ledger
    /// already carries the layer, and its batches must not be reassigned.
    pub fn initialize_layer(&self, layer: &str) -> bool {
        let mut state = self.state.lock();
        if state.states.contains_key(layer) {
            return false;
        }
        state.states.insert(layer.to_string(), LayerStatus::new());
        true
    }

    /// Add a pending batch to a layer. No-op if the batch is already known.
    pub fn assign_batch(&self, layer: &str, batch_id: &str) {
        let state = self.state.lock();
        if let Some(status) = state.states.get(layer) {
            status
                .batches
                .entry(batch_id.to_string())
                .or_insert(false);
        }
    }

    /// Claim the next pending batch of a layer, marking it in flight.
    ///
    /// Returns `None` when every batch is claimed or completed.
    pub fn claim_batch(&self, layer: &str) -> Option<String> {
        let mut state = self.state.lock();
        state.states.get_mut(layer)?.claim()
    }

    /// Record which batch the layer is currently working on.
    pub fn set_current_batch(&self, layer: &str, batch_id: Option<String>) {
        let mut state = self.state.lock();
        if let Some(status) = state.states.get_mut(layer) {
            status.batch_identifier = batch_id;
        }
    }

    /// The batch a layer is currently working on.
    pub fn current_batch(&self, layer: &str) -> Option<String> {
        self.state
            .lock()
            .states
            .get(layer)
            .and_then(|status| status.batch_identifier.clone())
    }

    /// Mark a batch finished: remove it from the ledger and add its tile
    /// count to the layer total.
    ///
    /// Unknown batch identifiers are ignored, so replaying a completion is
    /// harmless.
    pub fn complete_batch(&self, layer: &str, batch_id: &str, tiles: u64) {
        let mut state = self.state.lock();
        if let Some(status) = state.states.get_mut(layer) {
            if status.batches.remove(batch_id).is_some() {
                status.total_completed_tiles += tiles;
            }
        }
    }

    /// Mark a layer fully merged. The target is no longer "new" once a
    /// layer has been written into it.
    pub fn complete_layer(&self, layer: &str) {
        let mut state = self.state.lock();
        state.base_layer.is_new = false;
        if let Some(status) = state.states.get_mut(layer) {
            status.is_done = true;
            status.batch_identifier = None;
        }
    }

    /// Whether a layer has finished all of its batches.
    pub fn is_layer_done(&self, layer: &str) -> bool {
        self.state
            .lock()
            .states
            .get(layer)
            .is_some_and(LayerStatus::is_done)
    }

    /// Tiles written across all completed batches of a layer.
    pub fn total_completed_tiles(&self, layer: &str) -> u64 {
        self.state
            .lock()
            .states
            .get(layer)
            .map_or(0, LayerStatus::total_completed_tiles)
    }

    /// Number of batches of a layer still pending or claimed.
    pub fn remaining_batches(&self, layer: &str) -> usize {
        self.state
            .lock()
            .states
            .get(layer)
            .map_or(0, LayerStatus::remaining_batches)
    }

    /// Return every claimed-but-incomplete batch to pending.
    ///
    /// Called once after restoring a snapshot: batches that were in flight
    /// when the job died were never written, so they must be re-run.
    pub fn reset_batch_status(&self) {
        let mut state = self.state.lock();
        for status in state.states.values_mut() {
            status.batch_identifier = None;
            let claimed: Vec<String> = status
                .batches
                .iter()
                .filter(|entry| *entry.value())
                .map(|entry| entry.key().clone())
                .collect();
            for id in claimed {
                status.batches.insert(id, false);
            }
        }
    }
}
