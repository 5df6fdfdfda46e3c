//! Merge task descriptors.
//!
//! A [`MergeTask`] is the serializable description of one merge job: the
//! target store, the prioritized source stores, the tile ranges to cover
//! and the output format policy. Tasks round-trip through JSON so they can
//! be written by hand, shipped between machines, or replayed on resume.

use serde::{Deserialize, Serialize};

use crate::coord::{GridOrigin, TileBounds};
use crate::format::{FormatStrategy, TileFormat};
use crate::source::{FsSource, MemorySource, Source, SourceError};

/// Default number of tiles per batch.
pub const DEFAULT_BATCH_SIZE: u64 = 1000;

/// The backing store behind a source descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A `<base>/<z>/<x>/<y>.<ext>` directory tree.
    Fs,
    /// A transient in-memory store. Starts empty; useful for dry runs.
    Memory,
}

/// Where and how a tile store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub path: String,
    pub kind: SourceKind,
    pub origin: GridOrigin,
}

impl SourceDescriptor {
    /// Open the described store. Fails if an `fs` store is missing.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the store cannot be opened.
    pub fn open(&self) -> Result<Box<dyn Source>, SourceError> {
        match self.kind {
            SourceKind::Fs => Ok(Box::new(FsSource::open(&self.path, self.origin)?)),
            SourceKind::Memory => Ok(Box::new(MemorySource::new(self.path.clone(), self.origin))),
        }
    }

    /// Open the described store, creating it first if missing.
    ///
    /// Only meaningful for the merge target.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the store cannot be created.
    pub fn create(&self) -> Result<Box<dyn Source>, SourceError> {
        match self.kind {
            SourceKind::Fs => Ok(Box::new(FsSource::create(&self.path, self.origin)?)),
            SourceKind::Memory => Ok(Box::new(MemorySource::new(self.path.clone(), self.origin))),
        }
    }
}

/// A complete merge job description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeTask {
    /// The store merged tiles are written to. Existing target tiles act as
    /// the bottom layer unless `upload_only` is set.
    pub target: SourceDescriptor,

    /// Source stores in priority order: index 0 is painted on top.
    pub sources: Vec<SourceDescriptor>,

    /// Tile ranges to merge, typically one per zoom level.
    pub bounds: Vec<TileBounds>,

    /// Output tile format.
    pub format: TileFormat,

    /// Whether `format` is forced or only applied to merged tiles.
    pub strategy: FormatStrategy,

    /// Skip reading the target back: source tiles are uploaded as-is, and
    /// a lone source tile passes through without ever being decoded.
    #[serde(default)]
    pub upload_only: bool,

    /// Maximum tiles per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

impl MergeTask {
    /// Parse a task from JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the task to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Total number of tiles covered by the task's bounds.
    pub fn tile_count(&self) -> u64 {
        self.bounds.iter().map(TileBounds::size).sum()
    }
}
