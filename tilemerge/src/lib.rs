//! # tilemerge
//!
//! Merges raster map tile pyramids. Prioritized source layers are
//! composited per tile address with alpha-over blending, lower-zoom tiles
//! stand in for missing deeper ones through nearest-neighbor upscaling,
//! and a persistable batch ledger makes long merge jobs resumable after a
//! crash.
//!
//! ## Architecture
//!
//! - [`coord`]: tile addresses, grid origins and rectangular tile ranges
//! - [`format`]: PNG/JPEG signature detection, conversion and the output
//!   format strategy
//! - [`tile`]: the validated encoded-tile value and deferred fetches
//! - [`source`]: tile store adapters (filesystem, in-memory) behind the
//!   [`source::Source`] trait
//! - [`merge`]: the compositing walk and the nearest-neighbor scaler
//! - [`status`]: the crash-resumable batch progress ledger
//! - [`task`]: serializable merge job descriptors
//! - [`job`]: batch planning and the claim/merge/checkpoint loop
//!
//! Every coordinate inside the pipeline uses the lower-left grid origin;
//! source adapters translate at the boundary.

pub mod coord;
pub mod format;
pub mod job;
pub mod merge;
pub mod source;
pub mod status;
pub mod task;
pub mod tile;

pub use coord::{Coord, GridOrigin, TileBounds, MAX_ZOOM};
pub use format::{FormatStrategy, TileFormat, TileFormatStrategy};
pub use job::{JobRunner, JobSummary};
pub use merge::TileMerger;
pub use source::Source;
pub use status::BatchStatusManager;
pub use task::{MergeTask, SourceDescriptor, SourceKind};
pub use tile::{Tile, TILE_SIZE};
