//! Tile compositing and upscaling.
//!
//! [`TileMerger`] flattens prioritized source layers into one output tile;
//! [`scaler`] enlarges lower-zoom tiles to stand in for missing deeper
//! ones.

mod error;
mod merger;
pub mod scaler;

pub use error::MergeError;
pub use merger::TileMerger;
