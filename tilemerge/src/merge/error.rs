//! Merge pipeline errors.

use thiserror::Error;

use crate::format::FormatError;
use crate::source::SourceError;
use crate::tile::TileError;

/// Errors produced while compositing one target tile.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A source handed back a tile from a deeper zoom than the target.
    /// Only upscaling is supported.
    #[error("cannot downscale tile from zoom {source_zoom} to zoom {target_zoom}")]
    DownscaleUnsupported { source_zoom: u8, target_zoom: u8 },

    /// A deferred fetch failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A fetched payload could not be decoded into pixels.
    #[error("failed to decode tile payload: {0}")]
    Decode(#[from] image::ImageError),

    /// Encoding or converting the result failed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A tile value could not be constructed or converted.
    #[error(transparent)]
    Tile(#[from] TileError),
}
