//! Tile source adapters.
//!
//! A [`Source`] is the boundary between the merge core and a concrete
//! tile store. Adapters translate between the pipeline's lower-left
//! addressing and whatever row convention their backing store uses, and
//! they are the only place I/O happens: the merger itself only ever sees
//! `Option<Tile>` values coming out of deferred fetches.

mod fs;
mod memory;

pub use fs::FsSource;
pub use memory::MemorySource;

use thiserror::Error;

use crate::coord::{Coord, CoordError};
use crate::tile::{Tile, TileError};

/// Errors produced by source adapters.
#[derive(Debug, Error)]
pub enum SourceError {
    /// I/O failure in the backing store.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored payload could not be turned into a tile.
    #[error(transparent)]
    Tile(#[from] TileError),

    /// A derived address fell outside the grid.
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// Backend-specific failure.
    #[error("source backend error: {0}")]
    Backend(String),
}

/// A readable/writable tile store.
///
/// All coordinates cross this boundary in lower-left convention;
/// implementations flip internally when their store counts rows from the
/// top. Implementations must be `Send + Sync` so independent worker
/// threads can fetch concurrently.
pub trait Source: Send + Sync {
    /// Identifier for logs and ledger layer keys, typically the store path.
    fn path(&self) -> &str;

    /// Whether a tile exists at the address.
    fn tile_exists(&self, coord: Coord) -> Result<bool, SourceError>;

    /// Fetch the tile at the address, `None` if the store has no data there.
    fn get_tile(&self, coord: Coord) -> Result<Option<Tile>, SourceError>;

    /// Write a batch of tiles to the store.
    fn write_tiles(&self, tiles: &[Tile]) -> Result<(), SourceError>;

    /// Flush any buffered state. Called once after the last write.
    fn finalize(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Fetch the tile at the address, or — when `upscale` is set and the
    /// exact tile is missing — the deepest existing ancestor tile, which
    /// the merger will enlarge to cover the requested address.
    ///
    /// The ancestor keeps its own (lower-zoom) address so the caller can
    /// tell it was substituted.
    fn corresponding_tile(&self, coord: Coord, upscale: bool) -> Result<Option<Tile>, SourceError> {
        if let Some(tile) = self.get_tile(coord)? {
            return Ok(Some(tile));
        }
        if !upscale {
            return Ok(None);
        }
        let mut current = coord;
        while let Some(ancestor) = current.parent() {
            if let Some(tile) = self.get_tile(ancestor)? {
                return Ok(Some(tile));
            }
            current = ancestor;
        }
        Ok(None)
    }
}
