//! Filesystem tile store.
//!
//! Tiles live under `<base>/<z>/<x>/<y>.<ext>`. Reads accept `.png`,
//! `.jpg` and `.jpeg`; writes pick the extension from the tile's format.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::coord::{Coord, GridOrigin};
use crate::tile::Tile;

use super::{Source, SourceError};

/// Extensions tried on read, in order.
const READ_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A directory-backed tile source.
pub struct FsSource {
    base: PathBuf,
    path: String,
    origin: GridOrigin,
}

impl FsSource {
    /// Open an existing tile directory.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the directory does not exist.
    pub fn open(base: impl Into<PathBuf>, origin: GridOrigin) -> Result<Self, SourceError> {
        let base = base.into();
        if !base.is_dir() {
            return Err(SourceError::Backend(format!(
                "tile directory does not exist: {}",
                base.display()
            )));
        }
        Ok(Self::from_base(base, origin))
    }

    /// Create the tile directory if missing and open it.
    ///
    /// Used for a brand new merge target.
    pub fn create(base: impl Into<PathBuf>, origin: GridOrigin) -> Result<Self, SourceError> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self::from_base(base, origin))
    }

    fn from_base(base: PathBuf, origin: GridOrigin) -> Self {
        let path = base.display().to_string();
        Self { base, path, origin }
    }

    /// The grid origin of the backing store.
    pub fn origin(&self) -> GridOrigin {
        self.origin
    }

    /// Map a pipeline (lower-left) address to the store's own convention.
    fn storage_coord(&self, coord: Coord) -> Coord {
        match self.origin {
            GridOrigin::LowerLeft => coord,
            GridOrigin::UpperLeft => coord.flip_y(),
        }
    }

    fn tile_dir(&self, coord: Coord) -> PathBuf {
        self.base
            .join(coord.zoom().to_string())
            .join(coord.x().to_string())
    }

    fn existing_tile_path(&self, coord: Coord) -> Option<PathBuf> {
        let dir = self.tile_dir(coord);
        READ_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", coord.y(), ext)))
            .find(|candidate| candidate.is_file())
    }
}

impl Source for FsSource {
    fn path(&self) -> &str {
        &self.path
    }

    fn tile_exists(&self, coord: Coord) -> Result<bool, SourceError> {
        Ok(self.existing_tile_path(self.storage_coord(coord)).is_some())
    }

    fn get_tile(&self, coord: Coord) -> Result<Option<Tile>, SourceError> {
        let stored = self.storage_coord(coord);
        let Some(path) = self.existing_tile_path(stored) else {
            return Ok(None);
        };
        debug!(coord = %coord, path = %path.display(), "reading tile");
        let data = fs::read(&path)?;
        // The tile keeps the requested (pipeline) address, not the stored one
        Ok(Some(Tile::new(coord, data)?))
    }

    fn write_tiles(&self, tiles: &[Tile]) -> Result<(), SourceError> {
        for tile in tiles {
            let stored = self.storage_coord(tile.coord());
            let dir = self.tile_dir(stored);
            fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{}.{}", stored.y(), tile.format().extension()));
            debug!(coord = %tile.coord(), path = %path.display(), "writing tile");
            fs::write(&path, tile.data())?;
        }
        Ok(())
    }
}
