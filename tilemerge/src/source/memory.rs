//! In-memory tile store.
//!
//! Backs small jobs and most of the test suite. Tiles are keyed by their
//! stored address; like the filesystem adapter, an upper-left store flips
//! rows on access.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::coord::{Coord, GridOrigin};
use crate::tile::Tile;

use super::{Source, SourceError};

/// A map-backed tile source.
pub struct MemorySource {
    path: String,
    origin: GridOrigin,
    tiles: RwLock<HashMap<Coord, Tile>>,
}

impl MemorySource {
    pub fn new(path: impl Into<String>, origin: GridOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
            tiles: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tiles currently stored.
    pub fn len(&self) -> usize {
        self.tiles.read().len()
    }

    /// Whether the store holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.tiles.read().is_empty()
    }

    fn storage_coord(&self, coord: Coord) -> Coord {
        match self.origin {
            GridOrigin::LowerLeft => coord,
            GridOrigin::UpperLeft => coord.flip_y(),
        }
    }
}

impl Source for MemorySource {
    fn path(&self) -> &str {
        &self.path
    }

    fn tile_exists(&self, coord: Coord) -> Result<bool, SourceError> {
        Ok(self.tiles.read().contains_key(&self.storage_coord(coord)))
    }

    fn get_tile(&self, coord: Coord) -> Result<Option<Tile>, SourceError> {
        let stored = self.storage_coord(coord);
        Ok(self.tiles.read().get(&stored).map(|tile| tile.at(coord)))
    }

    fn write_tiles(&self, tiles: &[Tile]) -> Result<(), SourceError> {
        let mut map = self.tiles.write();
        for tile in tiles {
            let stored = self.storage_coord(tile.coord());
            map.insert(stored, tile.at(stored));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{encode_image, TileFormat};
    use image::{DynamicImage, RgbaImage};

    fn payload() -> Vec<u8> {
        let image = RgbaImage::from_pixel(256, 256, image::Rgba([1, 1, 1, 255]));
        encode_image(&DynamicImage::ImageRgba8(image), TileFormat::Png).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let source = MemorySource::new("mem", GridOrigin::LowerLeft);
        let coord = Coord::new(3, 1, 2).unwrap();
        source
            .write_tiles(&[Tile::new(coord, payload()).unwrap()])
            .unwrap();

        assert!(source.tile_exists(coord).unwrap());
        assert_eq!(source.len(), 1);
        let read = source.get_tile(coord).unwrap().unwrap();
        assert_eq!(read.coord(), coord);
    }

    #[test]
    fn test_upper_left_store_flips_rows() {
        let source = MemorySource::new("mem", GridOrigin::UpperLeft);
        let coord = Coord::new(2, 0, 0).unwrap();
        source
            .write_tiles(&[Tile::new(coord, payload()).unwrap()])
            .unwrap();

        // The flipped row is what a lower-left view of the same store sees
        let read = source.get_tile(coord).unwrap().unwrap();
        assert_eq!(read.coord(), coord);
        let mirror = MemorySource::new("mem", GridOrigin::LowerLeft);
        mirror
            .write_tiles(&[Tile::new(coord.flip_y(), payload()).unwrap()])
            .unwrap();
        assert!(mirror.tile_exists(coord.flip_y()).unwrap());
    }

    #[test]
    fn test_missing_tile_is_none() {
        let source = MemorySource::new("mem", GridOrigin::LowerLeft);
        assert!(source.get_tile(Coord::new(1, 0, 0).unwrap()).unwrap().is_none());
        assert!(source.is_empty());
    }

    #[test]
    fn test_overwrite_replaces_tile() {
        let source = MemorySource::new("mem", GridOrigin::LowerLeft);
        let coord = Coord::new(3, 1, 2).unwrap();
        let first = Tile::new(coord, payload()).unwrap();
        source.write_tiles(std::slice::from_ref(&first)).unwrap();
        source.write_tiles(&[first.clone()]).unwrap();
        assert_eq!(source.len(), 1);
    }
}
