//! Rectangular tile ranges.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Coord, CoordError};

/// A rectangular range of tile addresses at one zoom level.
///
/// The range is half-open on the max side: a tile at `(x, y)` belongs to
/// the bounds when `min_x <= x < max_x` and `min_y <= y < max_y`. A
/// zero-size bounds is valid and simply yields no tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBounds {
    zoom: u8,
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
}

impl TileBounds {
    /// Create a validated bounds rectangle.
    ///
    /// # Errors
    ///
    /// Returns `CoordError` if the zoom is invalid, either min exceeds its
    /// max, or either max exceeds the grid width `2^zoom`.
    pub fn new(zoom: u8, min_x: u32, max_x: u32, min_y: u32, max_y: u32) -> Result<Self, CoordError> {
        if zoom > super::MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let grid = 1u32 << zoom;
        if min_x > max_x || max_x > grid {
            return Err(CoordError::XOutOfRange {
                x: max_x,
                zoom,
                max: grid,
            });
        }
        if min_y > max_y || max_y > grid {
            return Err(CoordError::YOutOfRange {
                y: max_y,
                zoom,
                max: grid,
            });
        }
        Ok(Self {
            zoom,
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Get the zoom level.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Get the inclusive minimum x index.
    pub fn min_x(&self) -> u32 {
        self.min_x
    }

    /// Get the exclusive maximum x index.
    pub fn max_x(&self) -> u32 {
        self.max_x
    }

    /// Get the inclusive minimum y index.
    pub fn min_y(&self) -> u32 {
        self.min_y
    }

    /// Get the exclusive maximum y index.
    pub fn max_y(&self) -> u32 {
        self.max_y
    }

    /// Number of tiles covered by the bounds, used for progress accounting.
    pub fn size(&self) -> u64 {
        u64::from(self.max_x - self.min_x) * u64::from(self.max_y - self.min_y)
    }

    /// Whether the bounds cover no tiles at all.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the coordinate falls inside the bounds.
    pub fn contains(&self, coord: Coord) -> bool {
        coord.zoom() == self.zoom
            && (self.min_x..self.max_x).contains(&coord.x())
            && (self.min_y..self.max_y).contains(&coord.y())
    }

    /// Iterate every coordinate in the bounds, x-major.
    ///
    /// The rectangle was validated at construction, so every yielded
    /// coordinate is in range.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        let zoom = self.zoom;
        let (min_y, max_y) = (self.min_y, self.max_y);
        (self.min_x..self.max_x)
            .flat_map(move |x| (min_y..max_y).map(move |y| Coord::new_unchecked(zoom, x, y)))
    }
}

impl fmt::Display for TileBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zoom: {}, x: [{}, {}), y: [{}, {})",
            self.zoom, self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

/// Parse `"z,minx,maxx,miny,maxy"` as produced by the CLI.
impl std::str::FromStr for TileBounds {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 5 {
            return Err(format!(
                "expected z,minx,maxx,miny,maxy but got {} fields",
                parts.len()
            ));
        }
        let zoom: u8 = parts[0].parse().map_err(|_| format!("bad zoom: {}", parts[0]))?;
        let mut nums = [0u32; 4];
        for (i, part) in parts[1..].iter().enumerate() {
            nums[i] = part.parse().map_err(|_| format!("bad bound: {}", part))?;
        }
        TileBounds::new(zoom, nums[0], nums[1], nums[2], nums[3]).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        let bounds = TileBounds::new(10, 2, 6, 1, 4).unwrap();
        assert_eq!(bounds.size(), 12);
        assert!(!bounds.is_empty());
    }

    #[test]
    fn test_zero_size_is_valid() {
        let bounds = TileBounds::new(10, 5, 5, 1, 4).unwrap();
        assert_eq!(bounds.size(), 0);
        assert!(bounds.is_empty());
        assert_eq!(bounds.coords().count(), 0);
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(TileBounds::new(10, 6, 2, 1, 4).is_err());
        assert!(TileBounds::new(10, 2, 6, 4, 1).is_err());
    }

    #[test]
    fn test_rejects_range_beyond_grid() {
        // At zoom 2 the grid is 4 wide, max bound 4 is allowed (half-open),
        // 5 is not.
        assert!(TileBounds::new(2, 0, 4, 0, 4).is_ok());
        assert!(TileBounds::new(2, 0, 5, 0, 4).is_err());
    }

    #[test]
    fn test_contains() {
        let bounds = TileBounds::new(5, 2, 6, 1, 4).unwrap();
        assert!(bounds.contains(Coord::new(5, 2, 1).unwrap()));
        assert!(bounds.contains(Coord::new(5, 5, 3).unwrap()));
        // Max side is exclusive
        assert!(!bounds.contains(Coord::new(5, 6, 3).unwrap()));
        assert!(!bounds.contains(Coord::new(5, 5, 4).unwrap()));
        // Different zoom never matches
        assert!(!bounds.contains(Coord::new(6, 2, 1).unwrap()));
    }

    #[test]
    fn test_coords_iteration_is_x_major() {
        let bounds = TileBounds::new(4, 1, 3, 5, 7).unwrap();
        let coords: Vec<(u32, u32)> = bounds.coords().map(|c| (c.x(), c.y())).collect();
        assert_eq!(coords, vec![(1, 5), (1, 6), (2, 5), (2, 6)]);
    }

    #[test]
    fn test_coords_count_matches_size() {
        let bounds = TileBounds::new(8, 10, 20, 30, 35).unwrap();
        assert_eq!(bounds.coords().count() as u64, bounds.size());
    }

    #[test]
    fn test_from_str_round_trip() {
        let bounds: TileBounds = "7, 3, 9, 0, 128".parse().unwrap();
        assert_eq!(bounds, TileBounds::new(7, 3, 9, 0, 128).unwrap());
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("7,3,9,0".parse::<TileBounds>().is_err());
        assert!("a,b,c,d,e".parse::<TileBounds>().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let bounds = TileBounds::new(12, 100, 200, 300, 400).unwrap();
        let json = serde_json::to_string(&bounds).unwrap();
        let parsed: TileBounds = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bounds);
    }
}
