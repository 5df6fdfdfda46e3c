//! Core tile address types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum zoom level accepted by the pipeline.
pub const MAX_ZOOM: u8 = 25;

/// Errors produced when constructing tile addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Zoom level exceeds [`MAX_ZOOM`].
    #[error("invalid zoom level {0} (max: {MAX_ZOOM})")]
    InvalidZoom(u8),

    /// X index is outside `[0, 2^zoom)`.
    #[error("x {x} out of range for zoom {zoom} (max: {max})")]
    XOutOfRange { x: u32, zoom: u8, max: u32 },

    /// Y index is outside `[0, 2^zoom)`.
    #[error("y {y} out of range for zoom {zoom} (max: {max})")]
    YOutOfRange { y: u32, zoom: u8, max: u32 },
}

/// Row convention of a tile grid.
///
/// The core pipeline addresses tiles in lower-left (TMS) convention.
/// Adapters whose backing store counts rows from the top flip on access
/// with [`Coord::flip_y`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridOrigin {
    /// Row 0 is the southernmost row ("LL", TMS).
    #[serde(rename = "LL")]
    LowerLeft,
    /// Row 0 is the northernmost row ("UL", XYZ).
    #[serde(rename = "UL")]
    UpperLeft,
}

impl fmt::Display for GridOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridOrigin::LowerLeft => write!(f, "LL"),
            GridOrigin::UpperLeft => write!(f, "UL"),
        }
    }
}

impl std::str::FromStr for GridOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LL" => Ok(GridOrigin::LowerLeft),
            "UL" => Ok(GridOrigin::UpperLeft),
            other => Err(format!("unknown grid origin: {}", other)),
        }
    }
}

/// Immutable tile address: zoom level plus x/y index within the grid.
///
/// Invariant: `x` and `y` are within `[0, 2^zoom)`. The invariant is
/// enforced by [`Coord::new`], the only way to construct a value.
///
/// # Example
///
/// ```
/// use tilemerge::coord::Coord;
///
/// let coord = Coord::new(3, 5, 2).unwrap();
/// assert_eq!(coord.zoom(), 3);
/// assert_eq!(coord.x(), 5);
/// assert_eq!(coord.y(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    zoom: u8,
    x: u32,
    y: u32,
}

impl Coord {
    /// Create a validated tile address.
    ///
    /// # Errors
    ///
    /// Returns `CoordError` if `zoom` exceeds [`MAX_ZOOM`] or either index
    /// falls outside `[0, 2^zoom)`.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let max = 1u32 << zoom;
        if x >= max {
            return Err(CoordError::XOutOfRange { x, zoom, max });
        }
        if y >= max {
            return Err(CoordError::YOutOfRange { y, zoom, max });
        }
        Ok(Self { zoom, x, y })
    }

    /// Construct without range checks.
    ///
    /// Only for callers that have already validated the full range, such
    /// as the bounds iterator.
    pub(crate) fn new_unchecked(zoom: u8, x: u32, y: u32) -> Self {
        debug_assert!(zoom <= MAX_ZOOM && x < (1u32 << zoom) && y < (1u32 << zoom));
        Self { zoom, x, y }
    }

    /// Get the zoom level.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Get the x index.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Get the y index.
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Flip the row convention: `y' = 2^zoom - 1 - y`.
    ///
    /// Applying the transform twice yields the original address.
    pub fn flip_y(&self) -> Self {
        let max = 1u32 << self.zoom;
        Self {
            zoom: self.zoom,
            x: self.x,
            y: max - 1 - self.y,
        }
    }

    /// Address of the parent tile one zoom level up.
    ///
    /// Returns `None` at zoom 0.
    pub fn parent(&self) -> Option<Self> {
        if self.zoom == 0 {
            return None;
        }
        Some(Self {
            zoom: self.zoom - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z: {}, x: {}, y: {}", self.zoom, self.x, self.y)
    }
}
