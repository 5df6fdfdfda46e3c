//! Tile addressing module
//!
//! Provides the immutable tile address (`Coord`), the grid origin
//! convention used by a tile store (`GridOrigin`), and the half-open
//! rectangular tile range a batch walks (`TileBounds`).

mod bounds;
mod types;

pub use bounds::TileBounds;
pub use types::{Coord, CoordError, GridOrigin, MAX_ZOOM};
