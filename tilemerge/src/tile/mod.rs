//! Tile values and deferred tile fetching.
//!
//! A [`Tile`] couples a validated address with an encoded image payload
//! and its detected format. Tiles are immutable: format conversion and
//! re-addressing produce new values. "Source has no tile here" is the
//! first-class value `Option<Tile>::None`, not an error.

use std::fmt;
use std::io::Cursor;

use bytes::Bytes;
use image::ImageReader;
use thiserror::Error;

use crate::coord::Coord;
use crate::format::{self, FormatError, TileFormat};
use crate::source::SourceError;

/// Edge length of every tile image, in pixels.
pub const TILE_SIZE: u32 = 256;

/// Errors produced when constructing or converting tiles.
#[derive(Debug, Error)]
pub enum TileError {
    /// The payload matches no known file signature.
    #[error("cannot create tile at {coord}: data is in unknown format")]
    UnknownFormat { coord: Coord },

    /// The encoded image does not decode to the required tile size.
    #[error("tile at {coord} is {width}x{height}, expected {TILE_SIZE}x{TILE_SIZE}")]
    InvalidDimensions {
        coord: Coord,
        width: u32,
        height: u32,
    },

    /// The payload header could not be read at all.
    #[error("cannot read tile image at {coord}: {source}")]
    UnreadableImage {
        coord: Coord,
        #[source]
        source: image::ImageError,
    },

    /// Format conversion failed.
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// A deferred per-source tile fetch for one fixed address.
///
/// The thunk is not invoked until the merge walk actually needs its value;
/// sources hidden behind an already-opaque layer are never fetched.
pub type TileFetch<'a> = Box<dyn FnOnce() -> Result<Option<Tile>, SourceError> + Send + 'a>;

/// An encoded 256x256 raster tile at a fixed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    coord: Coord,
    data: Bytes,
    format: TileFormat,
}

impl Tile {
    /// Create a tile, detecting the payload format and validating that the
    /// encoded image is exactly [`TILE_SIZE`] square.
    ///
    /// # Errors
    ///
    /// Returns `TileError` if the payload has no recognized signature, the
    /// image header cannot be read, or the dimensions are wrong.
    pub fn new(coord: Coord, data: impl Into<Bytes>) -> Result<Self, TileError> {
        let data = data.into();
        let format =
            TileFormat::detect(&data).ok_or(TileError::UnknownFormat { coord })?;
        let (width, height) = ImageReader::with_format(
            Cursor::new(data.as_ref()),
            match format {
                TileFormat::Png => image::ImageFormat::Png,
                TileFormat::Jpeg => image::ImageFormat::Jpeg,
            },
        )
        .into_dimensions()
        .map_err(|source| TileError::UnreadableImage { coord, source })?;
        if width != TILE_SIZE || height != TILE_SIZE {
            return Err(TileError::InvalidDimensions {
                coord,
                width,
                height,
            });
        }
        Ok(Self {
            coord,
            data,
            format,
        })
    }

    /// Create a tile from a payload whose format the caller has already
    /// established, skipping detection and dimension probing.
    ///
    /// Used by the merger and the scaler for payloads they encoded
    /// themselves.
    pub fn with_format(coord: Coord, data: impl Into<Bytes>, format: TileFormat) -> Self {
        let data = data.into();
        debug_assert_eq!(TileFormat::detect(&data), Some(format));
        Self {
            coord,
            data,
            format,
        }
    }

    /// Get the tile address.
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Get the encoded payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the encoded payload.
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Get the detected format.
    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// A tile with the same payload at a different address.
    pub fn at(&self, coord: Coord) -> Self {
        Self {
            coord,
            data: self.data.clone(),
            format: self.format,
        }
    }

    /// A tile converted to the target format.
    ///
    /// Byte-identical (payload shared, no re-encode) when the tile already
    /// declares the target format.
    pub fn converted(&self, target: TileFormat) -> Result<Self, TileError> {
        if self.format == target {
            return Ok(self.clone());
        }
        let data = format::convert(&self.data, target)?;
        Ok(Self {
            coord: self.coord,
            data: data.into(),
            format: target,
        })
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, format: {}, data size: {}",
            self.coord,
            self.format,
            self.data.len()
        )
    }
}
