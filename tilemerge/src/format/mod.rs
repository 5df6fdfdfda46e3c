//! Tile image format detection, conversion, and output strategy.
//!
//! Formats are classified from the leading bytes of the encoded payload,
//! never from file names. Conversion is a byte-identical pass-through when
//! the payload is already in the requested format; only a real format
//! change decodes and re-encodes. A re-encode writes pixel data only, so
//! no metadata (timestamps included) survives it.

use std::fmt;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// JPEG SOI + marker prefix shared by all recognized JPEG variants.
const JPEG_PREFIX: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Fourth bytes of the JFIF/quantization/SPIFF JPEG variants.
const JPEG_MARKERS: [u8; 3] = [0xDB, 0xE0, 0xEE];

/// APP1 marker byte of the EXIF-tagged JPEG variant.
const JPEG_EXIF_MARKER: u8 = 0xE1;

/// "Exif\0\0" tag that must follow the APP1 segment length.
const JPEG_EXIF_TAG: [u8; 6] = [0x45, 0x78, 0x69, 0x66, 0x00, 0x00];

/// Quality used when a conversion has to re-encode to JPEG.
const JPEG_QUALITY: u8 = 90;

/// Errors produced by format conversion.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The payload matches no known signature, so it cannot be decoded.
    #[error("cannot convert tile data in unknown format")]
    UnknownSourceFormat,

    /// Decoding or re-encoding the image failed.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Encoded tile image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    Png,
    Jpeg,
}

impl TileFormat {
    /// Classify an encoded payload by its file signature.
    ///
    /// Returns `None` (not an error) for unrecognized or too-short input.
    ///
    /// Recognized signatures:
    /// - PNG: `89 50 4E 47 0D 0A 1A 0A`
    /// - JPEG: `FF D8 FF` followed by `DB`, `E0` or `EE`
    /// - JPEG (EXIF): `FF D8 FF E1 ?? ?? 45 78 69 66 00 00`
    pub fn detect(data: &[u8]) -> Option<TileFormat> {
        if data.len() >= PNG_SIGNATURE.len() && data[..PNG_SIGNATURE.len()] == PNG_SIGNATURE {
            return Some(TileFormat::Png);
        }
        if data.len() >= 4 && data[..3] == JPEG_PREFIX {
            if JPEG_MARKERS.contains(&data[3]) {
                return Some(TileFormat::Jpeg);
            }
            // EXIF-tagged variant: two length bytes, then "Exif\0\0"
            if data[3] == JPEG_EXIF_MARKER && data.len() >= 12 && data[6..12] == JPEG_EXIF_TAG {
                return Some(TileFormat::Jpeg);
            }
        }
        None
    }

    /// File extension used by filesystem adapters.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileFormat::Png => write!(f, "png"),
            TileFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

impl std::str::FromStr for TileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(TileFormat::Png),
            "jpeg" | "jpg" => Ok(TileFormat::Jpeg),
            other => Err(format!("unknown tile format: {}", other)),
        }
    }
}

/// Convert an encoded payload to the target format.
///
/// When the payload is already in the target format the input is returned
/// unchanged, byte for byte. Otherwise the image is decoded and re-encoded;
/// JPEG output has no alpha channel, so transparency is dropped on a
/// PNG-to-JPEG conversion.
///
/// # Errors
///
/// Returns `FormatError` if the payload has no recognized signature or the
/// decode/encode fails.
pub fn convert(data: &[u8], target: TileFormat) -> Result<Vec<u8>, FormatError> {
    match TileFormat::detect(data) {
        Some(observed) if observed == target => Ok(data.to_vec()),
        Some(_) => {
            let image = image::load_from_memory(data)?;
            encode_image(&image, target)
        }
        None => Err(FormatError::UnknownSourceFormat),
    }
}

/// Encode decoded pixels into the given format.
///
/// The output carries pixel data only; no metadata is written.
pub fn encode_image(image: &DynamicImage, format: TileFormat) -> Result<Vec<u8>, FormatError> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        TileFormat::Png => {
            image.write_to(&mut buf, ImageFormat::Png)?;
        }
        TileFormat::Jpeg => {
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            // JPEG cannot carry alpha
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
    }
    Ok(buf.into_inner())
}

/// Policy for choosing the output format of a merged tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStrategy {
    /// Always force the configured format.
    Fixed,
    /// Preserve whatever format a tile already declares.
    Mixed,
}

impl fmt::Display for FormatStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatStrategy::Fixed => write!(f, "fixed"),
            FormatStrategy::Mixed => write!(f, "mixed"),
        }
    }
}

impl std::str::FromStr for FormatStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(FormatStrategy::Fixed),
            "mixed" => Ok(FormatStrategy::Mixed),
            other => Err(format!("unknown format strategy: {}", other)),
        }
    }
}

/// A target format paired with the policy that decides when to apply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileFormatStrategy {
    format: TileFormat,
    strategy: FormatStrategy,
}

impl TileFormatStrategy {
    pub fn new(format: TileFormat, strategy: FormatStrategy) -> Self {
        Self { format, strategy }
    }

    /// A strategy that always forces the given format.
    pub fn fixed(format: TileFormat) -> Self {
        Self::new(format, FormatStrategy::Fixed)
    }

    /// Get the configured format.
    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Get the policy.
    pub fn strategy(&self) -> FormatStrategy {
        self.strategy
    }

    /// The format a tile with the observed format should be converted to.
    pub fn apply(&self, observed: TileFormat) -> TileFormat {
        match self.strategy {
            FormatStrategy::Fixed => self.format,
            FormatStrategy::Mixed => observed,
        }
    }
}
