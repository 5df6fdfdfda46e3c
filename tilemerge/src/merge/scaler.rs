//! Nearest-neighbor tile upscaling.
//!
//! A lower-zoom tile covers `2^diff` target tiles per axis at a zoom
//! `diff` levels deeper. Upscaling cuts the sub-block of source pixels
//! that corresponds to one target address and magnifies it to a full
//! tile by pixel replication — no interpolation, so flat imagery stays
//! flat and category rasters keep exact values.
//!
//! Upscaling operates on decoded pixels only; it never changes the
//! encoded format.

use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel, RgbaImage};

use crate::coord::{Coord, GridOrigin};
use crate::tile::TILE_SIZE;

/// Enlarge a source tile's pixels to stand in for one target tile at a
/// deeper zoom.
///
/// `origin` is the row convention of the tile grid: under a lower-left
/// grid the vertical sub-tile index runs opposite to pixel rows and is
/// flipped; under an upper-left grid it is used as-is.
///
/// Channel count is preserved: an RGB source yields an RGB tile, an RGBA
/// source an RGBA tile. Working buffers are 8-bit sRGB.
///
/// # Panics
///
/// The caller must guarantee `target.zoom() > source_zoom`; violating the
/// contract is a bug, not a recoverable condition (the merger rejects
/// downscales before ever calling this).
pub fn upscale(
    source: &DynamicImage,
    source_zoom: u8,
    target: Coord,
    origin: GridOrigin,
) -> DynamicImage {
    assert!(
        target.zoom() > source_zoom,
        "upscale requires target zoom ({}) deeper than source zoom ({})",
        target.zoom(),
        source_zoom
    );
    let diff = target.zoom() - source_zoom;

    // At diff >= 8 one source pixel covers the whole target tile
    if u32::from(diff) >= TILE_SIZE.trailing_zeros() {
        let scale = 1u64 << diff;
        let sub_x = u64::from(target.x()) % scale;
        let sub_y = sub_tile_y(u64::from(target.y()) % scale, scale, origin);
        let pixel_x = (sub_x * u64::from(TILE_SIZE) / scale) as u32;
        let pixel_y = (sub_y * u64::from(TILE_SIZE) / scale) as u32;
        let pixel = source.get_pixel(pixel_x, pixel_y);
        return if source.color().has_alpha() {
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, pixel))
        } else {
            DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
                TILE_SIZE,
                TILE_SIZE,
                pixel.to_rgb(),
            ))
        };
    }

    let scale = 1u32 << diff; // 2..=128
    let step = TILE_SIZE / scale;
    let sub_x = target.x() % scale;
    let sub_y = sub_tile_y(u64::from(target.y()) % u64::from(scale), u64::from(scale), origin) as u32;
    let pixel_x = sub_x * step;
    let pixel_y = sub_y * step;

    if source.color().has_alpha() {
        let src = source.to_rgba8();
        DynamicImage::ImageRgba8(replicate(&src, pixel_x, pixel_y, step, scale))
    } else {
        let src = source.to_rgb8();
        DynamicImage::ImageRgb8(replicate(&src, pixel_x, pixel_y, step, scale))
    }
}

/// Like [`upscale`], but signals "no usable data" for a fully transparent
/// result so callers can treat it exactly like an absent tile.
///
/// The raw variant stays available for callers that want the transparent
/// tile itself.
pub fn upscale_non_empty(
    source: &DynamicImage,
    source_zoom: u8,
    target: Coord,
    origin: GridOrigin,
) -> Option<DynamicImage> {
    let scaled = upscale(source, source_zoom, target, origin);
    if is_fully_transparent(&scaled) {
        None
    } else {
        Some(scaled)
    }
}

/// Vertical sub-tile index, flipped under a lower-left grid because pixel
/// rows always count from the top.
fn sub_tile_y(y_mod_scale: u64, scale: u64, origin: GridOrigin) -> u64 {
    match origin {
        GridOrigin::LowerLeft => scale - 1 - y_mod_scale,
        GridOrigin::UpperLeft => y_mod_scale,
    }
}

/// Replicate each source pixel of the `step x step` window at
/// `(pixel_x, pixel_y)` into a `scale x scale` block of the output.
fn replicate<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    pixel_x: u32,
    pixel_y: u32,
    step: u32,
    scale: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut out = ImageBuffer::new(TILE_SIZE, TILE_SIZE);
    for sy in 0..step {
        for sx in 0..step {
            let pixel = *src.get_pixel(pixel_x + sx, pixel_y + sy);
            let out_x = sx * scale;
            let out_y = sy * scale;
            for dy in 0..scale {
                for dx in 0..scale {
                    out.put_pixel(out_x + dx, out_y + dy, pixel);
                }
            }
        }
    }
    out
}

/// Whether every pixel of the image is fully transparent.
///
/// An image without an alpha channel is never transparent.
pub fn is_fully_transparent(image: &DynamicImage) -> bool {
    if !image.color().has_alpha() {
        return false;
    }
    image.to_rgba8().pixels().all(|pixel| pixel.0[3] == 0)
}

/// Whether the image fully occludes anything drawn beneath it.
pub fn is_opaque(image: &DynamicImage) -> bool {
    if !image.color().has_alpha() {
        return true;
    }
    image.to_rgba8().pixels().all(|pixel| pixel.0[3] == u8::MAX)
}
