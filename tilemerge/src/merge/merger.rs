//! Priority-ordered tile compositing.
//!
//! The merger walks a list of deferred per-source fetches for one target
//! address, front to back. Index 0 is the top layer. The walk decodes and
//! upscales as needed, stops at the first opaque layer, and flattens
//! whatever it collected with alpha-over blending. Sources behind an
//! opaque layer are never fetched at all.

use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

use crate::coord::{Coord, GridOrigin};
use crate::format::{self, TileFormatStrategy};
use crate::tile::{Tile, TileFetch, TILE_SIZE};

use super::error::MergeError;
use super::scaler;

/// One collected layer: decoded pixels plus the tile they came from.
///
/// The tile is kept so a single-layer merge can reuse its encoded payload
/// and so the front layer's format can drive a mixed format strategy.
struct MergeLayer {
    image: DynamicImage,
    tile: Tile,
}

impl MergeLayer {
    fn is_upscaled(&self, target: Coord) -> bool {
        self.tile.coord().zoom() < target.zoom()
    }
}

/// Composites tiles from prioritized sources into one output tile.
#[derive(Debug, Clone, Copy)]
pub struct TileMerger {
    origin: GridOrigin,
}

impl Default for TileMerger {
    fn default() -> Self {
        Self::new(GridOrigin::LowerLeft)
    }
}

impl TileMerger {
    /// Create a merger for a tile grid with the given row convention.
    ///
    /// The origin only affects which sub-block an upscale selects; layer
    /// ordering and blending are origin-independent.
    pub fn new(origin: GridOrigin) -> Self {
        Self { origin }
    }

    /// Merge the tiles produced by `fetches` into one tile at `target`.
    ///
    /// `fetches` is priority-ordered: index 0 is the top layer. The walk
    /// invokes each fetch lazily and stops as soon as a collected layer is
    /// opaque, so fetches behind it are never run.
    ///
    /// With `upload_only` set, index 0 stands for the write target and is
    /// skipped without being invoked; if exactly one fetch remains its
    /// tile passes through with only the format strategy applied, never
    /// touching a decoder.
    ///
    /// Returns `Ok(None)` when no source has usable data for the address.
    ///
    /// # Errors
    ///
    /// Returns `MergeError` if a fetch fails, a payload does not decode,
    /// a source hands back a tile deeper than the target zoom, or the
    /// result cannot be encoded.
    pub fn merge_tiles(
        &self,
        mut fetches: Vec<TileFetch<'_>>,
        target: Coord,
        strategy: TileFormatStrategy,
        upload_only: bool,
    ) -> Result<Option<Tile>, MergeError> {
        if upload_only && !fetches.is_empty() {
            // The front slot is the write target itself; never read it back
            drop(fetches.remove(0));
            if fetches.len() == 1 {
                return self.pass_through(fetches, target, strategy);
            }
        }

        let layers = self.collect_layers(fetches, target)?;
        self.flatten(layers, target, strategy)
    }

    /// Forward a lone source tile without decoding it.
    fn pass_through(
        &self,
        mut fetches: Vec<TileFetch<'_>>,
        target: Coord,
        strategy: TileFormatStrategy,
    ) -> Result<Option<Tile>, MergeError> {
        let Some(fetch) = fetches.pop() else {
            return Ok(None);
        };
        let Some(tile) = fetch()? else {
            return Ok(None);
        };
        if tile.coord().zoom() != target.zoom() {
            // An upscale substitution still has to go through the pixel path
            let layers = self.collect_layers(vec![Box::new(move || Ok(Some(tile)))], target)?;
            return self.flatten(layers, target, strategy);
        }
        let output = strategy.apply(tile.format());
        Ok(Some(tile.converted(output)?.at(target)))
    }

    /// Walk the fetches front to back, decoding and upscaling, until a
    /// layer fully occludes the rest.
    fn collect_layers(
        &self,
        fetches: Vec<TileFetch<'_>>,
        target: Coord,
    ) -> Result<Vec<MergeLayer>, MergeError> {
        let mut layers = Vec::new();
        for fetch in fetches {
            let Some(tile) = fetch()? else {
                continue;
            };
            let source_zoom = tile.coord().zoom();
            if source_zoom > target.zoom() {
                return Err(MergeError::DownscaleUnsupported {
                    source_zoom,
                    target_zoom: target.zoom(),
                });
            }

            let decoded = image::load_from_memory(tile.data())?;
            let image = if source_zoom < target.zoom() {
                match scaler::upscale_non_empty(&decoded, source_zoom, target, self.origin) {
                    Some(scaled) => scaled,
                    None => {
                        // Upscaled to nothing: same as the source having no tile
                        debug!(target = %target, source_zoom, "upscaled tile is empty, skipping");
                        continue;
                    }
                }
            } else {
                decoded
            };

            let opaque = scaler::is_opaque(&image);
            layers.push(MergeLayer { image, tile });
            if opaque {
                break;
            }
        }
        Ok(layers)
    }

    /// Flatten collected layers into an encoded tile.
    ///
    /// The front-most layer's format is the observed format fed to the
    /// strategy. A single unscaled layer keeps its original payload, so a
    /// source tile that already matches the output format passes through
    /// byte-identical.
    fn flatten(
        &self,
        mut layers: Vec<MergeLayer>,
        target: Coord,
        strategy: TileFormatStrategy,
    ) -> Result<Option<Tile>, MergeError> {
        let Some(front) = layers.first() else {
            return Ok(None);
        };
        let output = strategy.apply(front.tile.format());

        if layers.len() == 1 {
            let Some(layer) = layers.pop() else {
                return Ok(None);
            };
            if !layer.is_upscaled(target) {
                return Ok(Some(layer.tile.converted(output)?.at(target)));
            }
            let data = format::encode_image(&layer.image, output)?;
            return Ok(Some(Tile::with_format(target, data, output)));
        }

        // Paint back to front so the highest-priority layer lands on top
        let mut canvas = RgbaImage::new(TILE_SIZE, TILE_SIZE);
        for layer in layers.iter().rev() {
            let top = layer.image.to_rgba8();
            for (under, over) in canvas.pixels_mut().zip(top.pixels()) {
                *under = alpha_over(*over, *under);
            }
        }
        let data = format::encode_image(&DynamicImage::ImageRgba8(canvas), output)?;
        Ok(Some(Tile::with_format(target, data, output)))
    }
}

/// Straight-alpha source-over with round-half-up integer arithmetic.
///
/// A translucent pixel over an opaque one must come out at alpha 255
/// exactly, so the composite of opaque layers stays opaque and a later
/// pass can still short-circuit on it.
fn alpha_over(top: Rgba<u8>, bottom: Rgba<u8>) -> Rgba<u8> {
    let top_a = u32::from(top[3]);
    if top_a == 255 {
        return top;
    }
    if top_a == 0 {
        return bottom;
    }
    // Bottom weight after the top is applied, on a 255^2 scale
    let bottom_w = u32::from(bottom[3]) * (255 - top_a);
    // top_a > 0 here, so the denominator is never zero
    let denom = top_a * 255 + bottom_w;
    let channel = |t: u8, b: u8| -> u8 {
        let num = u32::from(t) * top_a * 255 + u32::from(b) * bottom_w;
        ((num + denom / 2) / denom) as u8
    };
    Rgba([
        channel(top[0], bottom[0]),
        channel(top[1], bottom[1]),
        channel(top[2], bottom[2]),
        ((denom + 127) / 255) as u8,
    ])
}
