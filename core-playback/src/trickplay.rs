//! # Trickplay Decoder
//!
//! Turns the server's tiled thumbnail sheets into individually addressable
//! seek previews.
//!
//! A sheet is a grid of `tile_width × tile_height` thumbnails per tile image.
//! Tiles are fetched in order and cropped row-major until `thumbnail_count`
//! frames exist. Thumbnail `i` covers `[i·interval, (i+1)·interval)`.
//!
//! Extraction is best-effort: a missing tile, a failed fetch or an
//! undecodable image stops the build, and whatever was decoded so far is
//! kept. Decoding runs on the blocking pool.

use crate::error::{PlaybackError, Result};
use bridge_traits::{TrickplaySheet, TrickplaySource};
use bytes::Bytes;
use core_async::task;
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Decoded previews for one item.
#[derive(Debug, Clone, Default)]
pub struct TrickplayImages {
    images: Vec<Arc<RgbaImage>>,
    interval_ms: u64,
}

impl TrickplayImages {
    pub fn new(images: Vec<Arc<RgbaImage>>, interval_ms: u64) -> Self {
        Self {
            images,
            interval_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Index of the preview covering `position_ms`, clamped to the last
    /// decoded frame. Total for any position once at least one frame exists.
    pub fn index_for_position(&self, position_ms: u64) -> Option<usize> {
        if self.images.is_empty() {
            return None;
        }
        if self.interval_ms == 0 {
            return Some(0);
        }
        let index = (position_ms / self.interval_ms).min(usize::MAX as u64) as usize;
        Some(index.min(self.images.len() - 1))
    }

    pub fn thumbnail_for_position(&self, position_ms: u64) -> Option<Arc<RgbaImage>> {
        self.index_for_position(position_ms)
            .and_then(|index| self.images.get(index).cloned())
    }
}

/// Look up the item's sheet and decode it. `None` when the server has no
/// previews for the item or the descriptor could not be fetched.
#[instrument(skip(source), fields(item_id = %item_id))]
pub async fn load(source: &dyn TrickplaySource, item_id: &str) -> Option<TrickplayImages> {
    let sheet = match source.trickplay_info(item_id).await {
        Ok(Some(sheet)) => sheet,
        Ok(None) => {
            debug!("No trickplay sheet for item");
            return None;
        }
        Err(err) => {
            warn!("Failed to fetch trickplay descriptor: {}", err);
            return None;
        }
    };
    Some(build(source, item_id, &sheet).await)
}

/// Fetch and slice every tile of `sheet`.
pub async fn build(
    source: &dyn TrickplaySource,
    item_id: &str,
    sheet: &TrickplaySheet,
) -> TrickplayImages {
    let target = sheet.thumbnail_count as usize;
    let mut images: Vec<Arc<RgbaImage>> = Vec::with_capacity(target);

    for tile_index in 0..sheet.tile_count() {
        let bytes = match source.get_tile(item_id, sheet.width, tile_index).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Trickplay tile {} missing; stopping early", tile_index);
                break;
            }
            Err(err) => {
                warn!("Failed to fetch trickplay tile {}: {}", tile_index, err);
                break;
            }
        };

        let remaining = target - images.len();
        let sheet = *sheet;
        let sliced = task::spawn_blocking(move || slice_tile(&bytes, &sheet, remaining)).await;

        match sliced {
            Ok(Ok(frames)) => {
                let complete = frames.len() == remaining.min(sheet.thumbnails_per_tile() as usize);
                images.extend(frames.into_iter().map(Arc::new));
                if !complete {
                    break;
                }
            }
            Ok(Err(err)) => {
                warn!("Failed to decode trickplay tile {}: {}", tile_index, err);
                break;
            }
            Err(err) => {
                warn!("Trickplay decode task failed: {}", err);
                break;
            }
        }

        if images.len() >= target {
            break;
        }
    }

    debug!(
        item_id = %item_id,
        "Decoded {} of {} trickplay thumbnails",
        images.len(),
        target
    );
    TrickplayImages::new(images, sheet.interval_ms)
}

/// Crop up to `limit` thumbnails out of one tile, row-major.
///
/// Stops at the first cell that does not fit inside the decoded image.
fn slice_tile(bytes: &Bytes, sheet: &TrickplaySheet, limit: usize) -> Result<Vec<RgbaImage>> {
    let tile = image::load_from_memory(bytes)
        .map_err(|e| PlaybackError::ImageDecode(format!("Failed to load tile: {}", e)))?;

    let mut frames = Vec::new();
    'rows: for row in 0..sheet.tile_height {
        for column in 0..sheet.tile_width {
            if frames.len() >= limit {
                break 'rows;
            }
            let cell = column
                .checked_mul(sheet.width)
                .zip(row.checked_mul(sheet.height))
                .filter(|&(x, y)| {
                    x.checked_add(sheet.width).is_some_and(|right| right <= tile.width())
                        && y.checked_add(sheet.height).is_some_and(|bottom| bottom <= tile.height())
                });
            let Some((x, y)) = cell else {
                break 'rows;
            };
            frames.push(tile.crop_imm(x, y, sheet.width, sheet.height).to_rgba8());
        }
    }
    Ok(frames)
}
