//! Per-bucket binary star masks.
//!
//! Every source paints a filled shape of fixed half-width into the mask of
//! the bucket it was classified into. Shapes from different sources simply
//! union, and anything falling outside the frame is clipped.

use super::detection::Source;
use crate::image_size::ImageSize;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Value of a set mask pixel
pub const MASK_ON: u8 = 255;

/// Shape painted around each source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskShape {
    /// Filled square of side `2R + 1`
    #[default]
    Square,
    /// Filled disk of pixels with `dx² + dy² <= R²`
    Circle,
}

/// Binary mask for one structuring-element size
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMask {
    /// Structuring-element size this mask selects for
    pub size: usize,
    /// `MASK_ON` inside painted shapes, 0 elsewhere
    pub mask: Array2<u8>,
}

impl BucketMask {
    pub fn new(size: usize, image_size: ImageSize) -> Self {
        Self {
            size,
            mask: image_size.zeros(),
        }
    }

    /// Number of set pixels
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&v| v != 0).count()
    }

    /// True when no pixel is set
    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|&v| v == 0)
    }
}

/// Paint a filled shape centered on `(cx, cy)` (column, row) into `mask`.
///
/// Parts outside the mask are clipped; a shape entirely outside draws
/// nothing.
pub fn draw_shape(mask: &mut Array2<u8>, cx: i64, cy: i64, radius: usize, shape: MaskShape) {
    let (height, width) = mask.dim();
    if height == 0 || width == 0 {
        return;
    }
    let r = radius as i64;

    let y0 = cy.saturating_sub(r).max(0);
    let y1 = cy.saturating_add(r).min(height as i64 - 1);
    let x0 = cx.saturating_sub(r).max(0);
    let x1 = cx.saturating_add(r).min(width as i64 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let inside = match shape {
                MaskShape::Square => true,
                MaskShape::Circle => {
                    let (dx, dy) = (x - cx, y - cy);
                    dx * dx + dy * dy <= r * r
                }
            };
            if inside {
                mask[[y as usize, x as usize]] = MASK_ON;
            }
        }
    }
}

/// Build one mask per bucket, in bucket order.
///
/// `assign` picks the bucket of each source; sources mapped to `None` or to
/// a size not in `buckets` are left out, as are sources without a finite
/// centroid. Buckets that receive no source still get an (all-zero) mask.
///
/// # Arguments
/// * `sources` - Detected sources
/// * `assign` - Source to bucket mapping
/// * `buckets` - Bucket sizes in compositing order
/// * `image_size` - Shape of every produced mask
/// * `radius` - Half-width `R` of each painted shape
/// * `shape` - Painted shape
pub fn rasterize<F>(
    sources: &[Source],
    assign: F,
    buckets: &[usize],
    image_size: ImageSize,
    radius: usize,
    shape: MaskShape,
) -> Vec<BucketMask>
where
    F: Fn(&Source) -> Option<usize>,
{
    let mut masks: Vec<BucketMask> = buckets
        .iter()
        .map(|&size| BucketMask::new(size, image_size))
        .collect();

    for source in sources.iter().filter(|s| s.has_position()) {
        let Some(bucket) = assign(source) else {
            continue;
        };
        let Some(target) = masks.iter_mut().find(|m| m.size == bucket) else {
            continue;
        };
        let (cx, cy) = source.pixel();
        draw_shape(&mut target.mask, cx, cy, radius, shape);
    }

    masks
}
