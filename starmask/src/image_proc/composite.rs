//! Alpha compositing of eroded variants into the output frame.
//!
//! Each bucket contributes an eroded copy of the original image, weighted
//! by a blurred version of its mask. Buckets blend one after another into a
//! running composite, so a later bucket overrides earlier ones where their
//! masks overlap.

use super::convolve::gaussian_blur;
use super::image::to_float;
use super::mask::{BucketMask, MASK_ON};
use super::morphology::erode;
use crate::error::{Result, StarmaskError};
use crate::image_size::ImageSize;
use log::debug;
use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;

/// Eroded variant of the original image ready to blend for one bucket.
///
/// Only built for buckets with a non-empty mask.
#[derive(Debug, Clone)]
pub struct BucketLayer {
    /// Structuring-element size
    pub size: usize,
    /// Original image eroded with a `size × size` element, as floats
    pub eroded: Array2<f64>,
    /// Per-pixel blend weight in `[0, 1]`
    pub alpha: Array2<f64>,
}

fn check_shape(expected: ImageSize, actual: ImageSize) -> Result<()> {
    if expected != actual {
        return Err(StarmaskError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Soft blend weights from a binary mask: Gaussian blur, scale by `1/255`,
/// clamp to `[0, 1]`.
pub fn alpha_from_mask(mask: &ArrayView2<u8>, blur_kernel_size: usize) -> Array2<f64> {
    let blurred = gaussian_blur(&to_float(mask).view(), blur_kernel_size);
    blurred.mapv(|v| (v / MASK_ON as f64).clamp(0.0, 1.0))
}

/// `alpha * eroded + (1 - alpha) * composite`, pixel by pixel
fn blend(composite: &ArrayView2<f64>, eroded: &ArrayView2<f64>, alpha: &ArrayView2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(composite.raw_dim());
    Zip::from(&mut out)
        .and(composite)
        .and(eroded)
        .and(alpha)
        .for_each(|o, &c, &e, &a| *o = a * e + (1.0 - a) * c);
    out
}

/// Blend one bucket's eroded image into the composite.
///
/// An all-zero mask leaves the composite untouched. The eroded image and
/// the mask must both match the composite in shape.
pub fn blend_bucket(
    composite: &ArrayView2<f64>,
    eroded: &ArrayView2<u8>,
    mask: &ArrayView2<u8>,
    blur_kernel_size: usize,
) -> Result<Array2<f64>> {
    let expected = ImageSize::of(composite);
    check_shape(expected, ImageSize::of(eroded))?;
    check_shape(expected, ImageSize::of(mask))?;

    if mask.iter().all(|&v| v == 0) {
        return Ok(composite.to_owned());
    }

    let alpha = alpha_from_mask(mask, blur_kernel_size);
    Ok(blend(composite, &to_float(eroded).view(), &alpha.view()))
}

/// Erode the original and build blend weights for one bucket.
///
/// Returns `Ok(None)` for an empty mask, so no eroded variant exists
/// without something to blend it through.
pub fn prepare_layer(
    original: &ArrayView2<u8>,
    bucket: &BucketMask,
    blur_kernel_size: usize,
) -> Result<Option<BucketLayer>> {
    check_shape(ImageSize::of(original), ImageSize::of(&bucket.mask))?;

    if bucket.is_empty() {
        debug!("Bucket {} has an empty mask, skipping", bucket.size);
        return Ok(None);
    }

    let eroded = erode(original, bucket.size);
    let alpha = alpha_from_mask(&bucket.mask.view(), blur_kernel_size);

    Ok(Some(BucketLayer {
        size: bucket.size,
        eroded: to_float(&eroded.view()),
        alpha,
    }))
}

/// Prepare layers for every bucket in parallel, keeping bucket order.
///
/// Empty buckets are dropped from the result.
pub fn prepare_layers(
    original: &ArrayView2<u8>,
    masks: &[BucketMask],
    blur_kernel_size: usize,
) -> Result<Vec<BucketLayer>> {
    let layers = masks
        .par_iter()
        .map(|bucket| prepare_layer(original, bucket, blur_kernel_size))
        .collect::<Result<Vec<_>>>()?;

    Ok(layers.into_iter().flatten().collect())
}

/// Fold every layer into a composite that starts as the original image.
///
/// Layers are applied strictly in the order given.
pub fn composite_layers(original: &ArrayView2<u8>, layers: &[BucketLayer]) -> Result<Array2<f64>> {
    let expected = ImageSize::of(original);
    let mut composite = to_float(original);

    for layer in layers {
        check_shape(expected, ImageSize::of(&layer.eroded))?;
        check_shape(expected, ImageSize::of(&layer.alpha))?;
        composite = blend(&composite.view(), &layer.eroded.view(), &layer.alpha.view());
        debug!("Blended bucket {}", layer.size);
    }

    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::mask::{draw_shape, MaskShape};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn masked(size: usize, image_size: ImageSize, cx: i64, cy: i64, radius: usize) -> BucketMask {
        let mut bucket = BucketMask::new(size, image_size);
        draw_shape(&mut bucket.mask, cx, cy, radius, MaskShape::Square);
        bucket
    }

    #[test]
    fn test_alpha_bounds() {
        let image_size = ImageSize::from_width_height(64, 64);
        let bucket = masked(3, image_size, 32, 32, 12);
        let alpha = alpha_from_mask(&bucket.mask.view(), 21);

        assert!(alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
        assert_relative_eq!(alpha[[32, 32]], 1.0, epsilon = 1e-9);
        // Beyond the blur support of the painted square
        assert_eq!(alpha[[0, 0]], 0.0);
        assert_eq!(alpha[[63, 63]], 0.0);
    }

    #[test]
    fn test_empty_mask_is_identity() {
        let composite = Array2::from_shape_fn((10, 12), |(r, c)| (r * 12 + c) as f64);
        let eroded = Array2::<u8>::zeros((10, 12));
        let mask = Array2::<u8>::zeros((10, 12));

        let out = blend_bucket(&composite.view(), &eroded.view(), &mask.view(), 21).unwrap();
        assert_eq!(out, composite);
    }

    #[test]
    fn test_full_mask_takes_eroded() {
        let composite = Array2::from_elem((30, 30), 200.0);
        let eroded = Array2::<u8>::from_elem((30, 30), 50);
        let mask = Array2::<u8>::from_elem((30, 30), MASK_ON);

        let out = blend_bucket(&composite.view(), &eroded.view(), &mask.view(), 21).unwrap();
        for &v in out.iter() {
            assert_relative_eq!(v, 50.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_blend_bucket_shape_mismatch() {
        let composite = Array2::<f64>::zeros((10, 10));
        let eroded = Array2::<u8>::zeros((10, 10));
        let mask = Array2::<u8>::zeros((10, 11));

        let err = blend_bucket(&composite.view(), &eroded.view(), &mask.view(), 21).unwrap_err();
        match err {
            StarmaskError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, ImageSize::from_width_height(10, 10));
                assert_eq!(actual, ImageSize::from_width_height(11, 10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prepare_layers_skips_empty_buckets() {
        let image_size = ImageSize::from_width_height(40, 40);
        let original = Array2::from_shape_fn((40, 40), |(r, c)| ((r * 7 + c * 3) % 256) as u8);
        let masks = vec![
            BucketMask::new(3, image_size),
            masked(5, image_size, 20, 20, 4),
            BucketMask::new(15, image_size),
        ];

        let layers = prepare_layers(&original.view(), &masks, 21).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].size, 5);
        assert_eq!(layers[0].eroded, to_float(&erode(&original.view(), 5).view()));
    }

    #[test]
    fn test_prepare_layer_rejects_mismatched_mask() {
        let original = Array2::<u8>::zeros((8, 8));
        let bucket = BucketMask::new(3, ImageSize::from_width_height(9, 8));
        assert!(matches!(
            prepare_layer(&original.view(), &bucket, 21),
            Err(StarmaskError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_later_layer_wins_on_overlap() {
        let image_size = ImageSize::from_width_height(50, 50);
        let original = Array2::<u8>::from_elem((50, 50), 100);
        let alpha = alpha_from_mask(&masked(3, image_size, 25, 25, 12).mask.view(), 21);

        let low = BucketLayer {
            size: 3,
            eroded: Array2::from_elem((50, 50), 10.0),
            alpha: alpha.clone(),
        };
        let high = BucketLayer {
            size: 15,
            eroded: Array2::from_elem((50, 50), 60.0),
            alpha,
        };

        let forward = composite_layers(&original.view(), &[low.clone(), high.clone()]).unwrap();
        let reverse = composite_layers(&original.view(), &[high, low]).unwrap();

        assert_relative_eq!(forward[[25, 25]], 60.0, epsilon = 1e-9);
        assert_relative_eq!(reverse[[25, 25]], 10.0, epsilon = 1e-9);
        assert_eq!(forward[[0, 0]], 100.0);
    }

    #[test]
    fn test_no_layers_returns_original() {
        let original = Array2::from_shape_fn((6, 9), |(r, c)| (r + c) as u8);
        let out = composite_layers(&original.view(), &[]).unwrap();
        assert_eq!(out, to_float(&original.view()));
    }
}
