//! Before/after comparison views

use crate::error::{Result, StarmaskError};
use crate::image_size::ImageSize;
use ndarray::{s, Array2, ArrayView2, Zip};

fn same_shape(a: &ArrayView2<u8>, b: &ArrayView2<u8>) -> Result<()> {
    let expected = ImageSize::of(a);
    let actual = ImageSize::of(b);
    if expected != actual {
        return Err(StarmaskError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Side-by-side view: columns left of `column` come from `original`, the
/// rest from `processed`.
///
/// `column` is clamped to the image width, so `0` shows only the processed
/// frame and anything past the right edge only the original.
pub fn split_view(
    original: &ArrayView2<u8>,
    processed: &ArrayView2<u8>,
    column: usize,
) -> Result<Array2<u8>> {
    same_shape(original, processed)?;

    let column = column.min(original.ncols());
    let mut out = processed.to_owned();
    out.slice_mut(s![.., ..column])
        .assign(&original.slice(s![.., ..column]));
    Ok(out)
}

/// Per-pixel `|original - processed|`
pub fn abs_difference(original: &ArrayView2<u8>, processed: &ArrayView2<u8>) -> Result<Array2<u8>> {
    same_shape(original, processed)?;

    let mut out = Array2::<u8>::zeros(original.raw_dim());
    Zip::from(&mut out)
        .and(original)
        .and(processed)
        .for_each(|o, &a, &b| *o = a.abs_diff(b));
    Ok(out)
}

/// Alternating original/processed frames for blink comparison.
///
/// Yields `frames` views starting with the original.
pub fn blink_frames<'a>(
    original: ArrayView2<'a, u8>,
    processed: ArrayView2<'a, u8>,
    frames: usize,
) -> Result<Vec<ArrayView2<'a, u8>>> {
    same_shape(&original, &processed)?;

    Ok((0..frames)
        .map(|i| if i % 2 == 0 { original } else { processed })
        .collect())
}
