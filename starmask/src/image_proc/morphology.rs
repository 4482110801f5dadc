//! Grayscale morphological erosion with flat square structuring elements.
//!
//! A square element is separable, so erosion runs as a horizontal minimum
//! filter followed by a vertical one. Samples outside the frame never win
//! the minimum, which matches treating the border as +infinity.

use ndarray::{Array2, ArrayView2, Axis, Zip};

/// Erode `image` with a flat `kernel_size` x `kernel_size` square.
///
/// Each output pixel is the minimum over the element's footprint, clipped to
/// the image. A kernel size of 1 returns a copy of the input.
///
/// # Panics
/// Panics if `kernel_size` is even or zero; pipeline configuration is
/// validated before erosion runs.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use starmask::image_proc::morphology::erode;
///
/// let image = array![[9u8, 9, 9], [9, 1, 9], [9, 9, 9]];
/// let eroded = erode(&image.view(), 3);
/// assert!(eroded.iter().all(|&v| v == 1));
/// ```
pub fn erode<T>(image: &ArrayView2<T>, kernel_size: usize) -> Array2<T>
where
    T: Copy + Ord + Send + Sync,
{
    assert!(
        kernel_size % 2 == 1,
        "structuring element size must be odd and positive, got {kernel_size}"
    );

    let radius = kernel_size / 2;
    let rows = min_filter_axis(image, Axis(1), radius);
    min_filter_axis(&rows.view(), Axis(0), radius)
}

/// Sliding minimum of half-width `radius` along one axis
fn min_filter_axis<T>(image: &ArrayView2<T>, axis: Axis, radius: usize) -> Array2<T>
where
    T: Copy + Ord + Send + Sync,
{
    let mut output = image.to_owned();
    if radius == 0 {
        return output;
    }

    Zip::from(output.lanes_mut(axis))
        .and(image.lanes(axis))
        .par_for_each(|mut out_lane, in_lane| {
            let len = in_lane.len();
            for i in 0..len {
                let lo = i.saturating_sub(radius);
                let hi = (i + radius).min(len - 1);
                let mut min = in_lane[lo];
                for j in lo + 1..=hi {
                    if in_lane[j] < min {
                        min = in_lane[j];
                    }
                }
                out_lane[i] = min;
            }
        });

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Direct (non-separable) reference implementation
    fn erode_reference(image: &Array2<u8>, kernel_size: usize) -> Array2<u8> {
        let (h, w) = image.dim();
        let r = (kernel_size / 2) as isize;
        Array2::from_shape_fn((h, w), |(y, x)| {
            let mut min = u8::MAX;
            for dy in -r..=r {
                for dx in -r..=r {
                    let sy = y as isize + dy;
                    let sx = x as isize + dx;
                    if sy >= 0 && sx >= 0 && (sy as usize) < h && (sx as usize) < w {
                        min = min.min(image[[sy as usize, sx as usize]]);
                    }
                }
            }
            min
        })
    }

    #[test]
    fn test_kernel_one_is_identity() {
        let image = array![[3u8, 1, 4], [1, 5, 9]];
        assert_eq!(erode(&image.view(), 1), image);
    }

    #[test]
    fn test_bright_spot_removed() {
        let mut image = Array2::from_elem((7, 7), 10u8);
        image[[3, 3]] = 250;
        image[[3, 4]] = 250;
        let eroded = erode(&image.view(), 3);
        assert!(eroded.iter().all(|&v| v == 10));
    }

    #[test]
    fn test_dark_pixel_spreads_by_radius() {
        let mut image = Array2::from_elem((9, 9), 200u8);
        image[[4, 4]] = 0;
        let eroded = erode(&image.view(), 5);
        for ((y, x), &v) in eroded.indexed_iter() {
            let inside = (2..=6).contains(&y) && (2..=6).contains(&x);
            assert_eq!(v, if inside { 0 } else { 200 }, "pixel ({y}, {x})");
        }
    }

    #[test]
    fn test_border_does_not_darken() {
        let image = Array2::from_elem((4, 6), 77u8);
        let eroded = erode(&image.view(), 15);
        assert!(eroded.iter().all(|&v| v == 77));
    }

    #[test]
    fn test_matches_reference_on_gradient() {
        let image = Array2::from_shape_fn((13, 17), |(y, x)| ((y * 31 + x * 17) % 251) as u8);
        for k in [3, 5, 15] {
            assert_eq!(erode(&image.view(), k), erode_reference(&image, k));
        }
    }

    #[test]
    #[should_panic(expected = "odd")]
    fn test_even_kernel_panics() {
        let image = Array2::from_elem((3, 3), 1u8);
        erode(&image.view(), 4);
    }
}
