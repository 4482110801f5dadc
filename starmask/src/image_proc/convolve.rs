//! 2D convolution and Gaussian smoothing
//!
//! Provides the two filtering primitives the pipeline needs:
//!
//! - [`convolve2d`]: general dense 2D convolution, used by the matched-filter
//!   star detector
//! - [`gaussian_blur`]: separable Gaussian smoothing with a fixed square
//!   window, used to turn binary star masks into soft alpha maps
//!
//! Both keep the output the same size as the input ("same" mode). Samples
//! outside the frame are synthesized according to [`BorderMode`].

use ndarray::{Array1, Array2, ArrayView2, Zip};

/// How samples outside the image are synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderMode {
    /// Out-of-bounds samples are zero
    #[default]
    Zero,
    /// Mirror about the edge pixel without repeating it (`gfedcb|abcdefgh|gfedcba`)
    Reflect101,
}

/// Options for [`convolve2d`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvolveOptions {
    pub border: BorderMode,
}

/// Map a possibly out-of-range index into `0..len` by reflect-101 mirroring.
///
/// Any offset is folded, so kernels wider than the image are still handled.
pub fn reflect101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = index.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

/// Resolve a source index under the given border mode
#[inline]
fn resolve(index: isize, len: usize, border: BorderMode) -> Option<usize> {
    if index >= 0 && (index as usize) < len {
        return Some(index as usize);
    }
    match border {
        BorderMode::Zero => None,
        BorderMode::Reflect101 => Some(reflect101(index, len)),
    }
}

/// Convolve an image with a kernel, keeping the input size.
///
/// The kernel is centered at `(kh / 2, kw / 2)`; odd kernel dimensions give a
/// symmetric footprint.
///
/// # Arguments
/// * `image` - Input image
/// * `kernel` - Convolution kernel
/// * `options` - Border handling, defaults to [`BorderMode::Zero`]
pub fn convolve2d(
    image: &ArrayView2<f64>,
    kernel: &ArrayView2<f64>,
    options: Option<ConvolveOptions>,
) -> Array2<f64> {
    let border = options.unwrap_or_default().border;
    let (height, width) = image.dim();
    let (kh, kw) = kernel.dim();
    let (cy, cx) = ((kh / 2) as isize, (kw / 2) as isize);

    let mut output = Array2::<f64>::zeros((height, width));
    Zip::indexed(&mut output).par_for_each(|(y, x), out| {
        let mut acc = 0.0;
        for ((ky, kx), &weight) in kernel.indexed_iter() {
            if weight == 0.0 {
                continue;
            }
            // Convolution flips the kernel
            let sy = y as isize + cy - ky as isize;
            let sx = x as isize + cx - kx as isize;
            if let (Some(sy), Some(sx)) = (resolve(sy, height, border), resolve(sx, width, border))
            {
                acc += weight * image[[sy, sx]];
            }
        }
        *out = acc;
    });

    output
}

/// Standard deviation implied by a Gaussian window when none is given.
///
/// This is the conventional `0.3 * ((ksize - 1) / 2 - 1) + 0.8` rule, so a
/// 21-pixel window yields sigma = 3.5.
pub fn sigma_for_kernel_size(ksize: usize) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian kernel of `size` taps centered on `size / 2`.
pub fn gaussian_kernel_1d(size: usize, sigma: f64) -> Array1<f64> {
    let center = (size / 2) as f64;
    let two_sigma2 = 2.0 * sigma * sigma;
    let mut kernel = Array1::from_shape_fn(size, |i| {
        let d = i as f64 - center;
        (-(d * d) / two_sigma2).exp()
    });
    let sum = kernel.sum();
    kernel.mapv_inplace(|v| v / sum);
    kernel
}

/// Separable 1D pass along rows (`horizontal = true`) or columns
fn separable_pass(
    image: &ArrayView2<f64>,
    kernel: &Array1<f64>,
    horizontal: bool,
    border: BorderMode,
) -> Array2<f64> {
    let (height, width) = image.dim();
    let radius = (kernel.len() / 2) as isize;

    let mut output = Array2::<f64>::zeros((height, width));
    Zip::indexed(&mut output).par_for_each(|(y, x), out| {
        let mut acc = 0.0;
        for (k, &weight) in kernel.iter().enumerate() {
            let offset = k as isize - radius;
            let sample = if horizontal {
                resolve(x as isize + offset, width, border).map(|sx| image[[y, sx]])
            } else {
                resolve(y as isize + offset, height, border).map(|sy| image[[sy, x]])
            };
            if let Some(value) = sample {
                acc += weight * value;
            }
        }
        *out = acc;
    });

    output
}

/// Smooth an image with a `ksize` x `ksize` Gaussian window.
///
/// Sigma follows [`sigma_for_kernel_size`] and borders use
/// [`BorderMode::Reflect101`]. `ksize` is expected to be odd; callers
/// validate it.
pub fn gaussian_blur(image: &ArrayView2<f64>, ksize: usize) -> Array2<f64> {
    let kernel = gaussian_kernel_1d(ksize, sigma_for_kernel_size(ksize));
    let rows = separable_pass(image, &kernel, true, BorderMode::Reflect101);
    separable_pass(&rows.view(), &kernel, false, BorderMode::Reflect101)
}
