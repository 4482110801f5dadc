//! Sigma-clipped background statistics
//!
//! Estimates the sky level and noise scale of a frame while rejecting the
//! bright outliers (stars, hot pixels) that would otherwise bias a plain
//! mean/std. Samples are clipped iteratively around the running mean until
//! the sample set stops shrinking or [`MAX_CLIP_ITERATIONS`] is reached.
//!
//! NaN and infinite samples are treated as "no data" and never participate.

use ndarray::ArrayView2;
use thiserror::Error;

/// Upper bound on clipping passes
pub const MAX_CLIP_ITERATIONS: usize = 5;

/// Fewest surviving samples for which statistics are reported
pub const MIN_VALID_SAMPLES: usize = 3;

/// Error types for background estimation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Only {remaining} valid samples remain, need at least {required}")]
    InsufficientData { remaining: usize, required: usize },
    #[error("Sigma must be positive and finite, got {0}")]
    InvalidSigma(f64),
}

/// Robust background statistics of a frame
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BackgroundStats {
    /// Clipped mean
    pub mean: f64,
    /// Clipped median
    pub median: f64,
    /// Clipped population standard deviation
    pub std_dev: f64,
    /// Number of samples that survived clipping
    pub samples: usize,
}

/// Mean and population standard deviation of a slice (non-empty)
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Median of a sorted, non-empty slice
fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Compute sigma-clipped mean, median and standard deviation.
///
/// # Arguments
/// * `image` - Floating point frame; non-finite samples are ignored
/// * `sigma` - Clip threshold in units of the running standard deviation
///
/// # Returns
/// * `Ok(BackgroundStats)` on success
/// * `Err(StatsError::InsufficientData)` if fewer than [`MIN_VALID_SAMPLES`]
///   finite samples remain after clipping
///
/// # Examples
/// ```
/// use ndarray::Array2;
/// use starmask::image_proc::stats::sigma_clipped_stats;
///
/// let mut frame = Array2::from_elem((10, 10), 100.0);
/// frame[[5, 5]] = 10_000.0;
/// let stats = sigma_clipped_stats(&frame.view(), 3.0).unwrap();
/// assert_eq!(stats.median, 100.0);
/// assert_eq!(stats.mean, 100.0);
/// ```
pub fn sigma_clipped_stats(
    image: &ArrayView2<f64>,
    sigma: f64,
) -> Result<BackgroundStats, StatsError> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(StatsError::InvalidSigma(sigma));
    }

    let mut samples: Vec<f64> = image.iter().copied().filter(|v| v.is_finite()).collect();
    let insufficient = |remaining: usize| StatsError::InsufficientData {
        remaining,
        required: MIN_VALID_SAMPLES,
    };

    if samples.len() < MIN_VALID_SAMPLES {
        return Err(insufficient(samples.len()));
    }

    for _ in 0..MAX_CLIP_ITERATIONS {
        let (mean, std_dev) = mean_std(&samples);
        let limit = sigma * std_dev;
        let before = samples.len();
        samples.retain(|&v| (v - mean).abs() <= limit);

        if samples.len() < MIN_VALID_SAMPLES {
            return Err(insufficient(samples.len()));
        }
        if samples.len() == before {
            break;
        }
    }

    let (mean, std_dev) = mean_std(&samples);
    samples.sort_by(|a, b| a.total_cmp(b));
    let median = median_of_sorted(&samples);

    Ok(BackgroundStats {
        mean,
        median,
        std_dev,
        samples: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_known_values_without_outliers() {
        // Mean = 5, population variance = 4
        let data = array![[2.0, 4.0, 4.0, 4.0], [5.0, 5.0, 7.0, 9.0]];
        let stats = sigma_clipped_stats(&data.view(), 3.0).unwrap();

        assert_relative_eq!(stats.mean, 5.0, epsilon = 1e-12);
        assert_relative_eq!(stats.std_dev, 2.0, epsilon = 1e-12);
        assert_relative_eq!(stats.median, 4.5, epsilon = 1e-12);
        assert_eq!(stats.samples, 8);
    }

    #[test]
    fn test_bright_outlier_is_clipped() {
        let mut frame = Array2::from_shape_fn((20, 20), |(y, x)| 100.0 + ((x + y) % 3) as f64);
        frame[[10, 10]] = 50_000.0;
        frame[[3, 4]] = 60_000.0;

        let stats = sigma_clipped_stats(&frame.view(), 3.0).unwrap();
        assert!(stats.mean < 102.0);
        assert!(stats.std_dev < 1.0);
        assert_eq!(stats.samples, 398);
    }

    #[test]
    fn test_nan_is_no_data() {
        let data = array![[1.0, f64::NAN, 3.0], [f64::INFINITY, 2.0, f64::NAN]];
        let stats = sigma_clipped_stats(&data.view(), 3.0).unwrap();
        assert_eq!(stats.samples, 3);
        assert_relative_eq!(stats.mean, 2.0);
        assert_relative_eq!(stats.median, 2.0);
    }

    #[test]
    fn test_insufficient_data() {
        let data = array![[1.0, f64::NAN], [f64::NAN, 2.0]];
        assert_eq!(
            sigma_clipped_stats(&data.view(), 3.0),
            Err(StatsError::InsufficientData {
                remaining: 2,
                required: MIN_VALID_SAMPLES
            })
        );
    }

    #[test]
    fn test_all_nan() {
        let data = Array2::from_elem((4, 4), f64::NAN);
        assert!(matches!(
            sigma_clipped_stats(&data.view(), 3.0),
            Err(StatsError::InsufficientData { remaining: 0, .. })
        ));
    }

    #[test]
    fn test_constant_image_has_zero_spread() {
        let data = Array2::from_elem((5, 5), 7.0);
        let stats = sigma_clipped_stats(&data.view(), 3.0).unwrap();
        assert_eq!(stats.mean, 7.0);
        assert_eq!(stats.median, 7.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.samples, 25);
    }

    #[test]
    fn test_invalid_sigma() {
        let data = Array2::from_elem((5, 5), 7.0);
        assert_eq!(
            sigma_clipped_stats(&data.view(), 0.0),
            Err(StatsError::InvalidSigma(0.0))
        );
        assert!(sigma_clipped_stats(&data.view(), f64::NAN).is_err());
    }
}
