//! Magnitude to structuring-element size classification.

use log::debug;

/// Force a structuring element size odd by setting its low bit.
///
/// Even sizes move up to the next odd value; odd sizes are unchanged.
#[inline]
pub fn force_odd(size: usize) -> usize {
    size | 1
}

/// Maps source magnitudes onto the configured buckets.
///
/// Sources brighter than the cutoff get the largest bucket and nothing
/// else; every other source gets the default bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelClassifier {
    buckets: Vec<usize>,
    default_bucket: usize,
    largest_bucket: usize,
    bright_magnitude_cutoff: f64,
}

impl KernelClassifier {
    /// Build a classifier over already validated, odd bucket sizes.
    ///
    /// `buckets` must be non-empty and contain `default_bucket`; pipeline
    /// configuration validation guarantees both.
    pub(crate) fn new(buckets: Vec<usize>, default_bucket: usize, bright_magnitude_cutoff: f64) -> Self {
        let largest_bucket = buckets.iter().copied().max().unwrap_or(default_bucket);
        debug!(
            "Kernel classifier: buckets {buckets:?}, default {default_bucket}, bright (< {bright_magnitude_cutoff}) -> {largest_bucket}"
        );
        Self {
            buckets,
            default_bucket,
            largest_bucket,
            bright_magnitude_cutoff,
        }
    }

    /// Buckets in compositing order
    pub fn buckets(&self) -> &[usize] {
        &self.buckets
    }

    pub fn default_bucket(&self) -> usize {
        self.default_bucket
    }

    pub fn largest_bucket(&self) -> usize {
        self.largest_bucket
    }

    /// Bucket for a source of the given magnitude.
    ///
    /// Returns `None` for magnitudes that are not a number, which keeps such
    /// sources out of every mask.
    pub fn classify(&self, magnitude: f64) -> Option<usize> {
        if magnitude.is_nan() {
            None
        } else if magnitude < self.bright_magnitude_cutoff {
            Some(self.largest_bucket)
        } else {
            Some(self.default_bucket)
        }
    }
}
