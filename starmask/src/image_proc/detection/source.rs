//! Detected point sources and the detector seam.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// A detected point source.
///
/// Coordinates are in image space with `x` along columns and `y` along rows,
/// at sub-pixel precision. Lower magnitude means brighter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Centroid column
    pub x: f64,
    /// Centroid row
    pub y: f64,
    /// Instrumental magnitude
    pub magnitude: f64,
}

impl Source {
    pub fn new(x: f64, y: f64, magnitude: f64) -> Self {
        Self { x, y, magnitude }
    }

    /// True when both centroid coordinates are finite
    pub fn has_position(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Centroid rounded to the nearest pixel as (column, row).
    ///
    /// Only meaningful when [`Source::has_position`] holds; casts saturate.
    pub fn pixel(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }
}

/// Instrumental magnitude from a flux: `-2.5 * log10(flux)`.
///
/// Non-positive flux has no magnitude and yields +infinity (infinitely faint).
pub fn flux_to_magnitude(flux: f64) -> f64 {
    if flux > 0.0 {
        -2.5 * flux.log10()
    } else {
        f64::INFINITY
    }
}

/// A point-source finding algorithm.
///
/// Implementations receive a background-subtracted frame, the expected PSF
/// width and an absolute detection threshold above background. Returning an
/// empty vector means "no stars" and is not an error.
pub trait SourceDetector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Find point sources in `image`
    fn detect(
        &self,
        image: &ArrayView2<f64>,
        fwhm: f64,
        threshold: f64,
    ) -> Result<Vec<Source>, String>;
}

/// A detector that reports a fixed list of sources, ignoring the image.
///
/// Useful when positions come from a catalog or a previous run, and for
/// exercising the masking stages in isolation.
#[derive(Debug, Clone, Default)]
pub struct FixedSources {
    pub sources: Vec<Source>,
}

impl FixedSources {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }
}

impl SourceDetector for FixedSources {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(
        &self,
        _image: &ArrayView2<f64>,
        _fwhm: f64,
        _threshold: f64,
    ) -> Result<Vec<Source>, String> {
        Ok(self.sources.clone())
    }
}
