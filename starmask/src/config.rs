//! Pipeline configuration
//!
//! A plain value passed into every call. Serialized as JSON with every field
//! optional, so a partial file only overrides what it names.

use crate::error::{Result, StarmaskError};
use crate::image_proc::classify::{force_odd, KernelClassifier};
use crate::image_proc::mask::MaskShape;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the detection threshold is derived.
///
/// Serialized externally tagged, e.g. `{ "sigma": 0.7 }` or
/// `{ "absolute": 12.0 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionThreshold {
    /// Multiple of the clipped background standard deviation
    Sigma(f64),
    /// Fixed level above the background median
    Absolute(f64),
}

impl DetectionThreshold {
    /// Effective threshold above background for a given background std dev
    pub fn resolve(&self, background_std: f64) -> f64 {
        match *self {
            DetectionThreshold::Sigma(k) => k * background_std,
            DetectionThreshold::Absolute(t) => t,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            DetectionThreshold::Sigma(v) | DetectionThreshold::Absolute(v) => v,
        }
    }
}

impl Default for DetectionThreshold {
    fn default() -> Self {
        DetectionThreshold::Sigma(0.7)
    }
}

/// Tunables for a single pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Clipping threshold for background statistics, in standard deviations
    pub sigma_clip: f64,
    /// Expected PSF full width at half maximum in pixels
    pub psf_fwhm: f64,
    pub threshold: DetectionThreshold,
    /// Half-width R of the shape drawn around each source
    pub star_radius: usize,
    pub mask_shape: MaskShape,
    /// Structuring-element sizes in compositing order
    pub buckets: Vec<usize>,
    /// Bucket for sources that are not bright; smallest bucket when unset
    pub default_bucket: Option<usize>,
    /// Sources with magnitude below this go to the largest bucket
    pub bright_magnitude_cutoff: f64,
    /// Gaussian window used to soften masks
    pub blur_kernel_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sigma_clip: 3.0,
            psf_fwhm: 2.0,
            threshold: DetectionThreshold::default(),
            star_radius: 6,
            mask_shape: MaskShape::Square,
            buckets: vec![3, 15],
            default_bucket: None,
            bright_magnitude_cutoff: -5.0,
            blur_kernel_size: 21,
        }
    }
}

fn invalid(msg: impl Into<String>) -> StarmaskError {
    StarmaskError::InvalidConfiguration(msg.into())
}

impl PipelineConfig {
    /// Check every field and build the bucket classifier.
    ///
    /// Bucket sizes (and the default bucket) are forced odd before the
    /// duplicate and membership checks, so `[4, 5]` is rejected.
    pub fn validate(&self) -> Result<KernelClassifier> {
        if !(self.sigma_clip.is_finite() && self.sigma_clip > 0.0) {
            return Err(invalid(format!(
                "sigma_clip must be positive and finite, got {}",
                self.sigma_clip
            )));
        }
        if !(self.psf_fwhm.is_finite() && self.psf_fwhm > 0.0) {
            return Err(invalid(format!(
                "psf_fwhm must be positive and finite, got {}",
                self.psf_fwhm
            )));
        }
        let t = self.threshold.value();
        if !(t.is_finite() && t >= 0.0) {
            return Err(invalid(format!(
                "threshold must be non-negative and finite, got {t}"
            )));
        }
        if self.bright_magnitude_cutoff.is_nan() {
            return Err(invalid("bright_magnitude_cutoff must be a number"));
        }
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(invalid(format!(
                "blur_kernel_size must be odd and positive, got {}",
                self.blur_kernel_size
            )));
        }

        if self.buckets.is_empty() {
            return Err(invalid("at least one bucket is required"));
        }
        if self.buckets.contains(&0) {
            return Err(invalid("bucket sizes must be positive"));
        }

        let buckets: Vec<usize> = self.buckets.iter().map(|&b| force_odd(b)).collect();
        for (i, b) in buckets.iter().enumerate() {
            if buckets[..i].contains(b) {
                return Err(invalid(format!(
                    "bucket {b} appears more than once after forcing odd sizes ({:?})",
                    self.buckets
                )));
            }
        }

        let default_bucket = match self.default_bucket {
            Some(0) => return Err(invalid("default_bucket must be positive")),
            Some(b) => force_odd(b),
            None => buckets.iter().copied().min().unwrap_or(1),
        };
        if !buckets.contains(&default_bucket) {
            return Err(invalid(format!(
                "default_bucket {default_bucket} is not one of the buckets {buckets:?}"
            )));
        }

        Ok(KernelClassifier::new(
            buckets,
            default_bucket,
            self.bright_magnitude_cutoff,
        ))
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn assert_invalid(config: PipelineConfig) {
        match config.validate() {
            Err(StarmaskError::InvalidConfiguration(_)) => {}
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_validate() {
        let classifier = PipelineConfig::default().validate().unwrap();
        assert_eq!(classifier.buckets(), &[3, 15]);
        assert_eq!(classifier.default_bucket(), 3);
        assert_eq!(classifier.largest_bucket(), 15);
    }

    #[test]
    fn test_buckets_forced_odd_in_order() {
        let config = PipelineConfig {
            buckets: vec![14, 2, 7],
            default_bucket: Some(6),
            ..Default::default()
        };
        let classifier = config.validate().unwrap();
        assert_eq!(classifier.buckets(), &[15, 3, 7]);
        assert_eq!(classifier.default_bucket(), 7);
    }

    #[test]
    fn test_rejects_bad_buckets() {
        assert_invalid(PipelineConfig {
            buckets: vec![],
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            buckets: vec![0, 3],
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            buckets: vec![4, 5],
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            default_bucket: Some(9),
            ..Default::default()
        });
    }

    #[test]
    fn test_rejects_bad_scalars() {
        assert_invalid(PipelineConfig {
            sigma_clip: 0.0,
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            psf_fwhm: f64::NAN,
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            threshold: DetectionThreshold::Sigma(-1.0),
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            threshold: DetectionThreshold::Absolute(f64::INFINITY),
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            blur_kernel_size: 20,
            ..Default::default()
        });
        assert_invalid(PipelineConfig {
            blur_kernel_size: 0,
            ..Default::default()
        });
    }

    #[test]
    fn test_threshold_resolve() {
        assert_eq!(DetectionThreshold::Sigma(2.0).resolve(1.5), 3.0);
        assert_eq!(DetectionThreshold::Absolute(7.0).resolve(1.5), 7.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "threshold": { "absolute": 12.5 }, "mask_shape": "circle" }"#)
                .unwrap();
        assert_eq!(config.threshold, DetectionThreshold::Absolute(12.5));
        assert_eq!(config.mask_shape, MaskShape::Circle);
        assert_eq!(config.buckets, vec![3, 15]);
        assert_eq!(config.blur_kernel_size, 21);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = PipelineConfig {
            star_radius: 4,
            buckets: vec![5, 9, 21],
            default_bucket: Some(9),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(PipelineConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            PipelineConfig::load_from_file(&missing),
            Err(StarmaskError::Io(_))
        ));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load_from_file(&garbage),
            Err(StarmaskError::Json(_))
        ));
    }
}
