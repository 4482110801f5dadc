//! DAOStarFinder from `starfield` as a [`SourceDetector`].
//!
//! This is the pipeline's default detector. Shape filters are left wide open
//! since halo suppression wants every compact bright source, round or not.

use super::source::{flux_to_magnitude, Source, SourceDetector};
use log::debug;
use ndarray::ArrayView2;
use starfield::image::starfinders::{DAOStarFinder, DAOStarFinderConfig, StellarSource};

/// DAOStarFinder with permissive shape filters
#[derive(Debug, Clone)]
pub struct DaoDetector {
    /// Kernel truncation radius in units of sigma
    pub sigma_radius: f64,
    /// Reject sources whose kernel footprint crosses the frame edge
    pub exclude_border: bool,
    /// Limit to the N brightest sources
    pub brightest: Option<usize>,
}

impl Default for DaoDetector {
    fn default() -> Self {
        Self {
            sigma_radius: 1.5,
            exclude_border: false,
            brightest: None,
        }
    }
}

impl SourceDetector for DaoDetector {
    fn name(&self) -> &str {
        "dao"
    }

    fn detect(
        &self,
        image: &ArrayView2<f64>,
        fwhm: f64,
        threshold: f64,
    ) -> Result<Vec<Source>, String> {
        if !(fwhm.is_finite() && fwhm > 0.0) {
            return Err(format!("FWHM must be positive and finite, got {fwhm}"));
        }
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(format!(
                "threshold must be non-negative and finite, got {threshold}"
            ));
        }

        let config = DAOStarFinderConfig {
            // A flat, noise-free background yields a zero threshold
            threshold: threshold.max(f64::EPSILON),
            fwhm,
            ratio: 1.0,              // Circular PSF
            theta: 0.0,              // No rotation
            sigma_radius: self.sigma_radius,
            sharpness: -10.0..=10.0, // Accept halos and cores alike
            roundness: -10.0..=10.0,
            exclude_border: self.exclude_border,
            brightest: self.brightest,
            peakmax: None,
            min_separation: 1.0,
        };

        let star_finder = DAOStarFinder::new(config)
            .map_err(|e| format!("DAO star finder creation failed: {}", e))?;

        // Missing data carries no signal
        let data = image.mapv(|v| if v.is_finite() { v } else { 0.0 });
        let sources: Vec<Source> = star_finder
            .find_stars(&data, None)
            .into_iter()
            .map(|star| {
                let (x, y) = star.get_centroid();
                Source::new(x, y, flux_to_magnitude(star.flux()))
            })
            .collect();

        debug!(
            "DAOStarFinder (fwhm={fwhm:.2}) found {} sources above {threshold:.4}",
            sources.len()
        );

        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn add_gaussian(image: &mut Array2<f64>, cx: f64, cy: f64, amplitude: f64, sigma: f64) {
        for ((y, x), v) in image.indexed_iter_mut() {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            *v += amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
    }

    #[test]
    fn test_detects_single_star_with_centroid() {
        let mut image = Array2::zeros((48, 48));
        add_gaussian(&mut image, 24.0, 18.0, 200.0, 3.0 / 2.3548);

        let sources = DaoDetector::default()
            .detect(&image.view(), 3.0, 1.0)
            .unwrap();

        assert_eq!(sources.len(), 1);
        assert!((sources[0].x - 24.0).abs() < 0.25, "x = {}", sources[0].x);
        assert!((sources[0].y - 18.0).abs() < 0.25, "y = {}", sources[0].y);
        assert!(sources[0].magnitude.is_finite());
        assert!(sources[0].magnitude < 0.0, "mag = {}", sources[0].magnitude);
    }

    #[test]
    fn test_brighter_star_has_lower_magnitude() {
        let sigma = 3.0 / 2.3548;
        let mut image = Array2::zeros((48, 80));
        add_gaussian(&mut image, 20.0, 24.0, 400.0, sigma);
        add_gaussian(&mut image, 60.0, 24.0, 40.0, sigma);

        let mut sources = DaoDetector::default()
            .detect(&image.view(), 3.0, 1.0)
            .unwrap();
        sources.sort_by(|a, b| a.x.total_cmp(&b.x));

        assert_eq!(sources.len(), 2);
        assert!(sources[0].magnitude < sources[1].magnitude);
    }

    #[test]
    fn test_flat_and_high_threshold_find_nothing() {
        let flat = Array2::zeros((32, 32));
        assert!(DaoDetector::default()
            .detect(&flat.view(), 3.0, 0.0)
            .unwrap()
            .is_empty());

        let mut star = Array2::zeros((32, 32));
        add_gaussian(&mut star, 16.0, 16.0, 50.0, 1.2);
        assert!(DaoDetector::default()
            .detect(&star.view(), 3.0, 10_000.0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_finite_samples_are_ignored() {
        let mut image = Array2::zeros((40, 40));
        add_gaussian(&mut image, 12.0, 12.0, 150.0, 1.3);
        image[[30, 30]] = f64::NAN;
        image[[2, 35]] = f64::INFINITY;

        let sources = DaoDetector::default()
            .detect(&image.view(), 3.0, 1.0)
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].pixel(), (12, 12));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let image = Array2::zeros((16, 16));
        let detector = DaoDetector::default();
        assert!(detector.detect(&image.view(), 3.0, f64::NAN).is_err());
        assert!(detector.detect(&image.view(), 3.0, -1.0).is_err());
        assert!(detector.detect(&image.view(), -2.0, 1.0).is_err());
    }
}
