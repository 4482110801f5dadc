//! Shared test infrastructure for the workspace.
//!
//! Locates the workspace root so tests can write inspectable artifacts under
//! `test_output/`, and builds reproducible synthetic star fields: a noisy
//! sky background with Gaussian stars and optional diffuse structure.
//!
//! ```rust
//! use test_helpers::{output_path, StarField};
//!
//! let frame = StarField::new(64, 64)
//!     .background(20.0, 2.0)
//!     .star(32.0, 32.0, 180.0)
//!     .render(7);
//! assert_eq!(frame.dim(), (64, 64));
//! let png = output_path("star_field.png");
//! assert!(png.ends_with("star_field.png"));
//! ```

use ndarray::Array2;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::env;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
    #[error("Invalid noise parameters: {0}")]
    InvalidNoise(String),
}

/// Walk up from the current directory to the Cargo workspace root.
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// `test_output/` under the workspace root, created on first use.
pub fn get_output_dir() -> PathBuf {
    let output_dir = PROJECT_ROOT.join("test_output");

    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }

    output_dir
}

pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    get_output_dir().join(path)
}

/// A 2D array with values sampled from Normal(mean, std_dev)
pub fn simple_normal_array(
    shape: (usize, usize),
    mean: f64,
    std_dev: f64,
    seed: u64,
) -> Result<Array2<f64>, TestHelperError> {
    let normal = Normal::new(mean, std_dev)
        .map_err(|e| TestHelperError::InvalidNoise(format!("{e} (mean={mean}, std={std_dev})")))?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(Array2::from_shape_fn(shape, |_| normal.sample(&mut rng)))
}

/// Add a circular Gaussian of peak `amplitude` centred on (`cx`, `cy`).
///
/// Only pixels within 5 sigma are touched.
pub fn add_gaussian_star(image: &mut Array2<f64>, cx: f64, cy: f64, amplitude: f64, sigma: f64) {
    let (height, width) = image.dim();
    let reach = (5.0 * sigma).ceil() as isize;
    let (px, py) = (cx.round() as isize, cy.round() as isize);

    for y in (py - reach).max(0)..=(py + reach).min(height as isize - 1) {
        for x in (px - reach).max(0)..=(px + reach).min(width as isize - 1) {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            image[[y as usize, x as usize]] +=
                amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
    }
}

/// Builder for reproducible synthetic star fields
#[derive(Debug, Clone)]
pub struct StarField {
    width: usize,
    height: usize,
    sky: f64,
    noise: f64,
    psf_sigma: f64,
    stars: Vec<(f64, f64, f64)>,
    nebula: Option<(f64, f64, f64, f64)>,
}

impl StarField {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            sky: 0.0,
            noise: 0.0,
            psf_sigma: 2.0 / 2.354_820_045_030_949_3,
            stars: Vec::new(),
            nebula: None,
        }
    }

    /// Sky level and Gaussian read noise
    pub fn background(mut self, sky: f64, noise: f64) -> Self {
        self.sky = sky;
        self.noise = noise;
        self
    }

    /// PSF width as full width at half maximum
    pub fn fwhm(mut self, fwhm: f64) -> Self {
        self.psf_sigma = fwhm / 2.354_820_045_030_949_3;
        self
    }

    pub fn star(mut self, x: f64, y: f64, amplitude: f64) -> Self {
        self.stars.push((x, y, amplitude));
        self
    }

    /// Broad Gaussian glow standing in for nebulosity
    pub fn nebula(mut self, x: f64, y: f64, amplitude: f64, sigma: f64) -> Self {
        self.nebula = Some((x, y, amplitude, sigma));
        self
    }

    /// Render as floats; the same seed always produces the same frame
    pub fn render(&self, seed: u64) -> Array2<f64> {
        let shape = (self.height, self.width);
        let mut image = if self.noise > 0.0 {
            simple_normal_array(shape, self.sky, self.noise, seed)
                .unwrap_or_else(|_| Array2::from_elem(shape, self.sky))
        } else {
            Array2::from_elem(shape, self.sky)
        };

        if let Some((x, y, amplitude, sigma)) = self.nebula {
            add_gaussian_star(&mut image, x, y, amplitude, sigma);
        }
        for &(x, y, amplitude) in &self.stars {
            add_gaussian_star(&mut image, x, y, amplitude, self.psf_sigma);
        }
        image
    }

    /// Render clamped and truncated to 8 bits
    pub fn render_u8(&self, seed: u64) -> Array2<u8> {
        self.render(seed).mapv(|v| v.clamp(0.0, 255.0) as u8)
    }
}
