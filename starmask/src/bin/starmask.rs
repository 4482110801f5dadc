//! Suppress stellar halos in an astronomical image.
//!
//! Reads any raster format the `image` crate understands as grayscale, runs
//! the halo suppression pipeline and writes diagnostic products to an output
//! directory:
//!
//! - `original.png` - the 8-bit frame the pipeline worked on
//! - `mask_kernel_<k>.png` - binary star mask per bucket
//! - `eroded.png` - whole-frame erosion with the largest bucket, for reference
//! - `final.png` - composited result
//! - `difference.png` - absolute difference between original and result
//! - `split.png` - original left of the split column, result to the right
//! - `sources.json` - detections with their buckets (with `--sources`)
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin starmask -- nebula.png -o out/
//! cargo run --release --bin starmask -- frame.tiff --raw --threshold-sigma 1.5 --buckets 3,9,21
//! cargo run --release --bin starmask -- nebula.png --config starmask.json --save-config effective.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use ndarray::{Array2, ArrayView2};
use starmask::image_proc::image::{array2_to_gray_image, gray_image_to_array2, normalize_to_u8};
use starmask::image_proc::detection::{DaoDetector, MatchedFilterDetector, SourceDetector};
use starmask::image_proc::{abs_difference, erode, split_view};
use starmask::{DetectionThreshold, MaskShape, Pipeline, PipelineConfig};
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShapeArg {
    Square,
    Circle,
}

impl From<ShapeArg> for MaskShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Square => MaskShape::Square,
            ShapeArg::Circle => MaskShape::Circle,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DetectorArg {
    /// starfield DAOStarFinder
    Dao,
    /// Built-in matched filter, magnitudes relative to the threshold
    MatchedFilter,
}

impl DetectorArg {
    fn build(self) -> Box<dyn SourceDetector> {
        match self {
            DetectorArg::Dao => Box::new(DaoDetector::default()),
            DetectorArg::MatchedFilter => Box::new(MatchedFilterDetector::default()),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Shrink halos around stars with magnitude-adaptive erosion",
    long_about = "Detects stars, sorts them by brightness into structuring-element \
        buckets, erodes the image once per bucket and blends each eroded copy back \
        through a softened star mask. Diffuse structure away from stars is left \
        untouched."
)]
struct Args {
    /// Input image
    input: PathBuf,

    /// Output directory for all products
    #[arg(short, long, default_value = "starmask_out")]
    output: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this path
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Treat the input as raw detector data (16-bit or float) and stretch it
    #[arg(long)]
    raw: bool,

    /// Source detection algorithm
    #[arg(long, value_enum, default_value = "dao")]
    detector: DetectorArg,

    /// Background sigma clipping threshold
    #[arg(long)]
    sigma_clip: Option<f64>,

    /// Expected PSF FWHM in pixels
    #[arg(long)]
    fwhm: Option<f64>,

    /// Detection threshold in background standard deviations
    #[arg(long, conflicts_with = "threshold_absolute")]
    threshold_sigma: Option<f64>,

    /// Detection threshold as an absolute level above background
    #[arg(long)]
    threshold_absolute: Option<f64>,

    /// Half-width of the mask drawn around each star
    #[arg(short = 'r', long)]
    star_radius: Option<usize>,

    /// Shape drawn around each star
    #[arg(long, value_enum)]
    shape: Option<ShapeArg>,

    /// Structuring-element sizes in compositing order, e.g. 3,15
    #[arg(short, long, value_delimiter = ',')]
    buckets: Option<Vec<usize>>,

    /// Bucket for stars that are not bright
    #[arg(long)]
    default_bucket: Option<usize>,

    /// Magnitude below which a star gets the largest bucket
    #[arg(long, allow_hyphen_values = true)]
    bright_cutoff: Option<f64>,

    /// Gaussian window used to soften masks (odd)
    #[arg(long)]
    blur_kernel: Option<usize>,

    /// Column of the before/after split (defaults to the middle)
    #[arg(long)]
    split_column: Option<usize>,

    /// Also write detected sources to sources.json
    #[arg(long)]
    sources: bool,
}

impl Args {
    fn build_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(v) = self.sigma_clip {
            config.sigma_clip = v;
        }
        if let Some(v) = self.fwhm {
            config.psf_fwhm = v;
        }
        if let Some(v) = self.threshold_sigma {
            config.threshold = DetectionThreshold::Sigma(v);
        }
        if let Some(v) = self.threshold_absolute {
            config.threshold = DetectionThreshold::Absolute(v);
        }
        if let Some(v) = self.star_radius {
            config.star_radius = v;
        }
        if let Some(v) = self.shape {
            config.mask_shape = v.into();
        }
        if let Some(v) = &self.buckets {
            config.buckets = v.clone();
        }
        if let Some(v) = self.default_bucket {
            config.default_bucket = Some(v);
        }
        if let Some(v) = self.bright_cutoff {
            config.bright_magnitude_cutoff = v;
        }
        if let Some(v) = self.blur_kernel {
            config.blur_kernel_size = v;
        }

        Ok(config)
    }
}

fn save_png(image: &ArrayView2<u8>, path: &Path) -> Result<()> {
    array2_to_gray_image(image)
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = args.build_config()?;

    if let Some(path) = &args.save_config {
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to save config to {}", path.display()))?;
        info!("Saved configuration to {}", path.display());
    }

    let pipeline = Pipeline::with_detector(config, args.detector.build())?;

    let decoded = image::open(&args.input)
        .with_context(|| format!("Failed to read image {}", args.input.display()))?;
    info!(
        "Loaded {} ({}x{}, {:?})",
        args.input.display(),
        decoded.width(),
        decoded.height(),
        decoded.color()
    );

    let (original, output) = if args.raw {
        let luma = decoded.to_luma32f();
        let (width, height) = luma.dimensions();
        let data = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            luma.get_pixel(x as u32, y as u32)[0] as f64
        });
        let output = pipeline.process_float(&data.view())?;
        (normalize_to_u8(&data.view()), output)
    } else {
        let original = gray_image_to_array2(&decoded.to_luma8());
        let output = pipeline.process(&original.view())?;
        (original, output)
    };

    println!("Detected {} stars", output.sources.len());
    info!(
        "Background median {:.3}, std {:.3}, threshold {:.4}",
        output.background.median, output.background.std_dev, output.threshold
    );

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    save_png(&original.view(), &args.output.join("original.png"))?;
    for bucket in &output.masks {
        let path = args.output.join(format!("mask_kernel_{}.png", bucket.size));
        save_png(&bucket.mask.view(), &path)?;
    }

    let largest = pipeline.classifier().largest_bucket();
    let eroded = erode(&original.view(), largest);
    save_png(&eroded.view(), &args.output.join("eroded.png"))?;

    save_png(&output.image.view(), &args.output.join("final.png"))?;

    let difference = abs_difference(&original.view(), &output.image.view())?;
    save_png(&difference.view(), &args.output.join("difference.png"))?;

    let column = args.split_column.unwrap_or(original.ncols() / 2);
    let split = split_view(&original.view(), &output.image.view(), column)?;
    save_png(&split.view(), &args.output.join("split.png"))?;

    if args.sources {
        let path = args.output.join("sources.json");
        let json = serde_json::to_string_pretty(&output.sources)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} sources to {}", output.sources.len(), path.display());
    }

    Ok(())
}
