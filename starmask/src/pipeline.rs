//! End-to-end halo suppression.
//!
//! A run moves through a fixed sequence of stages:
//!
//! 1. background statistics on the float frame
//! 2. source detection on the median-subtracted frame
//! 3. magnitude classification and mask drawing per bucket
//! 4. per-bucket erosion and mask blurring (parallel across buckets)
//! 5. sequential alpha compositing in bucket order
//!
//! Finding no sources skips straight to the end and returns the input
//! unchanged. [`PipelineOutput::stages`] records which stages a run went
//! through, so the two paths can be told apart.

use crate::config::PipelineConfig;
use crate::error::{Result, StarmaskError};
use crate::image_proc::classify::KernelClassifier;
use crate::image_proc::composite::{composite_layers, prepare_layers};
use crate::image_proc::detection::{DaoDetector, Source, SourceDetector};
use crate::image_proc::image::{normalize_to_u8, to_float, to_u8_clamped};
use crate::image_proc::mask::{rasterize, BucketMask};
use crate::image_proc::stats::{sigma_clipped_stats, BackgroundStats};
use crate::image_size::ImageSize;
use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use serde::Serialize;
use std::fmt;

/// Stage a run has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    StatisticsComputed,
    SourcesDetected,
    MasksBuilt,
    Composited,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::StatisticsComputed => "statistics computed",
            PipelineStage::SourcesDetected => "sources detected",
            PipelineStage::MasksBuilt => "masks built",
            PipelineStage::Composited => "composited",
            PipelineStage::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// A detected source together with the bucket it was assigned to
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifiedSource {
    #[serde(flatten)]
    pub source: Source,
    /// `None` when the magnitude could not be classified
    pub bucket: Option<usize>,
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Final 8-bit image
    pub image: Array2<u8>,
    /// Background statistics of the input frame
    pub background: BackgroundStats,
    /// Detection threshold above background actually used
    pub threshold: f64,
    pub sources: Vec<ClassifiedSource>,
    /// One mask per configured bucket, in compositing order. Empty when no
    /// source was detected.
    pub masks: Vec<BucketMask>,
    /// Stages entered, in order. Always starts with `Idle` and ends with
    /// `Done`.
    pub stages: Vec<PipelineStage>,
}

impl PipelineOutput {
    /// True when the run skipped masking and compositing
    pub fn short_circuited(&self) -> bool {
        !self.stages.contains(&PipelineStage::Composited)
    }
}

/// A configured pipeline with its source detector
pub struct Pipeline {
    config: PipelineConfig,
    classifier: KernelClassifier,
    detector: Box<dyn SourceDetector>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("detector", &self.detector.name())
            .finish()
    }
}

impl Pipeline {
    /// Validate `config` and pair it with starfield's DAOStarFinder
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_detector(config, Box::new(DaoDetector::default()))
    }

    /// Validate `config` and use a custom source detector
    pub fn with_detector(config: PipelineConfig, detector: Box<dyn SourceDetector>) -> Result<Self> {
        let classifier = config.validate()?;
        Ok(Self {
            config,
            classifier,
            detector,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &KernelClassifier {
        &self.classifier
    }

    /// Process an 8-bit frame
    pub fn process(&self, image: &ArrayView2<u8>) -> Result<PipelineOutput> {
        self.run(image, &to_float(image).view())
    }

    /// Process raw float data.
    ///
    /// Statistics and detection see the raw values; erosion and compositing
    /// work on a min-max stretched 8-bit copy.
    pub fn process_float(&self, data: &ArrayView2<f64>) -> Result<PipelineOutput> {
        let display = normalize_to_u8(data);
        self.run(&display.view(), data)
    }

    fn enter(stages: &mut Vec<PipelineStage>, stage: PipelineStage) {
        debug!("Pipeline stage: {stage}");
        stages.push(stage);
    }

    /// Core run over an 8-bit display frame and the float frame it came from
    fn run(&self, display: &ArrayView2<u8>, science: &ArrayView2<f64>) -> Result<PipelineOutput> {
        let image_size = ImageSize::of(display);
        let science_size = ImageSize::of(science);
        if image_size != science_size {
            return Err(StarmaskError::DimensionMismatch {
                expected: image_size,
                actual: science_size,
            });
        }

        let mut stages = Vec::with_capacity(6);
        Self::enter(&mut stages, PipelineStage::Idle);

        let background = sigma_clipped_stats(science, self.config.sigma_clip)?;
        let threshold = self.config.threshold.resolve(background.std_dev);
        Self::enter(&mut stages, PipelineStage::StatisticsComputed);
        debug!(
            "Background: mean={:.3} median={:.3} std={:.3} ({} samples), threshold={threshold:.4}",
            background.mean, background.median, background.std_dev, background.samples
        );

        let subtracted = science.mapv(|v| v - background.median);
        let detected = self
            .detector
            .detect(&subtracted.view(), self.config.psf_fwhm, threshold)
            .map_err(StarmaskError::Detection)?;
        Self::enter(&mut stages, PipelineStage::SourcesDetected);

        if detected.is_empty() {
            info!(
                "No sources found by {} detector in {image_size} frame; returning input unchanged",
                self.detector.name()
            );
            Self::enter(&mut stages, PipelineStage::Done);
            return Ok(PipelineOutput {
                image: display.to_owned(),
                background,
                threshold,
                sources: Vec::new(),
                masks: Vec::new(),
                stages,
            });
        }

        let sources: Vec<ClassifiedSource> = detected
            .into_iter()
            .map(|source| ClassifiedSource {
                bucket: self.classifier.classify(source.magnitude),
                source,
            })
            .collect();

        let raw: Vec<Source> = sources.iter().map(|s| s.source).collect();
        let masks = rasterize(
            &raw,
            |s| self.classifier.classify(s.magnitude),
            self.classifier.buckets(),
            image_size,
            self.config.star_radius,
            self.config.mask_shape,
        );
        Self::enter(&mut stages, PipelineStage::MasksBuilt);

        let layers = prepare_layers(display, &masks, self.config.blur_kernel_size)?;
        let composite = composite_layers(display, &layers)?;
        let image = to_u8_clamped(&composite.view());
        Self::enter(&mut stages, PipelineStage::Composited);

        let per_bucket: Vec<String> = self
            .classifier
            .buckets()
            .iter()
            .map(|&b| {
                let n = sources.iter().filter(|s| s.bucket == Some(b)).count();
                format!("{b}px:{n}")
            })
            .collect();
        info!(
            "Suppressed halos around {} sources in {image_size} frame ({}), {} of {} buckets blended",
            sources.len(),
            per_bucket.join(" "),
            layers.len(),
            masks.len()
        );

        Self::enter(&mut stages, PipelineStage::Done);
        Ok(PipelineOutput {
            image,
            background,
            threshold,
            sources,
            masks,
            stages,
        })
    }
}

/// Run the pipeline on an 8-bit frame with the default DAO detector
pub fn process(image: &ArrayView2<u8>, config: &PipelineConfig) -> Result<PipelineOutput> {
    Pipeline::new(config.clone())?.process(image)
}

/// Run the pipeline on raw float data with the default DAO detector
pub fn process_float(data: &ArrayView2<f64>, config: &PipelineConfig) -> Result<PipelineOutput> {
    Pipeline::new(config.clone())?.process_float(data)
}
