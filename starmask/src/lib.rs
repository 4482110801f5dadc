//! Star halo suppression by magnitude-adaptive morphological erosion.
//!
//! Point sources are detected on a frame, classified by brightness, and
//! painted into one binary mask per structuring-element size. The original
//! image is eroded once per size and the eroded variants are blended back
//! through blurred masks, shrinking stellar halos while leaving diffuse
//! structure untouched.
//!
//! ```no_run
//! use ndarray::Array2;
//! use starmask::{process, PipelineConfig};
//!
//! let frame = Array2::<u8>::zeros((512, 512));
//! let output = process(&frame.view(), &PipelineConfig::default())?;
//! println!("{} stars", output.sources.len());
//! # Ok::<(), starmask::StarmaskError>(())
//! ```

pub mod config;
pub mod error;
pub mod image_proc;
pub mod image_size;
pub mod pipeline;

pub use config::{DetectionThreshold, PipelineConfig};
pub use error::{Result, StarmaskError};
pub use image_proc::mask::MaskShape;
pub use image_size::ImageSize;
pub use pipeline::{
    process, process_float, ClassifiedSource, Pipeline, PipelineOutput, PipelineStage,
};
