//! Point source detection
//!
//! Detectors sit behind the [`SourceDetector`] trait so the pipeline can swap
//! algorithms. [`DaoDetector`] wraps starfield's DAOStarFinder and is the
//! default. [`MatchedFilterDetector`] is a lighter alternative whose flux is
//! scaled to the detection threshold.

pub mod dao;
pub mod matched_filter;
pub mod source;

pub use dao::DaoDetector;
pub use matched_filter::{MatchedFilterDetector, MatchedKernel, FWHM_TO_SIGMA};
pub use source::{flux_to_magnitude, FixedSources, Source, SourceDetector};
