//! Image processing stages for star halo suppression
//!
//! Background statistics, source detection, classification, mask drawing,
//! morphological erosion and soft compositing, plus the small conversion
//! and comparison helpers around them.

pub mod classify;
pub mod compare;
pub mod composite;
pub mod convolve;
pub mod detection;
pub mod image;
pub mod mask;
pub mod morphology;
pub mod stats;

// Re-export key functionality for easier access
pub use classify::{force_odd, KernelClassifier};
pub use compare::{abs_difference, blink_frames, split_view};
pub use composite::{alpha_from_mask, blend_bucket, composite_layers, prepare_layers, BucketLayer};
pub use convolve::{convolve2d, gaussian_blur, BorderMode, ConvolveOptions};
pub use detection::{DaoDetector, FixedSources, MatchedFilterDetector, Source, SourceDetector};
pub use image::{array2_to_gray_image, gray_image_to_array2, normalize_to_u8, to_u8_clamped};
pub use mask::{rasterize, BucketMask, MaskShape};
pub use morphology::erode;
pub use stats::{sigma_clipped_stats, BackgroundStats, StatsError};
