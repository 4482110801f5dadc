//! Image dimensions and size utilities

use ndarray::{Array2, ArrayBase, Data, Ix2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions structure
///
/// Every buffer in a pipeline run (masks, eroded variants, alpha maps and the
/// composite) shares one `ImageSize` with the input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Size of a row-major (height, width) array
    pub fn of<S: Data>(array: &ArrayBase<S, Ix2>) -> Self {
        let (height, width) = array.dim();
        Self { width, height }
    }

    /// Create a zeroed array with this size
    ///
    /// Returns an ndarray Array2 with shape (height, width).
    /// Note the row-major ordering convention: rows (height) come first.
    pub fn zeros<T>(&self) -> Array2<T>
    where
        T: Clone + num_traits::Zero,
    {
        Array2::zeros(self.shape())
    }

    /// Shape tuple in ndarray order (height, width)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
