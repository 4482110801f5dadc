use image::{GrayImage, Luma};
use log::warn;
use ndarray::{Array2, ArrayView2};

/// Converts an ndarray Array2<u8> to an image::GrayImage
///
/// The conversion uses a direct mapping where array indices [y, x] map to
/// pixel coordinates (x, y). Note that array dimensions are (height, width)
/// while image dimensions are (width, height).
pub fn array2_to_gray_image(arr: &ArrayView2<u8>) -> GrayImage {
    let (height, width) = arr.dim();
    let mut img = GrayImage::new(width as u32, height as u32);

    for ((y, x), &value) in arr.indexed_iter() {
        img.put_pixel(x as u32, y as u32, Luma([value]));
    }

    img
}

/// Converts an image::GrayImage into a row-major Array2<u8>
pub fn gray_image_to_array2(img: &GrayImage) -> Array2<u8> {
    let (width, height) = img.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0]
    })
}

/// Promote an 8-bit image to the floating working form
pub fn to_float(image: &ArrayView2<u8>) -> Array2<f64> {
    image.mapv(f64::from)
}

/// Clamp a single working sample into the 8-bit range and truncate.
///
/// NaN maps to 0.
#[inline]
pub fn clamp_to_u8(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.clamp(0.0, 255.0) as u8
    }
}

/// Convert the floating working form back to 8 bits, clamping to [0, 255]
/// before truncation.
pub fn to_u8_clamped(image: &ArrayView2<f64>) -> Array2<u8> {
    image.mapv(clamp_to_u8)
}

/// Min-max stretch raw detector data into the 8-bit display range.
///
/// Only finite samples participate in the min/max; non-finite samples map
/// to 0. A constant image (or one without finite samples) maps to all zeros.
pub fn normalize_to_u8(data: &ArrayView2<f64>) -> Array2<u8> {
    let (min, max) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        warn!("Image has no dynamic range (min={min}, max={max}); stretching to zeros");
        return Array2::zeros(data.dim());
    }

    data.mapv(|v| {
        if v.is_finite() {
            clamp_to_u8((v - min) / range * 255.0)
        } else {
            0
        }
    })
}
