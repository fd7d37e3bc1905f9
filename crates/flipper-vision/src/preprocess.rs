//! Image preprocessing ahead of OCR.
//!
//! Raw UI captures recognize poorly: item names are colored by rarity
//! on a busy background, and price digits are small light-on-dark
//! text. Two fixed pipelines clean them up:
//! - names: binarize by the known rarity color
//! - numbers: invert, upscale, grayscale

use crate::template::pixel_similarity;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

/// Default similarity threshold for name binarization.
pub const NAME_BINARIZE_TOLERANCE: f64 = 0.6;

/// Upscale factor applied before numeric OCR.
pub const NUMERIC_UPSCALE: u32 = 3;

/// Reduce an image to black text on white by color proximity.
///
/// Pixels whose RGB is within `tolerance` similarity of `target`
/// become black, everything else white. Used for item names, which
/// render in a known rarity color over an arbitrary background.
pub fn binarize_by_color(image: &RgbaImage, target: Rgba<u8>, tolerance: f64) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, px) in image.enumerate_pixels() {
        let value = if pixel_similarity(*px, target) >= tolerance {
            0u8
        } else {
            255u8
        };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Invert every channel of an image in place.
pub fn invert(image: &mut RgbaImage) {
    image::imageops::invert(image);
}

/// Upscale by an integer factor, smoothing edges for OCR.
pub fn upscale(image: &RgbaImage, factor: u32) -> RgbaImage {
    image::imageops::resize(
        image,
        image.width() * factor,
        image.height() * factor,
        FilterType::Lanczos3,
    )
}

/// Prepare a name capture for OCR: binarize against the rarity color.
pub fn prepare_name(image: &RgbaImage, rarity_color: Rgba<u8>) -> GrayImage {
    binarize_by_color(image, rarity_color, NAME_BINARIZE_TOLERANCE)
}

/// Prepare a numeric capture for OCR: invert so the light digits go
/// dark, upscale so tesseract has pixels to work with, grayscale.
pub fn prepare_numeric(image: &RgbaImage) -> GrayImage {
    let mut inverted = image.clone();
    invert(&mut inverted);
    let scaled = upscale(&inverted, NUMERIC_UPSCALE);
    DynamicImage::ImageRgba8(scaled).to_luma8()
}
