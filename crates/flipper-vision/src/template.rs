//! Bitmap template matching.
//!
//! Landmarks in the target UI (buttons, tab headers, the escape menu)
//! are located by sliding a small reference bitmap over a captured
//! frame. Matching runs in two phases: first collect every position
//! where the template's top row matches, then verify the full template
//! at each candidate. The first full match in row-major order wins.

use crate::capture::Point;
use image::{Rgba, RgbaImage};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or matching templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to load template {name}: {source}")]
    Load {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Template {0} is empty")]
    Empty(String),
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A named reference bitmap.
#[derive(Debug, Clone)]
pub struct Template {
    /// Name used in logs and diagnostics
    pub name: String,
    /// The reference pixels
    pub image: RgbaImage,
}

impl Template {
    /// Create a template from an in-memory image.
    pub fn new(name: impl Into<String>, image: RgbaImage) -> TemplateResult<Self> {
        let name = name.into();
        if image.width() == 0 || image.height() == 0 {
            return Err(TemplateError::Empty(name));
        }
        Ok(Self { name, image })
    }

    /// Load a template from a file on disk.
    pub fn load(name: impl Into<String>, path: impl AsRef<Path>) -> TemplateResult<Self> {
        let name = name.into();
        let image = image::open(path.as_ref())
            .map_err(|source| TemplateError::Load {
                name: name.clone(),
                source,
            })?
            .to_rgba8();
        Self::new(name, image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Similarity of two pixels in [..=1.0], 1.0 meaning identical RGB.
///
/// Alpha never participates: `1 - |Δrgb| / 255` where `|Δrgb|` is the
/// Euclidean distance between the two RGB triples.
pub fn pixel_similarity(a: Rgba<u8>, b: Rgba<u8>) -> f64 {
    let dr = a.0[0] as f64 - b.0[0] as f64;
    let dg = a.0[1] as f64 - b.0[1] as f64;
    let db = a.0[2] as f64 - b.0[2] as f64;
    1.0 - (dr * dr + dg * dg + db * db).sqrt() / 255.0
}

fn pixel_matches(a: Rgba<u8>, b: Rgba<u8>, tolerance: f64) -> bool {
    pixel_similarity(a, b) >= tolerance
}

fn row_matches(
    haystack: &RgbaImage,
    template: &RgbaImage,
    x: u32,
    y: u32,
    ty: u32,
    tolerance: f64,
) -> bool {
    for tx in 0..template.width() {
        let tp = *template.get_pixel(tx, ty);
        if !pixel_matches(*haystack.get_pixel(x + tx, y + ty), tp, tolerance) {
            return false;
        }
    }
    true
}

/// Find the first position where `template` matches inside `haystack`.
///
/// `tolerance` is the minimum per-pixel similarity; 1.0 requires exact
/// RGB equality. Returns the top-left corner of the match, or `None`.
pub fn find_template(haystack: &RgbaImage, template: &Template, tolerance: f64) -> Option<Point> {
    find_image(haystack, &template.image, tolerance)
}

/// As [`find_template`] but taking a raw image.
pub fn find_image(haystack: &RgbaImage, template: &RgbaImage, tolerance: f64) -> Option<Point> {
    if template.width() > haystack.width() || template.height() > haystack.height() {
        return None;
    }

    let max_x = haystack.width() - template.width();
    let max_y = haystack.height() - template.height();

    // Phase one: positions where the template's top row matches.
    let mut candidates = Vec::new();
    for y in 0..=max_y {
        for x in 0..=max_x {
            if row_matches(haystack, template, x, y, 0, tolerance) {
                candidates.push((x, y));
            }
        }
    }

    // Phase two: verify remaining rows at each candidate, in order.
    'candidate: for (x, y) in candidates {
        for ty in 1..template.height() {
            if !row_matches(haystack, template, x, y, ty, tolerance) {
                continue 'candidate;
            }
        }
        return Some(Point::new(x as i32, y as i32));
    }

    None
}
