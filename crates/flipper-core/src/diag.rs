//! Diagnostic captures.
//!
//! When a flow goes sideways (name mismatch, implausible price,
//! timeout), the frame that caused it is worth more than any log
//! line. Frames are written as timestamped PNGs under the data
//! directory, with a label naming the flow that saved them.

use flipper_vision::capture::{to_dynamic, Screenshot};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors raised while saving diagnostics.
#[derive(Error, Debug)]
pub enum DiagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Result type for diagnostics.
pub type DiagResult<T> = Result<T, DiagError>;

/// Writes labelled frames under `<data_dir>/diag/`.
pub struct DiagSink {
    dir: PathBuf,
}

impl DiagSink {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("diag"),
        }
    }

    /// Save a frame as `<label>_<timestamp>.png`, returning the path.
    pub fn save(&self, label: &str, shot: &Screenshot) -> DiagResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = self.dir.join(format!("{}_{}.png", safe, stamp));
        to_dynamic(shot).save(&path)?;
        Ok(path)
    }

    /// Save, logging instead of failing: diagnostics must never take
    /// the run down with them.
    pub fn save_best_effort(&self, label: &str, shot: &Screenshot) {
        if let Err(e) = self.save(label, shot) {
            warn!(label, error = %e, "failed to save diagnostic frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipper_vision::capture::Region;
    use image::{Rgba, RgbaImage};

    #[test]
    fn saves_labelled_png() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DiagSink::new(dir.path());
        let shot = Screenshot::new(
            RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])),
            Region::new(0, 0, 4, 4),
        );

        let path = sink.save("name mismatch/row 3", &shot).unwrap();
        assert!(path.exists());
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        // label sanitized, png extension
        assert!(file.starts_with("name_mismatch_row_3_"));
        assert!(file.ends_with(".png"));
    }
}
