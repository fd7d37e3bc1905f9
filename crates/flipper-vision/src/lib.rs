//! # Flipper Vision
//!
//! Perception and actuation for the trading-post flipper.
//!
//! This crate provides everything the bot needs to see and drive the
//! target client:
//!
//! - **Window Capture**: platform-abstracted, window-relative capture
//! - **Template Matching**: two-phase bitmap search for UI landmarks
//! - **Preprocessing**: fixed cleanup pipelines ahead of OCR
//! - **OCR**: tesseract-backed recognition with per-mode whitelists
//! - **Name Verification**: normalization, correction table, mismatch log
//! - **Input Simulation**: synthetic mouse/keyboard and clipboard I/O
//!
//! The platform backends (xcap, enigo, arboard) sit behind the
//! `gui-automation` feature; every trait has an in-memory test double
//! so UI flows can be exercised without a display.

pub mod capture;
pub mod input;
pub mod ocr;
pub mod preprocess;
pub mod template;
pub mod verify;

// Re-export main types
pub use capture::{
    CaptureError, CaptureResult, Point, Region, ScreenCapture, Screenshot, WindowInfo,
};
pub use input::{InputError, InputResult, InputSimulator, Key, Timing, MAX_PASTE_LEN};
pub use ocr::{OcrEngine, OcrError, OcrMode, OcrResult, RecognizedText, TesseractOcr};
pub use preprocess::{binarize_by_color, prepare_name, prepare_numeric};
pub use template::{find_image, find_template, pixel_similarity, Template, TemplateError};
pub use verify::{
    normalize, CorrectionTable, MismatchLog, NameMatch, NameVerifier, VerifyError, VerifyResult,
};

use thiserror::Error;

/// Main error type for the vision layer.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Screen capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Name verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;
