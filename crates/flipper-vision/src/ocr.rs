//! Text recognition over preprocessed captures.
//!
//! Backed by the tesseract CLI through rusty-tesseract. Two fixed
//! recognition modes exist, each with its own character whitelist:
//! item names (letters, digits, a few punctuation marks) and raw
//! numbers (digits only, numeric classifier mode).

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{trace, warn};

/// Mean word confidence below which a recognition is flagged in the
/// logs. Tesseract reports confidences as percentages.
const LOW_CONFIDENCE: f32 = 60.0;

/// Errors that can occur during text recognition.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR backend failed: {0}")]
    Backend(String),

    #[error("OCR returned no text")]
    NoText,

    #[error("OCR task panicked")]
    TaskFailed,
}

/// Result type for OCR operations.
pub type OcrResult<T> = Result<T, OcrError>;

/// What kind of text a capture is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrMode {
    /// Item names: letters, digits and the punctuation that occurs in
    /// real item names.
    ItemName,
    /// Pure digit strings (prices, quantities).
    Numeric,
}

/// Characters tesseract may emit in each mode.
const NAME_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz1234567890 + -/ '\",()";
const NUMERIC_WHITELIST: &str = "1234567890";

/// Text recognized from a capture.
#[derive(Debug, Clone)]
pub struct RecognizedText {
    /// The raw recognized string, whitespace-trimmed
    pub text: String,
    /// Mean word confidence if the backend reports one
    pub confidence: Option<f32>,
}

impl RecognizedText {
    /// Parse the recognized text as an integer, ignoring any stray
    /// non-digit characters the whitelist let through.
    pub fn as_number(&self) -> Option<u64> {
        let digits: String = self.text.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        digits.parse().ok()
    }
}

/// Trait over OCR backends so the state machine can run against a
/// scripted recognizer in tests.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &GrayImage, mode: OcrMode) -> OcrResult<RecognizedText>;
}

/// OCR engine backed by the tesseract CLI.
pub struct TesseractOcr {
    lang: String,
    dpi: i32,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            lang: "eng".to_string(),
            dpi: 70,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    fn args_for(&self, mode: OcrMode) -> rusty_tesseract::Args {
        let mut config_variables = HashMap::new();
        match mode {
            OcrMode::ItemName => {
                config_variables.insert(
                    "tessedit_char_whitelist".to_string(),
                    NAME_WHITELIST.to_string(),
                );
            }
            OcrMode::Numeric => {
                config_variables.insert(
                    "tessedit_char_whitelist".to_string(),
                    NUMERIC_WHITELIST.to_string(),
                );
                config_variables.insert("classify_bln_numeric_mode".to_string(), "1".to_string());
            }
        }
        rusty_tesseract::Args {
            lang: self.lang.clone(),
            config_variables,
            dpi: Some(self.dpi),
            // PSM 6: assume a single uniform block of text
            psm: Some(6),
            oem: Some(3),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &GrayImage, mode: OcrMode) -> OcrResult<RecognizedText> {
        let args = self.args_for(mode);
        let dynamic = DynamicImage::ImageLuma8(image.clone());

        // the tesseract binding shells out, so keep it off the runtime
        let result = tokio::task::spawn_blocking(move || {
            let img = rusty_tesseract::Image::from_dynamic_image(&dynamic)
                .map_err(|e| OcrError::Backend(e.to_string()))?;
            let text = rusty_tesseract::image_to_string(&img, &args)
                .map_err(|e| OcrError::Backend(e.to_string()))?;

            let confidence = rusty_tesseract::image_to_data(&img, &args)
                .ok()
                .and_then(|data| {
                    let confs: Vec<f32> = data
                        .data
                        .iter()
                        .filter(|d| d.conf >= 0.0)
                        .map(|d| d.conf)
                        .collect();
                    if confs.is_empty() {
                        None
                    } else {
                        Some(confs.iter().sum::<f32>() / confs.len() as f32)
                    }
                });

            Ok::<_, OcrError>(RecognizedText {
                text: text.trim().to_string(),
                confidence,
            })
        })
        .await
        .map_err(|_| OcrError::TaskFailed)??;

        if result.text.is_empty() {
            return Err(OcrError::NoText);
        }
        match result.confidence {
            Some(conf) if conf < LOW_CONFIDENCE => {
                warn!(?mode, text = %result.text, conf, "low-confidence recognition");
            }
            Some(conf) => trace!(?mode, text = %result.text, conf, "recognized text"),
            None => trace!(?mode, text = %result.text, "recognized text, no confidence data"),
        }
        Ok(result)
    }
}

/// Scripted OCR backend for tests.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Serves canned responses in order; errors once the script runs
    /// out.
    pub struct MockOcr {
        responses: Mutex<Vec<OcrResult<RecognizedText>>>,
    }

    impl MockOcr {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
            }
        }

        /// Queue a successful recognition.
        pub fn push_text(&self, text: impl Into<String>) {
            self.responses.lock().unwrap().push(Ok(RecognizedText {
                text: text.into(),
                confidence: Some(90.0),
            }));
        }

        /// Queue an error.
        pub fn push_error(&self, err: OcrError) {
            self.responses.lock().unwrap().push(Err(err));
        }
    }

    impl Default for MockOcr {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl OcrEngine for MockOcr {
        async fn recognize(&self, _image: &GrayImage, _mode: OcrMode) -> OcrResult<RecognizedText> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(OcrError::NoText);
            }
            responses.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_number_strips_stray_characters() {
        let text = RecognizedText {
            text: " 1 234\n".to_string(),
            confidence: None,
        };
        assert_eq!(text.as_number(), Some(1234));
    }

    #[test]
    fn as_number_rejects_empty() {
        let text = RecognizedText {
            text: "--".to_string(),
            confidence: None,
        };
        assert_eq!(text.as_number(), None);
    }

    #[test]
    fn numeric_args_enable_digit_mode() {
        let engine = TesseractOcr::new();
        let args = engine.args_for(OcrMode::Numeric);
        assert_eq!(
            args.config_variables.get("tessedit_char_whitelist"),
            Some(&NUMERIC_WHITELIST.to_string())
        );
        assert_eq!(
            args.config_variables.get("classify_bln_numeric_mode"),
            Some(&"1".to_string())
        );
    }

    #[test]
    fn name_args_use_name_whitelist() {
        let engine = TesseractOcr::new();
        let args = engine.args_for(OcrMode::ItemName);
        assert_eq!(
            args.config_variables.get("tessedit_char_whitelist"),
            Some(&NAME_WHITELIST.to_string())
        );
        assert_eq!(args.psm, Some(6));
    }

    #[tokio::test]
    async fn mock_serves_in_order_then_errors() {
        let mock = mock::MockOcr::new();
        mock.push_text("Copper Ore");
        mock.push_text("1234");

        let img = GrayImage::new(1, 1);
        let first = mock.recognize(&img, OcrMode::ItemName).await.unwrap();
        assert_eq!(first.text, "Copper Ore");
        let second = mock.recognize(&img, OcrMode::Numeric).await.unwrap();
        assert_eq!(second.text, "1234");
        assert!(mock.recognize(&img, OcrMode::ItemName).await.is_err());
    }
}
