//! Window capture for the flipper.
//!
//! Everything the bot knows about the target UI comes from polling
//! captures of the target window, so this module provides:
//! - `Region`, a window-relative rectangle
//! - `Screenshot`, an ephemeral captured frame plus its origin
//! - the platform-abstracted `ScreenCapture` trait (xcap-backed)
//! - a scriptable in-memory capture for tests

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during window capture.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Screen capture not available on this platform")]
    NotAvailable,

    #[error("Failed to capture window: {0}")]
    CaptureFailed(String),

    #[error("Window not found for process: {0}")]
    WindowNotFound(String),

    #[error("Window {0} is gone")]
    WindowGone(u32),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// A rectangle in window-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// X coordinate of the top-left corner
    pub x: i32,
    /// Y coordinate of the top-left corner
    pub y: i32,
    /// Width of the region
    pub width: u32,
    /// Height of the region
    pub height: u32,
}

impl Region {
    /// Create a new region.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if this region has positive dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Check if a point lies within this region.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }

    /// Translate the region by an offset.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// A point in window-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate the point by an offset.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Information about the target window.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    /// Window ID (platform-specific)
    pub id: u32,
    /// Window title
    pub title: String,
    /// Process name that owns the window
    pub process_name: String,
    /// Window position and size in screen coordinates
    pub region: Region,
}

/// A captured frame. Inspected once and discarded, never cached.
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// The captured pixels
    pub image: RgbaImage,
    /// The window-relative region this frame was captured from
    pub region: Region,
    /// Capture timestamp (Unix milliseconds)
    pub timestamp: i64,
}

impl Screenshot {
    /// Create a new screenshot for a region.
    pub fn new(image: RgbaImage, region: Region) -> Self {
        Self {
            image,
            region,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Width of the captured frame.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of the captured frame.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Crop out a sub-region given in the same window-relative space.
    pub fn crop(&self, region: Region) -> CaptureResult<Screenshot> {
        let local_x = region.x - self.region.x;
        let local_y = region.y - self.region.y;
        if local_x < 0 || local_y < 0 {
            return Err(CaptureError::InvalidRegion(
                "crop region starts before the captured frame".to_string(),
            ));
        }

        let (x, y) = (local_x as u32, local_y as u32);
        if x + region.width > self.image.width() || y + region.height > self.image.height() {
            return Err(CaptureError::InvalidRegion(
                "crop region extends beyond the captured frame".to_string(),
            ));
        }

        let cropped =
            image::imageops::crop_imm(&self.image, x, y, region.width, region.height).to_image();
        Ok(Screenshot::new(cropped, region))
    }
}

/// Trait for platform-specific window capture implementations.
///
/// All capture is window-relative: callers ask for regions inside the
/// target window, never absolute screen rectangles.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Check if capture is available on this platform.
    fn is_available(&self) -> bool;

    /// Find the target window by owning process name.
    async fn find_window(&self, process_name: &str) -> CaptureResult<WindowInfo>;

    /// Capture the full client area of a window.
    async fn capture_window(&self, window_id: u32) -> CaptureResult<Screenshot>;

    /// Capture a window-relative region.
    async fn capture_region(&self, window_id: u32, region: Region) -> CaptureResult<Screenshot> {
        if !region.is_valid() {
            return Err(CaptureError::InvalidRegion(
                "region must have positive dimensions".to_string(),
            ));
        }
        let full = self.capture_window(window_id).await?;
        full.crop(region)
    }
}

/// Platform implementation using xcap.
#[cfg(feature = "gui-automation")]
pub mod platform {
    use super::*;
    use image::{ImageBuffer, Rgba};

    /// Cross-platform window capture backed by xcap.
    pub struct XcapCapture;

    impl XcapCapture {
        pub fn new() -> Self {
            Self
        }

        // xcap hands back BGRA on some backends
        fn convert_image(data: Vec<u8>, width: u32, height: u32) -> CaptureResult<RgbaImage> {
            let mut rgba_data = data;
            for chunk in rgba_data.chunks_exact_mut(4) {
                chunk.swap(0, 2);
            }

            let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, rgba_data).ok_or_else(|| {
                    CaptureError::CaptureFailed("failed to assemble image buffer".to_string())
                })?;
            Ok(buffer)
        }
    }

    impl Default for XcapCapture {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ScreenCapture for XcapCapture {
        fn is_available(&self) -> bool {
            true
        }

        async fn find_window(&self, process_name: &str) -> CaptureResult<WindowInfo> {
            let windows =
                xcap::Window::all().map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
            let needle = process_name.to_lowercase();

            windows
                .into_iter()
                .filter(|w| !w.is_minimized())
                .find(|w| w.app_name().to_lowercase().contains(&needle))
                .map(|w| WindowInfo {
                    id: w.id(),
                    title: w.title().to_string(),
                    process_name: w.app_name().to_string(),
                    region: Region::new(w.x(), w.y(), w.width(), w.height()),
                })
                .ok_or_else(|| CaptureError::WindowNotFound(process_name.to_string()))
        }

        async fn capture_window(&self, window_id: u32) -> CaptureResult<Screenshot> {
            let windows =
                xcap::Window::all().map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
            let window = windows
                .into_iter()
                .find(|w| w.id() == window_id)
                .ok_or(CaptureError::WindowGone(window_id))?;

            let capture = window
                .capture_image()
                .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

            let width = capture.width();
            let height = capture.height();
            let image = Self::convert_image(capture.into_raw(), width, height)?;

            Ok(Screenshot::new(image, Region::new(0, 0, width, height)))
        }
    }
}

/// Create the default capture implementation for the current platform.
#[cfg(feature = "gui-automation")]
pub fn create_screen_capture() -> impl ScreenCapture {
    platform::XcapCapture::new()
}

/// Scriptable capture for tests: serves crops of a fixed frame.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// In-memory capture that answers every request from a queue of
    /// frames (last frame repeats once the queue drains).
    pub struct MockCapture {
        frames: Mutex<Vec<RgbaImage>>,
        window: WindowInfo,
    }

    impl MockCapture {
        /// Create a mock serving a single fixed frame.
        pub fn new(frame: RgbaImage) -> Self {
            let region = Region::new(0, 0, frame.width(), frame.height());
            Self {
                frames: Mutex::new(vec![frame]),
                window: WindowInfo {
                    id: 1,
                    title: "mock".to_string(),
                    process_name: "mock".to_string(),
                    region,
                },
            }
        }

        /// Queue an additional frame to be served after the current one.
        pub fn push_frame(&self, frame: RgbaImage) {
            self.frames.lock().unwrap().push(frame);
        }

        fn current(&self) -> RgbaImage {
            let mut frames = self.frames.lock().unwrap();
            if frames.len() > 1 {
                frames.remove(0)
            } else {
                frames[0].clone()
            }
        }
    }

    #[async_trait]
    impl ScreenCapture for MockCapture {
        fn is_available(&self) -> bool {
            true
        }

        async fn find_window(&self, _process_name: &str) -> CaptureResult<WindowInfo> {
            Ok(self.window.clone())
        }

        async fn capture_window(&self, _window_id: u32) -> CaptureResult<Screenshot> {
            let frame = self.current();
            let region = Region::new(0, 0, frame.width(), frame.height());
            Ok(Screenshot::new(frame, region))
        }
    }
}

/// Convert a screenshot to a `DynamicImage` for encoding/saving.
pub fn to_dynamic(shot: &Screenshot) -> DynamicImage {
    DynamicImage::ImageRgba8(shot.image.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn region_contains() {
        let region = Region::new(100, 100, 200, 200);
        assert!(region.contains(150, 150));
        assert!(region.contains(100, 100));
        assert!(!region.contains(50, 50));
        assert!(!region.contains(350, 150));
    }

    #[test]
    fn region_validity() {
        assert!(Region::new(0, 0, 10, 10).is_valid());
        assert!(!Region::new(0, 0, 0, 10).is_valid());
        assert!(!Region::new(0, 0, 10, 0).is_valid());
    }

    #[test]
    fn crop_respects_window_space() {
        let shot = Screenshot::new(solid(100, 100, [1, 2, 3, 255]), Region::new(0, 0, 100, 100));
        let sub = shot.crop(Region::new(10, 20, 30, 40)).unwrap();
        assert_eq!(sub.width(), 30);
        assert_eq!(sub.height(), 40);
        assert_eq!(sub.region, Region::new(10, 20, 30, 40));

        assert!(shot.crop(Region::new(90, 90, 20, 20)).is_err());
        assert!(shot.crop(Region::new(-5, 0, 10, 10)).is_err());
    }

    #[tokio::test]
    async fn mock_serves_queued_frames() {
        let mock = mock::MockCapture::new(solid(8, 8, [0, 0, 0, 255]));
        mock.push_frame(solid(8, 8, [255, 255, 255, 255]));

        let first = mock.capture_window(1).await.unwrap();
        assert_eq!(first.image.get_pixel(0, 0).0, [0, 0, 0, 255]);

        let second = mock.capture_window(1).await.unwrap();
        assert_eq!(second.image.get_pixel(0, 0).0, [255, 255, 255, 255]);

        // last frame repeats
        let third = mock.capture_window(1).await.unwrap();
        assert_eq!(third.image.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }
}
