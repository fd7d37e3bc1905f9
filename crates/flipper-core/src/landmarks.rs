//! Landmark template registry.
//!
//! Each UI state the bot cares about is recognized by one small
//! reference bitmap. Templates load from disk once at startup; a
//! missing file fails fast rather than surfacing mid-run as a bogus
//! "landmark not found".

use flipper_vision::capture::{Point, Screenshot};
use flipper_vision::template::{find_template, Template, TemplateError};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading the landmark set.
#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("Missing landmark template: {0}")]
    Missing(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Result type for landmark operations.
pub type LandmarkResult<T> = Result<T, LandmarkError>;

/// Every landmark the state machine looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkId {
    /// The escape menu is open (its resume button is visible)
    EscapeMenu,
    /// The trading post window is open
    TradingPost,
    /// The buy (search) tab is frontmost
    BuyTab,
    /// The sell tab is frontmost
    SellTab,
    /// The transactions tab is frontmost
    TransactionsTab,
    /// Search results have rendered
    SearchResults,
    /// An item detail window is open
    ItemWindow,
    /// A search came back empty
    NoResults,
    /// The confirm dialog is up
    ConfirmDialog,
    /// A map travel prompt is blocking the screen
    MapPrompt,
}

impl LandmarkId {
    /// All landmarks, for exhaustive loading.
    pub const ALL: [LandmarkId; 10] = [
        LandmarkId::EscapeMenu,
        LandmarkId::TradingPost,
        LandmarkId::BuyTab,
        LandmarkId::SellTab,
        LandmarkId::TransactionsTab,
        LandmarkId::SearchResults,
        LandmarkId::ItemWindow,
        LandmarkId::NoResults,
        LandmarkId::ConfirmDialog,
        LandmarkId::MapPrompt,
    ];

    /// File name of the template under the templates directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            LandmarkId::EscapeMenu => "escape_menu.png",
            LandmarkId::TradingPost => "trading_post.png",
            LandmarkId::BuyTab => "buy_tab.png",
            LandmarkId::SellTab => "sell_tab.png",
            LandmarkId::TransactionsTab => "transactions_tab.png",
            LandmarkId::SearchResults => "search_results.png",
            LandmarkId::ItemWindow => "item_window.png",
            LandmarkId::NoResults => "no_results.png",
            LandmarkId::ConfirmDialog => "confirm_dialog.png",
            LandmarkId::MapPrompt => "map_prompt.png",
        }
    }

    fn name(&self) -> String {
        format!("{:?}", self)
    }
}

/// The loaded landmark templates.
#[derive(Debug)]
pub struct LandmarkSet {
    templates: HashMap<LandmarkId, Template>,
    tolerance: f64,
}

impl LandmarkSet {
    /// Load every landmark from `dir`, failing on the first missing
    /// or unreadable file.
    pub fn load(dir: impl AsRef<Path>, tolerance: f64) -> LandmarkResult<Self> {
        let dir = dir.as_ref();
        let mut templates = HashMap::new();
        for id in LandmarkId::ALL {
            let path = dir.join(id.file_name());
            if !path.exists() {
                return Err(LandmarkError::Missing(path.display().to_string()));
            }
            templates.insert(id, Template::load(id.name(), &path)?);
        }
        debug!(dir = %dir.display(), count = templates.len(), "loaded landmarks");
        Ok(Self {
            templates,
            tolerance,
        })
    }

    /// Build a set from already-loaded templates (tests).
    pub fn from_templates(
        templates: HashMap<LandmarkId, Template>,
        tolerance: f64,
    ) -> Self {
        Self {
            templates,
            tolerance,
        }
    }

    /// Look a landmark up in a captured frame. Positions come back in
    /// the frame's own window-relative space.
    pub fn find(&self, shot: &Screenshot, id: LandmarkId) -> Option<Point> {
        let template = self.templates.get(&id)?;
        find_template(&shot.image, template, self.tolerance)
            .map(|p| p.offset(shot.region.x, shot.region.y))
    }

    /// Whether a landmark is visible in a captured frame.
    pub fn visible(&self, shot: &Screenshot, id: LandmarkId) -> bool {
        self.find(shot, id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipper_vision::capture::Region;
    use image::{Rgba, RgbaImage};

    fn marker(px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(3, 3, Rgba(px))
    }

    fn set_with(id: LandmarkId, image: RgbaImage) -> LandmarkSet {
        let mut templates = HashMap::new();
        templates.insert(id, Template::new(id.name(), image).unwrap());
        LandmarkSet::from_templates(templates, 1.0)
    }

    #[test]
    fn finds_landmark_in_frame_space() {
        let mut frame = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 255]));
        for y in 10..13 {
            for x in 20..23 {
                frame.put_pixel(x, y, Rgba([250, 10, 10, 255]));
            }
        }
        let shot = Screenshot::new(frame, Region::new(100, 200, 32, 32));
        let set = set_with(LandmarkId::EscapeMenu, marker([250, 10, 10, 255]));

        // offset by the capture region's origin
        let point = set.find(&shot, LandmarkId::EscapeMenu).unwrap();
        assert_eq!(point, Point::new(120, 210));
        assert!(set.visible(&shot, LandmarkId::EscapeMenu));
    }

    #[test]
    fn absent_landmark_is_not_visible() {
        let shot = Screenshot::new(
            RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255])),
            Region::new(0, 0, 16, 16),
        );
        let set = set_with(LandmarkId::TradingPost, marker([255, 255, 255, 255]));
        assert!(!set.visible(&shot, LandmarkId::TradingPost));
        // an unloaded landmark simply never matches
        assert!(set.find(&shot, LandmarkId::MapPrompt).is_none());
    }

    #[test]
    fn load_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LandmarkSet::load(dir.path(), 1.0).unwrap_err();
        assert!(matches!(err, LandmarkError::Missing(_)));
    }

    #[test]
    fn every_landmark_has_a_distinct_file() {
        let mut seen = std::collections::HashSet::new();
        for id in LandmarkId::ALL {
            assert!(seen.insert(id.file_name()), "duplicate: {}", id.file_name());
        }
    }
}
