//! The trading post state machine.
//!
//! Every interaction with the client follows the same shape: act,
//! then poll for the landmark that proves the UI reacted, then act
//! again. Nothing is assumed to have happened until a capture shows
//! it. All flows are bounded; a landmark that never appears is an
//! error for the orchestrator to recover from, not a hang.

use crate::diag::DiagSink;
use crate::landmarks::{LandmarkId, LandmarkSet};
use crate::poll::{poll_until, PollError};
use crate::screens::{Geometry, Screen, RESULT_ROWS};
use flipper_market::{CandidateItem, Coins, Rarity};
use flipper_vision::capture::{CaptureError, Point, Region, ScreenCapture, Screenshot, WindowInfo};
use flipper_vision::input::{InputSimulator, Key};
use flipper_vision::ocr::{OcrEngine, OcrError, OcrMode};
use flipper_vision::preprocess::{prepare_name, prepare_numeric};
use flipper_vision::verify::NameVerifier;
use image::Rgba;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Escape presses before giving up on resetting the UI.
pub const MAX_RESET_ESCAPES: u32 = 10;

/// Attempts for act-then-verify flows.
const MAX_FLOW_ATTEMPTS: u32 = 5;

/// Errors from UI flows.
#[derive(Error, Debug)]
pub enum MachineError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Input failed: {0}")]
    Input(#[from] flipper_vision::input::InputError),

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Landmark {landmark:?} did not appear within {timeout:?}")]
    LandmarkTimeout {
        landmark: LandmarkId,
        timeout: Duration,
    },

    #[error("Landmark {landmark:?} did not disappear within {timeout:?}")]
    LandmarkStuck {
        landmark: LandmarkId,
        timeout: Duration,
    },

    #[error("UI reset failed after {0} escapes")]
    ResetFailed(u32),

    #[error("Trading post panel position is unknown")]
    AnchorLost,

    #[error("Item '{0}' not found in search results")]
    ItemNotInResults(String),

    #[error("Price field read back '{got}' after writing '{want}'")]
    PriceReadback { want: String, got: String },
}

/// Result type for UI flows.
pub type MachineResult<T> = Result<T, MachineError>;

/// Whether an error means the client itself is gone (fatal) or just
/// that a flow failed (recoverable via a UI reset).
pub fn is_fatal(err: &MachineError) -> bool {
    matches!(
        err,
        MachineError::Capture(CaptureError::WindowGone(_))
            | MachineError::Capture(CaptureError::WindowNotFound(_))
    )
}

/// Drives the trading post UI through capture, OCR and input.
pub struct TradeMachine<C, I, O> {
    capture: C,
    input: I,
    ocr: O,
    landmarks: LandmarkSet,
    geometry: Geometry,
    verifier: NameVerifier,
    diag: DiagSink,
    window: WindowInfo,
    poll_timeout: Duration,
    poll_interval: Duration,
    /// Where the trading post panel's landmark last appeared. All
    /// panel geometry is offset by this; `None` until the panel has
    /// been sighted.
    anchor: Option<Point>,
}

impl<C, I, O> TradeMachine<C, I, O>
where
    C: ScreenCapture,
    I: InputSimulator,
    O: OcrEngine,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture: C,
        input: I,
        ocr: O,
        landmarks: LandmarkSet,
        geometry: Geometry,
        verifier: NameVerifier,
        diag: DiagSink,
        window: WindowInfo,
        poll_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            capture,
            input,
            ocr,
            landmarks,
            geometry,
            verifier,
            diag,
            window,
            poll_timeout,
            poll_interval,
            anchor: None,
        }
    }

    /// The window this machine is attached to.
    pub fn window(&self) -> &WindowInfo {
        &self.window
    }

    /// The name verifier, for persisting its mismatch log.
    pub fn verifier_mut(&mut self) -> &mut NameVerifier {
        &mut self.verifier
    }

    /// Re-locate the target window; the fatal-error probe.
    pub async fn refresh_window(&mut self) -> MachineResult<()> {
        self.window = self
            .capture
            .find_window(&self.window.process_name)
            .await?;
        Ok(())
    }

    fn to_screen(&self, p: Point) -> (i32, i32) {
        (self.window.region.x + p.x, self.window.region.y + p.y)
    }

    async fn click_at(&self, p: Point) -> MachineResult<()> {
        let (x, y) = self.to_screen(p);
        self.input.click(x, y).await?;
        Ok(())
    }

    fn anchor(&self) -> MachineResult<Point> {
        self.anchor.ok_or(MachineError::AnchorLost)
    }

    /// Translate a panel-relative point into window space.
    fn ui_point(&self, p: Point) -> MachineResult<Point> {
        let at = self.anchor()?;
        Ok(p.offset(at.x, at.y))
    }

    /// Translate a panel-relative region into window space.
    fn ui_region(&self, r: Region) -> MachineResult<Region> {
        let at = self.anchor()?;
        Ok(r.offset(at.x, at.y))
    }

    async fn click_ui(&self, p: Point) -> MachineResult<()> {
        let p = self.ui_point(p)?;
        self.click_at(p).await
    }

    #[cfg(test)]
    fn set_anchor(&mut self, anchor: Option<Point>) {
        self.anchor = anchor;
    }

    async fn frame(&self) -> MachineResult<Screenshot> {
        Ok(self.capture.capture_window(self.window.id).await?)
    }

    /// Poll until a landmark shows up, returning where.
    pub async fn wait_for(&self, landmark: LandmarkId) -> MachineResult<Point> {
        let found = poll_until(self.poll_timeout, self.poll_interval, || async {
            match self.capture.capture_window(self.window.id).await {
                Ok(shot) => self.landmarks.find(&shot, landmark),
                // transient capture failures just mean "not yet"
                Err(_) => None,
            }
        })
        .await;

        match found {
            Ok(point) => Ok(point),
            Err(PollError::TimedOut(timeout)) => {
                if let Ok(shot) = self.frame().await {
                    self.diag.save_best_effort("landmark_timeout", &shot);
                }
                Err(MachineError::LandmarkTimeout { landmark, timeout })
            }
        }
    }

    /// Poll until any of several landmarks shows up, returning which
    /// one and where.
    pub async fn wait_for_any(
        &self,
        landmarks: &[LandmarkId],
    ) -> MachineResult<(LandmarkId, Point)> {
        let found = poll_until(self.poll_timeout, self.poll_interval, || async {
            match self.capture.capture_window(self.window.id).await {
                Ok(shot) => landmarks
                    .iter()
                    .find_map(|&id| self.landmarks.find(&shot, id).map(|p| (id, p))),
                Err(_) => None,
            }
        })
        .await;

        match found {
            Ok(hit) => Ok(hit),
            Err(PollError::TimedOut(timeout)) => {
                if let Ok(shot) = self.frame().await {
                    self.diag.save_best_effort("landmark_timeout", &shot);
                }
                Err(MachineError::LandmarkTimeout {
                    landmark: landmarks.first().copied().unwrap_or(LandmarkId::TradingPost),
                    timeout,
                })
            }
        }
    }

    /// Poll until a landmark is gone.
    pub async fn wait_gone(&self, landmark: LandmarkId) -> MachineResult<()> {
        poll_until(self.poll_timeout, self.poll_interval, || async {
            match self.capture.capture_window(self.window.id).await {
                Ok(shot) if !self.landmarks.visible(&shot, landmark) => Some(()),
                _ => None,
            }
        })
        .await
        .map_err(|PollError::TimedOut(timeout)| MachineError::LandmarkStuck { landmark, timeout })
    }

    /// Close every open window by spamming Escape until the escape
    /// menu shows, then close the menu itself. Bounded at
    /// [`MAX_RESET_ESCAPES`] presses.
    pub async fn reset_ui(&mut self) -> MachineResult<()> {
        // whatever held the panel on screen is about to be closed
        self.anchor = None;
        for attempt in 1..=MAX_RESET_ESCAPES {
            let shot = self.frame().await?;
            if self.landmarks.visible(&shot, LandmarkId::EscapeMenu) {
                // all windows are closed; dismiss the menu
                self.input.press_escape().await?;
                debug!(attempt, "ui reset complete");
                return Ok(());
            }
            self.input.press_escape().await?;
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(MachineError::ResetFailed(MAX_RESET_ESCAPES))
    }

    /// Open the trading post, retrying the keybind until its window
    /// appears. Its landmark position becomes the anchor for every
    /// panel-relative click that follows.
    pub async fn open_trading_post(&mut self) -> MachineResult<()> {
        let shot = self.frame().await?;
        if let Some(at) = self.landmarks.find(&shot, LandmarkId::TradingPost) {
            self.anchor = Some(at);
            return Ok(());
        }
        let mut last = None;
        for _ in 0..MAX_FLOW_ATTEMPTS {
            self.input.key_press(Key::Char('o')).await?;
            match self.wait_for(LandmarkId::TradingPost).await {
                Ok(at) => {
                    self.anchor = Some(at);
                    return Ok(());
                }
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or(MachineError::ResetFailed(0)))
    }

    /// Bring a trading post tab to the front. The panel may have been
    /// dragged since the last flow, so its landmark is re-located on
    /// every call.
    pub async fn goto_screen(&mut self, screen: Screen) -> MachineResult<()> {
        let shot = self.frame().await?;
        let at = self
            .landmarks
            .find(&shot, LandmarkId::TradingPost)
            .ok_or(MachineError::AnchorLost)?;
        self.anchor = Some(at);

        if self.landmarks.visible(&shot, screen.landmark()) {
            return Ok(());
        }
        let mut last = None;
        for _ in 0..MAX_FLOW_ATTEMPTS {
            self.click_ui(self.geometry.tab_point(screen)).await?;
            match self.wait_for(screen.landmark()).await {
                Ok(_) => return Ok(()),
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or(MachineError::ResetFailed(0)))
    }

    /// Search for an item by name and rarity filter. Returns whether
    /// the search produced any result rows.
    pub async fn search_item(&mut self, name: &str, rarity: Rarity) -> MachineResult<bool> {
        self.goto_screen(Screen::Buy).await?;

        self.click_ui(self.geometry.search_field).await?;
        self.input.ctrl_key(Key::Char('a')).await?;
        self.input.paste_text(name).await?;
        self.input.press_enter().await?;

        self.click_ui(self.geometry.rarity_filter_point(rarity.filter_index()))
            .await?;

        match self
            .wait_for_any(&[LandmarkId::SearchResults, LandmarkId::NoResults])
            .await?
        {
            (LandmarkId::NoResults, _) => {
                debug!(item = name, "search came back empty");
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// OCR the item name of one result row.
    pub async fn read_row_name(&self, row: usize, rarity: Rarity) -> MachineResult<String> {
        let region = self.ui_region(self.geometry.result_name_region(row))?;
        self.read_name_in(region, rarity).await
    }

    /// OCR the item name off the open item window's header.
    pub async fn read_item_name(&self, rarity: Rarity) -> MachineResult<String> {
        let region = self.ui_region(self.geometry.item_name_region)?;
        self.read_name_in(region, rarity).await
    }

    /// Whether the open item window's header shows the given name,
    /// through the verifier's correction table.
    pub async fn item_window_shows(&mut self, name: &str, rarity: Rarity) -> MachineResult<bool> {
        let recognized = match self.read_item_name(rarity).await {
            Ok(text) => text,
            Err(MachineError::Ocr(OcrError::NoText)) => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(self.verifier.verify(name, &recognized).is_accepted())
    }

    async fn read_name_in(&self, region: Region, rarity: Rarity) -> MachineResult<String> {
        let shot = self
            .capture
            .capture_region(self.window.id, region)
            .await?;
        let [r, g, b] = rarity.name_color();
        let prepared = prepare_name(&shot.image, Rgba([r, g, b, 255]));
        let text = self.ocr.recognize(&prepared, OcrMode::ItemName).await?;
        Ok(text.text)
    }

    /// Scan the visible result rows for the candidate's verified
    /// name. Returns the 0-based row index.
    pub async fn find_item_row(&mut self, item: &CandidateItem) -> MachineResult<usize> {
        for row in 0..RESULT_ROWS {
            let recognized = match self.read_row_name(row, item.rarity).await {
                Ok(text) => text,
                // an unreadable row is an empty row; the results ran out
                Err(MachineError::Ocr(OcrError::NoText)) => break,
                Err(e) => return Err(e),
            };

            if self.verifier.verify(&item.name, &recognized).is_accepted() {
                debug!(row, item = %item.name, "candidate located in results");
                return Ok(row);
            }
            warn!(row, want = %item.name, got = %recognized, "row name did not verify");
        }

        if let Ok(shot) = self.frame().await {
            self.diag.save_best_effort("item_not_in_results", &shot);
        }
        Err(MachineError::ItemNotInResults(item.name.clone()))
    }

    /// Open the item window for a result row.
    pub async fn open_row(&self, row: usize) -> MachineResult<()> {
        self.click_ui(self.geometry.result_row_point(row)).await?;
        self.wait_for(LandmarkId::ItemWindow).await?;
        Ok(())
    }

    /// Close the item window.
    pub async fn close_item_window(&self) -> MachineResult<()> {
        self.click_ui(self.geometry.item_close).await?;
        self.wait_gone(LandmarkId::ItemWindow).await
    }

    /// OCR the listed buy/sell prices off the open item window.
    pub async fn read_item_prices(&self) -> MachineResult<(i64, i64)> {
        let shot = self.frame().await?;
        let buy = shot.crop(self.ui_region(self.geometry.item_buy_price_region)?)?;
        let sell = shot.crop(self.ui_region(self.geometry.item_sell_price_region)?)?;

        let buy_text = self
            .ocr
            .recognize(&prepare_numeric(&buy.image), OcrMode::Numeric)
            .await?;
        let sell_text = self
            .ocr
            .recognize(&prepare_numeric(&sell.image), OcrMode::Numeric)
            .await?;

        Ok((
            buy_text.as_number().unwrap_or(0) as i64,
            sell_text.as_number().unwrap_or(0) as i64,
        ))
    }

    /// Read the order price fields via the clipboard: select-copy the
    /// gold field, Tab to silver, Tab to copper.
    pub async fn read_order_price(&self) -> MachineResult<Coins> {
        self.click_ui(self.geometry.price_gold_field).await?;

        let mut parts = [0i64; 3];
        for (i, part) in parts.iter_mut().enumerate() {
            if i > 0 {
                self.input.press_tab().await?;
            }
            let text = self.input.copy_selection().await?;
            *part = text.trim().parse().unwrap_or(0);
        }

        Ok(Coins::from_denominations(parts[0], parts[1], parts[2]))
    }

    /// Write the order price into the three denomination fields.
    pub async fn set_order_price(&self, price: Coins) -> MachineResult<()> {
        self.click_ui(self.geometry.price_gold_field).await?;

        let parts = [price.gold(), price.silver(), price.copper()];
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.input.press_tab().await?;
            }
            self.input.ctrl_key(Key::Char('a')).await?;
            self.input.paste_text(&part.to_string()).await?;
        }
        Ok(())
    }

    /// Write the order price, then read it back. A mismatch means
    /// focus drifted and the order must not be placed.
    pub async fn set_order_price_verified(&self, price: Coins) -> MachineResult<()> {
        self.set_order_price(price).await?;
        let got = self.read_order_price().await?;
        if got != price {
            return Err(MachineError::PriceReadback {
                want: price.to_string(),
                got: got.to_string(),
            });
        }
        Ok(())
    }

    /// Write the order quantity.
    pub async fn set_quantity(&self, quantity: u32) -> MachineResult<()> {
        self.click_ui(self.geometry.quantity_field).await?;
        self.input.ctrl_key(Key::Char('a')).await?;
        self.input.paste_text(&quantity.to_string()).await?;
        Ok(())
    }

    /// Place the order in the open item window: quantity, price,
    /// order button, confirm.
    pub async fn place_order(&self, price: Coins, quantity: u32) -> MachineResult<()> {
        self.set_quantity(quantity).await?;
        self.set_order_price_verified(price).await?;

        self.click_ui(self.geometry.order_button).await?;
        self.wait_for(LandmarkId::ConfirmDialog).await?;
        self.click_ui(self.geometry.confirm_button).await?;
        self.wait_gone(LandmarkId::ConfirmDialog).await?;
        info!(%price, quantity, "order placed");
        Ok(())
    }

    /// Open the item window for an inventory slot on the sell tab.
    /// Returns `false` when nothing is in the slot.
    pub async fn open_sell_slot(&self, slot: usize) -> MachineResult<bool> {
        let origin = self.geometry.sell_slot_origin;
        let (dx, dy) = self.geometry.sell_slot_step;
        // slots fill left to right, eight per row
        let point = self.ui_point(origin.offset(dx * (slot % 8) as i32, dy * (slot / 8) as i32))?;
        let (x, y) = self.to_screen(point);
        self.input.double_click(x, y).await?;

        match self.wait_for(LandmarkId::ItemWindow).await {
            Ok(_) => Ok(true),
            Err(MachineError::LandmarkTimeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List the item in the open item window at a price.
    pub async fn list_item(&self, price: Coins) -> MachineResult<()> {
        self.set_order_price_verified(price).await?;
        self.click_ui(self.geometry.order_button).await?;
        self.wait_for(LandmarkId::ConfirmDialog).await?;
        self.click_ui(self.geometry.confirm_button).await?;
        self.wait_gone(LandmarkId::ConfirmDialog).await?;
        info!(%price, "listing placed");
        Ok(())
    }

    /// Cancel the transaction shown at a row of the transactions tab.
    pub async fn cancel_transaction_row(&mut self, row: usize) -> MachineResult<()> {
        self.goto_screen(Screen::Transactions).await?;

        let base = self.geometry.result_row_point(row);
        let offset = self.geometry.transaction_cancel_offset;
        self.click_ui(Point::new(offset.x, base.y + offset.y)).await?;
        self.wait_for(LandmarkId::ConfirmDialog).await?;
        self.click_ui(self.geometry.confirm_button).await?;
        self.wait_gone(LandmarkId::ConfirmDialog).await?;
        Ok(())
    }

    /// Accept a blocking map travel prompt if one is up. Returns
    /// whether a prompt was handled.
    pub async fn handle_map_prompt(&self) -> MachineResult<bool> {
        let shot = self.frame().await?;
        if !self.landmarks.visible(&shot, LandmarkId::MapPrompt) {
            return Ok(false);
        }
        info!("accepting map travel prompt");
        self.click_at(self.geometry.map_prompt_accept).await?;
        self.wait_gone(LandmarkId::MapPrompt).await?;
        Ok(true)
    }

    /// Nudge the character so the client does not log us out for
    /// inactivity.
    pub async fn anti_afk(&self) -> MachineResult<()> {
        debug!("anti-afk nudge");
        self.input.key_press(Key::Char('s')).await?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.input.key_press(Key::Char('w')).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkSet;
    use flipper_vision::capture::mock::MockCapture;
    use flipper_vision::capture::Region;
    use flipper_vision::input::mock::{InputEvent, RecordingInput};
    use flipper_vision::ocr::mock::MockOcr;
    use flipper_vision::template::Template;
    use flipper_vision::verify::NameVerifier;
    use image::RgbaImage;
    use std::collections::HashMap;

    const W: u32 = 800;
    const H: u32 = 600;

    fn blank() -> RgbaImage {
        RgbaImage::from_pixel(W, H, Rgba([0, 0, 0, 255]))
    }

    fn marker_color(id: LandmarkId) -> [u8; 4] {
        // a distinct color per landmark keeps the fake frames simple
        let n = LandmarkId::ALL.iter().position(|l| *l == id).unwrap() as u8;
        [255, 10 + n * 20, 10, 255]
    }

    fn with_landmark(mut frame: RgbaImage, id: LandmarkId, at: (u32, u32)) -> RgbaImage {
        let c = marker_color(id);
        for y in at.1..at.1 + 3 {
            for x in at.0..at.0 + 3 {
                frame.put_pixel(x, y, Rgba(c));
            }
        }
        frame
    }

    fn landmark_set() -> LandmarkSet {
        let mut templates = HashMap::new();
        for id in LandmarkId::ALL {
            let image = RgbaImage::from_pixel(3, 3, Rgba(marker_color(id)));
            templates.insert(id, Template::new(format!("{:?}", id), image).unwrap());
        }
        LandmarkSet::from_templates(templates, 1.0)
    }

    fn machine(
        capture: MockCapture,
        input: RecordingInput,
        ocr: MockOcr,
    ) -> TradeMachine<MockCapture, RecordingInput, MockOcr> {
        let dir = tempfile::tempdir().unwrap();
        let mut m = TradeMachine::new(
            capture,
            input,
            ocr,
            landmark_set(),
            Geometry::default(),
            NameVerifier::default(),
            DiagSink::new(dir.into_path()),
            WindowInfo {
                id: 1,
                title: "mock".to_string(),
                process_name: "mock".to_string(),
                region: Region::new(0, 0, W as u32, H as u32),
            },
            Duration::from_millis(500),
            Duration::from_millis(50),
        );
        // most tests exercise flows past the point where the panel
        // was located at the window origin
        m.set_anchor(Some(Point::new(0, 0)));
        m
    }

    fn count_escapes(events: &[InputEvent]) -> usize {
        events
            .iter()
            .filter(|e| **e == InputEvent::KeyPress(Key::Escape))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn reset_ui_closes_menu_when_it_appears() {
        let capture = MockCapture::new(blank());
        // second frame shows the escape menu
        capture.push_frame(with_landmark(blank(), LandmarkId::EscapeMenu, (50, 50)));

        let mut m = machine(capture, RecordingInput::new(), MockOcr::new());
        m.reset_ui().await.unwrap();

        // one escape to surface the menu, one to dismiss it
        assert_eq!(count_escapes(&m.input.events()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_ui_gives_up_after_ten_escapes() {
        let mut m = machine(MockCapture::new(blank()), RecordingInput::new(), MockOcr::new());
        let err = m.reset_ui().await.unwrap_err();
        assert!(matches!(err, MachineError::ResetFailed(10)));
        assert_eq!(count_escapes(&m.input.events()), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_ui_forgets_panel_position() {
        let capture = MockCapture::new(with_landmark(blank(), LandmarkId::EscapeMenu, (50, 50)));
        let mut m = machine(capture, RecordingInput::new(), MockOcr::new());
        m.reset_ui().await.unwrap();

        // the panel was closed with everything else
        let err = m.set_quantity(5).await.unwrap_err();
        assert!(matches!(err, MachineError::AnchorLost));
        assert!(!is_fatal(&err));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_on_absent_landmark() {
        let m = machine(MockCapture::new(blank()), RecordingInput::new(), MockOcr::new());
        let err = m.wait_for(LandmarkId::TradingPost).await.unwrap_err();
        assert!(matches!(
            err,
            MachineError::LandmarkTimeout {
                landmark: LandmarkId::TradingPost,
                ..
            }
        ));
        assert!(!is_fatal(&err));
    }

    #[tokio::test(start_paused = true)]
    async fn goto_screen_is_idempotent_when_already_there() {
        let frame = with_landmark(
            with_landmark(blank(), LandmarkId::TradingPost, (0, 0)),
            LandmarkId::SellTab,
            (10, 10),
        );
        let mut m = machine(MockCapture::new(frame), RecordingInput::new(), MockOcr::new());
        m.goto_screen(Screen::Sell).await.unwrap();
        // already frontmost: no clicks sent
        assert!(m.input.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn goto_screen_fails_when_panel_is_gone() {
        let mut m = machine(MockCapture::new(blank()), RecordingInput::new(), MockOcr::new());
        let err = m.goto_screen(Screen::Buy).await.unwrap_err();
        assert!(matches!(err, MachineError::AnchorLost));
    }

    #[tokio::test(start_paused = true)]
    async fn panel_position_offsets_tab_clicks() {
        // panel dragged to (40, 60): the buy tab click must follow it
        let base = with_landmark(blank(), LandmarkId::TradingPost, (40, 60));
        let capture = MockCapture::new(base.clone());
        capture.push_frame(with_landmark(base, LandmarkId::BuyTab, (5, 5)));

        let mut m = machine(capture, RecordingInput::new(), MockOcr::new());
        m.goto_screen(Screen::Buy).await.unwrap();

        let tab = Geometry::default().tab_point(Screen::Buy);
        assert_eq!(
            m.input.events()[0],
            InputEvent::Click(tab.x + 40, tab.y + 60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panel_clicks_fail_when_panel_never_located() {
        let mut m = machine(MockCapture::new(blank()), RecordingInput::new(), MockOcr::new());
        m.set_anchor(None);
        let err = m.set_quantity(5).await.unwrap_err();
        assert!(matches!(err, MachineError::AnchorLost));
        // nothing was clicked blind
        assert!(m.input.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn search_reports_empty_results() {
        let panel = with_landmark(
            with_landmark(blank(), LandmarkId::TradingPost, (0, 0)),
            LandmarkId::BuyTab,
            (10, 10),
        );
        let capture = MockCapture::new(panel.clone());
        capture.push_frame(with_landmark(panel, LandmarkId::NoResults, (100, 100)));

        let mut m = machine(capture, RecordingInput::new(), MockOcr::new());
        let found = m.search_item("Qqqqxyzzy", Rarity::Basic).await.unwrap();
        assert!(!found);
    }

    #[tokio::test(start_paused = true)]
    async fn read_order_price_walks_three_fields() {
        let input = RecordingInput::new();
        input.push_clipboard("2");
        input.push_clipboard("34");
        input.push_clipboard("56");

        let m = machine(MockCapture::new(blank()), input, MockOcr::new());
        let price = m.read_order_price().await.unwrap();
        assert_eq!(price, Coins(23456));

        let events = m.input.events();
        // two tabs between the three reads
        let tabs = events
            .iter()
            .filter(|e| **e == InputEvent::KeyPress(Key::Tab))
            .count();
        assert_eq!(tabs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn price_readback_mismatch_is_an_error() {
        let input = RecordingInput::new();
        // read-back returns something else entirely
        input.push_clipboard("9");
        input.push_clipboard("99");
        input.push_clipboard("99");

        let m = machine(MockCapture::new(blank()), input, MockOcr::new());
        let err = m.set_order_price_verified(Coins(23456)).await.unwrap_err();
        assert!(matches!(err, MachineError::PriceReadback { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn find_item_row_scans_until_verified() {
        let ocr = MockOcr::new();
        ocr.push_text("Wrong Item");
        ocr.push_text("Glob of Ectoplasm");

        let mut m = machine(MockCapture::new(blank()), RecordingInput::new(), ocr);
        let item = CandidateItem {
            id: 19721,
            name: "Glob of Ectoplasm".to_string(),
            rarity: Rarity::Exotic,
            buy_price: 2500,
            sell_price: 3000,
            sold_daily: 4800,
            profit: 50,
        };
        assert_eq!(m.find_item_row(&item).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn find_item_row_stops_at_empty_row() {
        let ocr = MockOcr::new();
        ocr.push_text("Wrong Item");
        // queue exhausted afterwards: the mock reports NoText, which
        // the scan reads as "results ran out"

        let mut m = machine(MockCapture::new(blank()), RecordingInput::new(), ocr);
        let item = CandidateItem {
            id: 1,
            name: "Copper Ore".to_string(),
            rarity: Rarity::Basic,
            buy_price: 10,
            sell_price: 20,
            sold_daily: 100,
            profit: 5,
        };
        let err = m.find_item_row(&item).await.unwrap_err();
        assert!(matches!(err, MachineError::ItemNotInResults(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn map_prompt_is_accepted_once_seen() {
        let capture = MockCapture::new(with_landmark(blank(), LandmarkId::MapPrompt, (30, 30)));
        capture.push_frame(blank());
        let m = machine(capture, RecordingInput::new(), MockOcr::new());

        assert!(m.handle_map_prompt().await.unwrap());
        let clicks = m
            .input
            .events()
            .iter()
            .filter(|e| matches!(e, InputEvent::Click(..)))
            .count();
        assert_eq!(clicks, 1);

        // prompt gone: nothing to do
        assert!(!m.handle_map_prompt().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn anti_afk_taps_back_and_forward() {
        let m = machine(MockCapture::new(blank()), RecordingInput::new(), MockOcr::new());
        m.anti_afk().await.unwrap();
        let events = m.input.events();
        assert_eq!(events[0], InputEvent::KeyPress(Key::Char('s')));
        assert_eq!(events[1], InputEvent::KeyPress(Key::Char('w')));
    }
}
