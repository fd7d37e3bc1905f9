//! Trading post screens and fixed UI geometry.
//!
//! The trading post panel renders at a fixed internal layout, but the
//! panel itself can sit anywhere in the window, so every clickable
//! element here is positioned relative to the panel's landmark. The
//! state machine locates the landmark and adds its offset. The
//! defaults assume the default interface size; `Geometry`
//! deserializes, so a layout file can override any of them.

use crate::landmarks::LandmarkId;
use flipper_vision::capture::{Point, Region};
use serde::{Deserialize, Serialize};

/// Result rows visible in the search panel without scrolling.
pub const RESULT_ROWS: usize = 7;

/// The trading post tabs the bot navigates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Item search and buy orders
    Buy,
    /// Inventory sell listings
    Sell,
    /// Standing orders (for cancellation)
    Transactions,
}

impl Screen {
    /// Landmark proving this screen is frontmost.
    pub fn landmark(&self) -> LandmarkId {
        match self {
            Screen::Buy => LandmarkId::BuyTab,
            Screen::Sell => LandmarkId::SellTab,
            Screen::Transactions => LandmarkId::TransactionsTab,
        }
    }
}

/// Panel-relative positions of everything the bot clicks or reads.
/// The map prompt is the one exception: it is not part of the panel,
/// so its accept button is window-relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    /// Tab header click points
    pub buy_tab: Point,
    pub sell_tab: Point,
    pub transactions_tab: Point,

    /// Search text field
    pub search_field: Point,

    /// First rarity filter button and the per-entry vertical step
    pub rarity_filter_origin: Point,
    pub rarity_filter_step: i32,

    /// First result row and the per-row vertical step
    pub result_row_origin: Point,
    pub result_row_step: i32,

    /// Item name area within a result row, relative to the row origin
    pub row_name_offset: Point,
    pub row_name_size: (u32, u32),

    /// Price denomination fields in the item window (gold first; the
    /// silver and copper fields are one Tab away each)
    pub price_gold_field: Point,

    /// Buy/sell price display areas in the item window
    pub item_buy_price_region: Region,
    pub item_sell_price_region: Region,

    /// Item name area in the item window header, for OCR
    pub item_name_region: Region,

    /// Quantity field in the item window
    pub quantity_field: Point,

    /// Place order / list item button
    pub order_button: Point,

    /// Confirm dialog accept button
    pub confirm_button: Point,

    /// Close button of the item window
    pub item_close: Point,

    /// Accept button of a map travel prompt
    pub map_prompt_accept: Point,

    /// First sell-inventory slot and grid steps
    pub sell_slot_origin: Point,
    pub sell_slot_step: (i32, i32),

    /// Cancel button next to a transaction row
    pub transaction_cancel_offset: Point,
}

impl Geometry {
    /// Click point of a tab.
    pub fn tab_point(&self, screen: Screen) -> Point {
        match screen {
            Screen::Buy => self.buy_tab,
            Screen::Sell => self.sell_tab,
            Screen::Transactions => self.transactions_tab,
        }
    }

    /// Click point of the n-th rarity filter entry.
    pub fn rarity_filter_point(&self, index: usize) -> Point {
        self.rarity_filter_origin
            .offset(0, self.rarity_filter_step * index as i32)
    }

    /// Click point of result row `row` (0-based).
    pub fn result_row_point(&self, row: usize) -> Point {
        self.result_row_origin
            .offset(0, self.result_row_step * row as i32)
    }

    /// Name region of result row `row`, for OCR.
    pub fn result_name_region(&self, row: usize) -> Region {
        let origin = self.result_row_point(row);
        Region::new(
            origin.x + self.row_name_offset.x,
            origin.y + self.row_name_offset.y,
            self.row_name_size.0,
            self.row_name_size.1,
        )
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            buy_tab: Point::new(240, 120),
            sell_tab: Point::new(330, 120),
            transactions_tab: Point::new(430, 120),
            search_field: Point::new(340, 170),
            rarity_filter_origin: Point::new(140, 260),
            rarity_filter_step: 24,
            result_row_origin: Point::new(420, 230),
            result_row_step: 58,
            row_name_offset: Point::new(52, -14),
            row_name_size: (260, 28),
            price_gold_field: Point::new(560, 470),
            item_buy_price_region: Region::new(480, 340, 180, 24),
            item_sell_price_region: Region::new(480, 372, 180, 24),
            item_name_region: Region::new(470, 258, 220, 26),
            quantity_field: Point::new(470, 470),
            order_button: Point::new(600, 520),
            confirm_button: Point::new(520, 430),
            item_close: Point::new(700, 250),
            map_prompt_accept: Point::new(740, 520),
            sell_slot_origin: Point::new(160, 210),
            sell_slot_step: (52, 52),
            transaction_cancel_offset: Point::new(640, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_step_down_the_panel() {
        let g = Geometry::default();
        let first = g.result_row_point(0);
        let third = g.result_row_point(2);
        assert_eq!(third.x, first.x);
        assert_eq!(third.y, first.y + 2 * g.result_row_step);
    }

    #[test]
    fn name_region_tracks_its_row() {
        let g = Geometry::default();
        let r0 = g.result_name_region(0);
        let r1 = g.result_name_region(1);
        assert_eq!(r1.y - r0.y, g.result_row_step);
        assert_eq!(r0.width, g.row_name_size.0);
    }

    #[test]
    fn rarity_filter_walks_the_list() {
        let g = Geometry::default();
        let junk = g.rarity_filter_point(0);
        let exotic = g.rarity_filter_point(5);
        assert_eq!(exotic.y - junk.y, 5 * g.rarity_filter_step);
    }

    #[test]
    fn screens_map_to_their_landmarks() {
        assert_eq!(Screen::Buy.landmark(), LandmarkId::BuyTab);
        assert_eq!(Screen::Sell.landmark(), LandmarkId::SellTab);
        assert_eq!(Screen::Transactions.landmark(), LandmarkId::TransactionsTab);
    }
}
