//! Input simulation.
//!
//! The bot drives the target client exclusively through synthetic
//! mouse and keyboard events plus the system clipboard. Text entry is
//! always paste-based (set clipboard, Ctrl+V) because the client's
//! search field drops characters under synthetic typing; text
//! read-back is select-all plus Ctrl+C.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during input simulation.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Input simulation not available on this platform")]
    NotAvailable,

    #[error("Input simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Clipboard operation failed: {0}")]
    Clipboard(String),
}

/// Result type for input operations.
pub type InputResult<T> = Result<T, InputError>;

/// Search fields in the client silently truncate pasted text.
pub const MAX_PASTE_LEN: usize = 30;

/// The keys the bot ever sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Tab,
    Enter,
    Backspace,
    /// A printable character (movement keys, interact key)
    Char(char),
}

/// Delays inserted between synthetic events so the client's UI has
/// time to react.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Pause after moving the cursor
    pub after_move: Duration,
    /// Pause after a click
    pub after_click: Duration,
    /// Pause after a key press
    pub after_key: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            after_move: Duration::from_millis(50),
            after_click: Duration::from_millis(100),
            after_key: Duration::from_millis(50),
        }
    }
}

/// Trait over input backends so UI flows can run against a recording
/// simulator in tests. Coordinates are absolute screen coordinates;
/// callers translate from window space.
#[async_trait]
pub trait InputSimulator: Send + Sync {
    /// Check if input simulation is available on this platform.
    fn is_available(&self) -> bool;

    /// Move the cursor to absolute screen coordinates.
    async fn mouse_move(&self, x: i32, y: i32) -> InputResult<()>;

    /// Left-click at absolute screen coordinates.
    async fn click(&self, x: i32, y: i32) -> InputResult<()>;

    /// Double left-click at absolute screen coordinates.
    async fn double_click(&self, x: i32, y: i32) -> InputResult<()>;

    /// Press and release a key.
    async fn key_press(&self, key: Key) -> InputResult<()>;

    /// Press and release a key while Control is held.
    async fn ctrl_key(&self, key: Key) -> InputResult<()>;

    /// Replace the system clipboard contents.
    async fn set_clipboard(&self, text: &str) -> InputResult<()>;

    /// Read the system clipboard.
    async fn get_clipboard(&self) -> InputResult<String>;

    /// Paste text into the focused field via the clipboard,
    /// truncated to [`MAX_PASTE_LEN`] characters.
    async fn paste_text(&self, text: &str) -> InputResult<()> {
        let truncated: String = text.chars().take(MAX_PASTE_LEN).collect();
        self.set_clipboard(&truncated).await?;
        self.ctrl_key(Key::Char('v')).await
    }

    /// Copy whatever the focused field holds and return it.
    async fn copy_selection(&self) -> InputResult<String> {
        self.ctrl_key(Key::Char('a')).await?;
        self.ctrl_key(Key::Char('c')).await?;
        self.get_clipboard().await
    }

    async fn press_escape(&self) -> InputResult<()> {
        self.key_press(Key::Escape).await
    }

    async fn press_tab(&self) -> InputResult<()> {
        self.key_press(Key::Tab).await
    }

    async fn press_enter(&self) -> InputResult<()> {
        self.key_press(Key::Enter).await
    }
}

/// Platform implementation using enigo and arboard.
#[cfg(feature = "gui-automation")]
pub mod platform {
    use super::*;
    use enigo::{Button, Coordinate, Direction, Enigo, Key as EnigoKey, Keyboard, Mouse, Settings};
    use std::sync::Mutex;
    use tracing::trace;

    /// Enigo-backed input simulator with an arboard clipboard.
    pub struct EnigoInput {
        enigo: Mutex<Enigo>,
        clipboard: Mutex<arboard::Clipboard>,
        timing: Timing,
    }

    impl EnigoInput {
        pub fn new() -> InputResult<Self> {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| InputError::SimulationFailed(e.to_string()))?;
            let clipboard =
                arboard::Clipboard::new().map_err(|e| InputError::Clipboard(e.to_string()))?;
            Ok(Self {
                enigo: Mutex::new(enigo),
                clipboard: Mutex::new(clipboard),
                timing: Timing::default(),
            })
        }

        pub fn with_timing(mut self, timing: Timing) -> Self {
            self.timing = timing;
            self
        }

        fn convert_key(key: Key) -> EnigoKey {
            match key {
                Key::Escape => EnigoKey::Escape,
                Key::Tab => EnigoKey::Tab,
                Key::Enter => EnigoKey::Return,
                Key::Backspace => EnigoKey::Backspace,
                Key::Char(c) => EnigoKey::Unicode(c),
            }
        }

        fn lock_enigo(&self) -> InputResult<std::sync::MutexGuard<'_, Enigo>> {
            self.enigo
                .lock()
                .map_err(|e| InputError::SimulationFailed(format!("enigo lock poisoned: {}", e)))
        }
    }

    #[async_trait]
    impl InputSimulator for EnigoInput {
        fn is_available(&self) -> bool {
            true
        }

        async fn mouse_move(&self, x: i32, y: i32) -> InputResult<()> {
            {
                let mut enigo = self.lock_enigo()?;
                enigo
                    .move_mouse(x, y, Coordinate::Abs)
                    .map_err(|e| InputError::SimulationFailed(e.to_string()))?;
            }
            tokio::time::sleep(self.timing.after_move).await;
            Ok(())
        }

        async fn click(&self, x: i32, y: i32) -> InputResult<()> {
            self.mouse_move(x, y).await?;
            {
                let mut enigo = self.lock_enigo()?;
                enigo
                    .button(Button::Left, Direction::Click)
                    .map_err(|e| InputError::SimulationFailed(e.to_string()))?;
            }
            trace!(x, y, "click");
            tokio::time::sleep(self.timing.after_click).await;
            Ok(())
        }

        async fn double_click(&self, x: i32, y: i32) -> InputResult<()> {
            self.mouse_move(x, y).await?;
            {
                let mut enigo = self.lock_enigo()?;
                for _ in 0..2 {
                    enigo
                        .button(Button::Left, Direction::Click)
                        .map_err(|e| InputError::SimulationFailed(e.to_string()))?;
                }
            }
            tokio::time::sleep(self.timing.after_click).await;
            Ok(())
        }

        async fn key_press(&self, key: Key) -> InputResult<()> {
            {
                let mut enigo = self.lock_enigo()?;
                enigo
                    .key(Self::convert_key(key), Direction::Click)
                    .map_err(|e| InputError::SimulationFailed(e.to_string()))?;
            }
            tokio::time::sleep(self.timing.after_key).await;
            Ok(())
        }

        async fn ctrl_key(&self, key: Key) -> InputResult<()> {
            {
                let mut enigo = self.lock_enigo()?;
                enigo
                    .key(EnigoKey::Control, Direction::Press)
                    .map_err(|e| InputError::SimulationFailed(e.to_string()))?;
                let result = enigo.key(Self::convert_key(key), Direction::Click);
                // always release the modifier, even on failure
                let release = enigo.key(EnigoKey::Control, Direction::Release);
                result.map_err(|e| InputError::SimulationFailed(e.to_string()))?;
                release.map_err(|e| InputError::SimulationFailed(e.to_string()))?;
            }
            tokio::time::sleep(self.timing.after_key).await;
            Ok(())
        }

        async fn set_clipboard(&self, text: &str) -> InputResult<()> {
            let mut clipboard = self
                .clipboard
                .lock()
                .map_err(|e| InputError::Clipboard(format!("clipboard lock poisoned: {}", e)))?;
            clipboard
                .set_text(text)
                .map_err(|e| InputError::Clipboard(e.to_string()))
        }

        async fn get_clipboard(&self) -> InputResult<String> {
            let mut clipboard = self
                .clipboard
                .lock()
                .map_err(|e| InputError::Clipboard(format!("clipboard lock poisoned: {}", e)))?;
            clipboard
                .get_text()
                .map_err(|e| InputError::Clipboard(e.to_string()))
        }
    }
}

/// Create the default input simulator for the current platform.
#[cfg(feature = "gui-automation")]
pub fn create_input_simulator() -> InputResult<impl InputSimulator> {
    platform::EnigoInput::new()
}

/// Recording simulator for tests.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Every event a [`RecordingInput`] observed.
    #[derive(Debug, Clone, PartialEq)]
    pub enum InputEvent {
        MouseMove(i32, i32),
        Click(i32, i32),
        DoubleClick(i32, i32),
        KeyPress(Key),
        CtrlKey(Key),
        SetClipboard(String),
    }

    /// Records events instead of sending them; clipboard reads are
    /// served from a script, falling back to whatever was last set.
    #[derive(Default)]
    pub struct RecordingInput {
        events: Mutex<Vec<InputEvent>>,
        clipboard: Mutex<String>,
        clipboard_script: Mutex<Vec<String>>,
    }

    impl RecordingInput {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a value to be returned by the next clipboard read.
        pub fn push_clipboard(&self, text: impl Into<String>) {
            self.clipboard_script.lock().unwrap().push(text.into());
        }

        /// All recorded events so far.
        pub fn events(&self) -> Vec<InputEvent> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: InputEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl InputSimulator for RecordingInput {
        fn is_available(&self) -> bool {
            true
        }

        async fn mouse_move(&self, x: i32, y: i32) -> InputResult<()> {
            self.record(InputEvent::MouseMove(x, y));
            Ok(())
        }

        async fn click(&self, x: i32, y: i32) -> InputResult<()> {
            self.record(InputEvent::Click(x, y));
            Ok(())
        }

        async fn double_click(&self, x: i32, y: i32) -> InputResult<()> {
            self.record(InputEvent::DoubleClick(x, y));
            Ok(())
        }

        async fn key_press(&self, key: Key) -> InputResult<()> {
            self.record(InputEvent::KeyPress(key));
            Ok(())
        }

        async fn ctrl_key(&self, key: Key) -> InputResult<()> {
            self.record(InputEvent::CtrlKey(key));
            Ok(())
        }

        async fn set_clipboard(&self, text: &str) -> InputResult<()> {
            self.record(InputEvent::SetClipboard(text.to_string()));
            *self.clipboard.lock().unwrap() = text.to_string();
            Ok(())
        }

        async fn get_clipboard(&self) -> InputResult<String> {
            let mut script = self.clipboard_script.lock().unwrap();
            if script.is_empty() {
                Ok(self.clipboard.lock().unwrap().clone())
            } else {
                Ok(script.remove(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{InputEvent, RecordingInput};
    use super::*;

    #[tokio::test]
    async fn paste_truncates_to_field_limit() {
        let input = RecordingInput::new();
        let long = "a".repeat(40);
        input.paste_text(&long).await.unwrap();

        let events = input.events();
        assert_eq!(
            events[0],
            InputEvent::SetClipboard("a".repeat(MAX_PASTE_LEN))
        );
        assert_eq!(events[1], InputEvent::CtrlKey(Key::Char('v')));
    }

    #[tokio::test]
    async fn paste_truncation_counts_chars_not_bytes() {
        let input = RecordingInput::new();
        let name = "é".repeat(35);
        input.paste_text(&name).await.unwrap();

        match &input.events()[0] {
            InputEvent::SetClipboard(text) => {
                assert_eq!(text.chars().count(), MAX_PASTE_LEN);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn copy_selection_selects_then_copies() {
        let input = RecordingInput::new();
        input.push_clipboard("1234");
        let text = input.copy_selection().await.unwrap();
        assert_eq!(text, "1234");

        let events = input.events();
        assert_eq!(events[0], InputEvent::CtrlKey(Key::Char('a')));
        assert_eq!(events[1], InputEvent::CtrlKey(Key::Char('c')));
    }

    #[tokio::test]
    async fn clipboard_falls_back_to_last_set() {
        let input = RecordingInput::new();
        input.set_clipboard("hello").await.unwrap();
        assert_eq!(input.get_clipboard().await.unwrap(), "hello");
    }
}
