//! Input event translation to wire messages.
//!
//! The translator is a pure state machine over pointer button state and held
//! modifiers. It decides, per event, whether the event becomes wire messages,
//! a local UI action, or an error the caller logs and drops. Ownership gating
//! is not done here: the session actor checks control ownership at dispatch
//! time before asking for a translation.

mod keymap;

pub use keymap::{lookup_keysym, KEYSYM_VOID};

use crate::error::{Error, Result};
use crate::protocol::{KeyEventPayload, Message, PointerEventPayload};

// Button-mask bit positions, matching the remote framebuffer pointer event.
const BUTTON_LEFT: u8 = 1 << 0;
const BUTTON_MIDDLE: u8 = 1 << 1;
const BUTTON_RIGHT: u8 = 1 << 2;
const BUTTON_SCROLL_UP: u8 = 1 << 3;
const BUTTON_SCROLL_DOWN: u8 = 1 << 4;
const BUTTON_SCROLL_LEFT: u8 = 1 << 5;
const BUTTON_SCROLL_RIGHT: u8 = 1 << 6;

/// A physical pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

impl PointerButton {
    fn mask_bit(self) -> u8 {
        match self {
            PointerButton::Left => BUTTON_LEFT,
            PointerButton::Middle => BUTTON_MIDDLE,
            PointerButton::Right => BUTTON_RIGHT,
        }
    }
}

/// One notch of scroll wheel movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    fn mask_bit(self) -> u8 {
        match self {
            ScrollDirection::Up => BUTTON_SCROLL_UP,
            ScrollDirection::Down => BUTTON_SCROLL_DOWN,
            ScrollDirection::Left => BUTTON_SCROLL_LEFT,
            ScrollDirection::Right => BUTTON_SCROLL_RIGHT,
        }
    }
}

/// A frontend input event, translated per-event and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMove {
        x: u16,
        y: u16,
    },
    PointerButton {
        x: u16,
        y: u16,
        button: PointerButton,
        down: bool,
    },
    Scroll {
        x: u16,
        y: u16,
        direction: ScrollDirection,
    },
    Key {
        /// Symbolic name ("Return", "F11") or a single character.
        key: String,
        down: bool,
    },
}

/// What the frontend should do with an intercepted shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    ZoomIn,
    ZoomOut,
    ZoomReset,
    ToggleFullscreen,
}

/// Result of translating one input event.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// Forward these messages to the gateway (may be empty when the event is
    /// consumed as the tail of a local shortcut chord).
    Wire(Vec<Message>),
    /// Consume the event locally.
    Local(ShortcutAction),
}

/// Stateful translator from frontend input events to wire messages.
#[derive(Debug, Default)]
pub struct InputTranslator {
    /// Current pointer button mask, carried into every pointer event.
    button_mask: u8,
    /// Last known pointer position, used for scroll synthesis.
    last_x: u16,
    last_y: u16,
    ctrl_down: bool,
    /// Keysyms whose press was consumed by a shortcut; the matching release
    /// must be swallowed too so the remote never sees an orphan key-up.
    swallowed: Vec<u32>,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pointer button mask.
    pub fn button_mask(&self) -> u8 {
        self.button_mask
    }

    /// Forget all held state, used after a reconnect so stale button or
    /// modifier state never leaks into the new connection.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Translate one input event.
    ///
    /// Errors are per-event: the caller logs and drops the event, the
    /// translator state stays consistent.
    pub fn translate(&mut self, event: InputEvent) -> Result<Translation> {
        match event {
            InputEvent::PointerMove { x, y } => {
                self.last_x = x;
                self.last_y = y;
                Ok(Translation::Wire(vec![Message::PointerEvent(
                    PointerEventPayload {
                        x,
                        y,
                        button_mask: self.button_mask,
                    },
                )]))
            }

            InputEvent::PointerButton { x, y, button, down } => {
                if down {
                    self.button_mask |= button.mask_bit();
                } else {
                    self.button_mask &= !button.mask_bit();
                }
                self.last_x = x;
                self.last_y = y;
                Ok(Translation::Wire(vec![Message::PointerEvent(
                    PointerEventPayload {
                        x,
                        y,
                        button_mask: self.button_mask,
                    },
                )]))
            }

            InputEvent::Scroll { x, y, direction } => {
                // The wire protocol has no scroll event; a notch is a button
                // press immediately followed by its release.
                self.last_x = x;
                self.last_y = y;
                let bit = direction.mask_bit();
                Ok(Translation::Wire(vec![
                    Message::PointerEvent(PointerEventPayload {
                        x,
                        y,
                        button_mask: self.button_mask | bit,
                    }),
                    Message::PointerEvent(PointerEventPayload {
                        x,
                        y,
                        button_mask: self.button_mask,
                    }),
                ]))
            }

            InputEvent::Key { key, down } => self.translate_key(&key, down),
        }
    }

    fn translate_key(&mut self, key: &str, down: bool) -> Result<Translation> {
        if key.is_empty() {
            return Err(Error::InputTranslation {
                message: "empty key symbol".to_string(),
            });
        }

        if key == "Control" {
            self.ctrl_down = down;
        }

        if down {
            if let Some(action) = self.match_shortcut(key) {
                self.swallowed.push(lookup_keysym(key));
                return Ok(Translation::Local(action));
            }
        } else {
            let keysym = lookup_keysym(key);
            if let Some(pos) = self.swallowed.iter().position(|&k| k == keysym) {
                self.swallowed.swap_remove(pos);
                return Ok(Translation::Wire(Vec::new()));
            }
        }

        Ok(Translation::Wire(vec![Message::KeyEvent(KeyEventPayload {
            keysym: lookup_keysym(key),
            down,
        })]))
    }

    fn match_shortcut(&self, key: &str) -> Option<ShortcutAction> {
        if key == "F11" {
            return Some(ShortcutAction::ToggleFullscreen);
        }
        if !self.ctrl_down {
            return None;
        }
        match key {
            "+" | "=" => Some(ShortcutAction::ZoomIn),
            "-" => Some(ShortcutAction::ZoomOut),
            "0" => Some(ShortcutAction::ZoomReset),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
