//! Host input events as the editor receives them.
//!
//! The host dispatches capture-phase page events here first; the returned
//! [`EventDisposition`] says whether the page may still see them.

use pagecraft_dom::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub target: NodeId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub button: MouseButton,
}

impl PointerEvent {
    pub fn new(target: NodeId, x: f64, y: f64) -> Self {
        Self {
            target,
            x,
            y,
            button: MouseButton::Primary,
        }
    }

    /// A primary-button event with no meaningful coordinates
    pub fn at(target: NodeId) -> Self {
        Self::new(target, 0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub alt: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        alt: false,
        shift: false,
        ctrl: false,
        meta: false,
    };

    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };

    pub fn any(&self) -> bool {
        self.alt || self.shift || self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Escape,
    Character(char),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }
}

/// What the host should do with an event after the editor saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventDisposition {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl EventDisposition {
    /// Let the page handle the event
    pub const PASS: EventDisposition = EventDisposition {
        prevent_default: false,
        stop_propagation: false,
    };

    /// The editor consumed the event
    pub const CAPTURE: EventDisposition = EventDisposition {
        prevent_default: true,
        stop_propagation: true,
    };

    pub fn is_captured(&self) -> bool {
        self.prevent_default
    }
}
