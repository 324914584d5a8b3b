//! Normalization of raw surface input into composition calls.
//!
//! The host forwards every input-related notification from the editable
//! surface (key events, editing intents, IME composition phases, paste,
//! drag, mutation summaries, selection changes) as `InputEvent`s. A
//! per-platform-capability controller variant translates them into edit
//! verbs and reconciles what actually happened on the surface against what
//! it expected to happen.

pub mod controller;
pub mod mutation;

pub use controller::{
    ControllerResponse, EditingEventController, InputContext, InputController,
    KeyEventController, ManagerSelection, create_controller,
};
pub use mutation::{ExpectedMutation, MutationSummary};

use core_doc::{Position, Range};
use core_events::PastePayload;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModMask: u16 { const CTRL=1; const ALT=2; const SHIFT=4; const META=8; }
}

/// Logical key identity for the keydown path. `Unidentified` is what some
/// mobile keyboards report for every key; it matters to the corruption
/// pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Unidentified,
}

/// Raw input-related notifications from the host surface, in the order the
/// host observed them.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown {
        key: Key,
        mods: ModMask,
    },
    /// Editing intent carrying committed text (`insertText`).
    InsertText {
        text: String,
    },
    /// Editing intent for Return.
    InsertLineBreak,
    /// Editing intent for a delete in either direction.
    DeleteContent {
        direction: core_session::Direction,
    },
    /// IME composition phases. Mid-composition the provisional text lives
    /// on the surface; the controller mirrors it into the document.
    CompositionStart {
        data: String,
    },
    CompositionUpdate {
        data: String,
    },
    CompositionEnd {
        data: String,
    },
    Paste {
        payload: PastePayload,
    },
    DragStart {
        range: Range,
    },
    Drop {
        position: Position,
    },
    /// Drag ended without a drop: the pre-drag selection must come back.
    DragEnd,
    /// The surface mutated (spell-check, autocomplete, or an edit this
    /// engine performed and the renderer flushed).
    MutationObserved {
        summary: MutationSummary,
    },
    /// The native selection moved.
    SelectionChanged {
        range: Range,
    },
}

/// What the host surface is capable of reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    /// Whether the surface delivers editing intents (`beforeinput`-era
    /// events) rather than only key events.
    pub supports_editing_events: bool,
}

/// Which controller variant a surface gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLevel {
    KeyEvents,
    EditingEvents,
}

impl InputLevel {
    pub fn detect(capabilities: &SurfaceCapabilities) -> Self {
        if capabilities.supports_editing_events {
            InputLevel::EditingEvents
        } else {
            InputLevel::KeyEvents
        }
    }
}
