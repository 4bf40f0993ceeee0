//! # Input Events
//!
//! Normalized input delivered to the module.
//!
//! [`InputEvent`] is the typed form the host builds; [`RawEvent`] is the
//! fixed five-slot record `add_event(kind, int1, int2, float1, float2)`
//! actually crosses the ABI as. Slot meaning per kind:
//!
//! | kind | event        | int1 | int2 | float1  | float2 |
//! |------|--------------|------|------|---------|--------|
//! | 1    | pointer move | 0    | 0    | x       | y      |
//! | 2    | pointer down | btn  | 0    | 0       | 0      |
//! | 3    | pointer up   | btn  | 0    | 0       | 0      |
//! | 4    | scroll       | 0    | 0    | deltaY  | 0      |
//! | 5    | key down     | addr | len  | repeat  | mods   |
//! | 6    | key up       | addr | len  | 0       | mods   |
//! | 7    | text input   | addr | len  | 0       | 0      |

use crate::memory::Region;

// =============================================================================
// MODIFIERS
// =============================================================================

/// Keyboard modifier state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Shift held.
    pub shift: bool,
    /// Control held.
    pub ctrl: bool,
    /// Alt/Option held.
    pub alt: bool,
    /// Meta/Super/Command held.
    pub meta: bool,
}

impl Modifiers {
    /// Bit for shift.
    pub const SHIFT: u32 = 1 << 0;
    /// Bit for ctrl.
    pub const CTRL: u32 = 1 << 1;
    /// Bit for alt.
    pub const ALT: u32 = 1 << 2;
    /// Bit for meta.
    pub const META: u32 = 1 << 3;

    /// Packs into the ABI bitmask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        (self.shift as u32) * Self::SHIFT
            | (self.ctrl as u32) * Self::CTRL
            | (self.alt as u32) * Self::ALT
            | (self.meta as u32) * Self::META
    }

    /// Unpacks an ABI bitmask; unknown bits are ignored.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            shift: bits & Self::SHIFT != 0,
            ctrl: bits & Self::CTRL != 0,
            alt: bits & Self::ALT != 0,
            meta: bits & Self::META != 0,
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// ABI event kind codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    /// Pointer moved.
    PointerMove = 1,
    /// Pointer button pressed.
    PointerDown = 2,
    /// Pointer button released.
    PointerUp = 3,
    /// Wheel scrolled.
    Scroll = 4,
    /// Key pressed (or auto-repeated).
    KeyDown = 5,
    /// Key released.
    KeyUp = 6,
    /// Text committed.
    TextInput = 7,
}

impl EventKind {
    /// Parses an ABI code.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::PointerMove,
            2 => Self::PointerDown,
            3 => Self::PointerUp,
            4 => Self::Scroll,
            5 => Self::KeyDown,
            6 => Self::KeyUp,
            7 => Self::TextInput,
            _ => return None,
        })
    }
}

/// One host input occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer position in backing-buffer pixels.
    PointerMove {
        /// Horizontal position.
        x: f32,
        /// Vertical position, top-down.
        y: f32,
    },
    /// Button pressed; DOM button numbering.
    PointerDown {
        /// Button id.
        button: u32,
    },
    /// Button released; DOM button numbering.
    PointerUp {
        /// Button id.
        button: u32,
    },
    /// Vertical wheel motion in pixels, positive scrolls down.
    Scroll {
        /// Vertical delta.
        delta_y: f32,
    },
    /// Key pressed.
    KeyDown {
        /// Physical key identifier (`KeyA`, `Enter`, ...).
        code: String,
        /// Auto-repeat.
        repeat: bool,
        /// Modifier state.
        modifiers: Modifiers,
    },
    /// Key released.
    KeyUp {
        /// Physical key identifier.
        code: String,
        /// Modifier state.
        modifiers: Modifiers,
    },
    /// Composed text.
    TextInput {
        /// Committed text, never empty when delivered.
        text: String,
    },
}

impl InputEvent {
    /// ABI kind code of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PointerMove { .. } => EventKind::PointerMove,
            Self::PointerDown { .. } => EventKind::PointerDown,
            Self::PointerUp { .. } => EventKind::PointerUp,
            Self::Scroll { .. } => EventKind::Scroll,
            Self::KeyDown { .. } => EventKind::KeyDown,
            Self::KeyUp { .. } => EventKind::KeyUp,
            Self::TextInput { .. } => EventKind::TextInput,
        }
    }

    /// UTF-8 payload that must be copied into module memory first.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::KeyDown { code, .. } | Self::KeyUp { code, .. } => Some(code),
            Self::TextInput { text } => Some(text),
            _ => None,
        }
    }

    /// Lays the event out in the five ABI slots.
    ///
    /// `payload` is where [`InputEvent::payload`] was written; kinds
    /// without a payload ignore it.
    #[must_use]
    pub fn encode(&self, payload: Region) -> RawEvent {
        let kind = self.kind() as u32;
        let raw = |int1, int2, float1, float2| RawEvent {
            kind,
            int1,
            int2,
            float1,
            float2,
        };
        match self {
            Self::PointerMove { x, y } => raw(0, 0, *x, *y),
            Self::PointerDown { button } | Self::PointerUp { button } => raw(*button, 0, 0.0, 0.0),
            Self::Scroll { delta_y } => raw(0, 0, *delta_y, 0.0),
            Self::KeyDown {
                repeat, modifiers, ..
            } => raw(
                payload.addr,
                payload.len,
                f32::from(u8::from(*repeat)),
                modifiers.bits() as f32,
            ),
            Self::KeyUp { modifiers, .. } => {
                raw(payload.addr, payload.len, 0.0, modifiers.bits() as f32)
            }
            Self::TextInput { .. } => raw(payload.addr, payload.len, 0.0, 0.0),
        }
    }
}

/// The fixed-shape record passed to `add_event`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    /// [`EventKind`] code.
    pub kind: u32,
    /// First integer slot.
    pub int1: u32,
    /// Second integer slot.
    pub int2: u32,
    /// First float slot.
    pub float1: f32,
    /// Second float slot.
    pub float2: f32,
}

// =============================================================================
// POINTER MAPPING
// =============================================================================

/// Maps a position in displayed (logical) units to backing-buffer pixels.
///
/// Scales by the ratio of backing size to displayed size on each axis. A
/// zero displayed dimension maps to 0.
#[must_use]
pub fn to_backing_pixels(
    position: (f32, f32),
    displayed: (f32, f32),
    backing: (u32, u32),
) -> (f32, f32) {
    let axis = |pos: f32, shown: f32, pixels: u32| {
        if shown > 0.0 {
            pos * pixels as f32 / shown
        } else {
            0.0
        }
    };
    (
        axis(position.0, displayed.0, backing.0),
        axis(position.1, displayed.1, backing.1),
    )
}
