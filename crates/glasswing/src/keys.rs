//! winit input to module input.
//!
//! Key codes use the W3C `KeyboardEvent.code` names, which winit's
//! `KeyCode` variants already follow apart from the platform key.

use glasswing_core::{InputEvent, Modifiers};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

/// Code sent for keys winit cannot identify.
pub const UNIDENTIFIED: &str = "Unidentified";

/// W3C code name of a physical key.
#[must_use]
pub fn key_code_name(key: PhysicalKey) -> String {
    match key {
        PhysicalKey::Code(KeyCode::SuperLeft) => "MetaLeft".to_owned(),
        PhysicalKey::Code(KeyCode::SuperRight) => "MetaRight".to_owned(),
        PhysicalKey::Code(code) => format!("{code:?}"),
        PhysicalKey::Unidentified(_) => UNIDENTIFIED.to_owned(),
    }
}

/// DOM button id: 0 left, 1 middle, 2 right, 3 back, 4 forward.
#[must_use]
pub fn button_id(button: MouseButton) -> u32 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::Back => 3,
        MouseButton::Forward => 4,
        MouseButton::Other(n) => 5 + u32::from(n),
    }
}

/// Modifier snapshot in module terms (the platform key is `meta`).
#[must_use]
pub fn modifiers(state: ModifiersState) -> Modifiers {
    Modifiers {
        shift: state.shift_key(),
        ctrl: state.control_key(),
        alt: state.alt_key(),
        meta: state.super_key(),
    }
}

/// Vertical scroll in DOM convention: positive scrolls content up.
///
/// winit reports positive `y` for scrolling up, so the sign flips. Line
/// deltas are scaled to pixels.
#[must_use]
pub fn scroll_delta(delta: MouseScrollDelta, line_pixels: f32) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * line_pixels,
        MouseScrollDelta::PixelDelta(position) => -position.y as f32,
    }
}

/// Pointer event for a button transition.
#[must_use]
pub fn button_event(state: ElementState, button: MouseButton) -> InputEvent {
    let button = button_id(button);
    match state {
        ElementState::Pressed => InputEvent::PointerDown { button },
        ElementState::Released => InputEvent::PointerUp { button },
    }
}

/// Key event for a key transition.
#[must_use]
pub fn key_event(event: &KeyEvent, modifiers: Modifiers) -> InputEvent {
    let code = key_code_name(event.physical_key);
    match event.state {
        ElementState::Pressed => InputEvent::KeyDown {
            code,
            repeat: event.repeat,
            modifiers,
        },
        ElementState::Released => InputEvent::KeyUp { code, modifiers },
    }
}

/// Printable part of the text a key press produced.
///
/// Control characters (backspace, escape, enter) arrive as key events
/// only. Returns `None` when nothing printable is left.
#[must_use]
pub fn printable_text(text: &str) -> Option<String> {
    let printable: String = text.chars().filter(|c| !c.is_control()).collect();
    (!printable.is_empty()).then_some(printable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn test_key_codes_follow_w3c_names() {
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::KeyA)), "KeyA");
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::Digit7)), "Digit7");
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::ArrowLeft)), "ArrowLeft");
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::ShiftRight)), "ShiftRight");
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::SuperLeft)), "MetaLeft");
    }

    #[test]
    fn test_button_ids() {
        assert_eq!(button_id(MouseButton::Left), 0);
        assert_eq!(button_id(MouseButton::Middle), 1);
        assert_eq!(button_id(MouseButton::Right), 2);
        assert_eq!(button_id(MouseButton::Other(2)), 7);
        assert_eq!(
            button_event(ElementState::Released, MouseButton::Right),
            InputEvent::PointerUp { button: 2 }
        );
    }

    #[test]
    fn test_modifier_bits() {
        let mods = modifiers(ModifiersState::SHIFT | ModifiersState::ALT);
        assert_eq!(mods.bits(), 0b0101);
        assert_eq!(modifiers(ModifiersState::SUPER).bits(), 0b1000);
    }

    #[test]
    fn test_scroll_sign_and_scale() {
        assert_eq!(scroll_delta(MouseScrollDelta::LineDelta(0.0, 1.0), 100.0), -100.0);
        assert_eq!(
            scroll_delta(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -12.0)), 100.0),
            12.0
        );
    }

    #[test]
    fn test_printable_text() {
        assert_eq!(printable_text("a"), Some("a".to_owned()));
        assert_eq!(printable_text("\u{8}"), None);
        assert_eq!(printable_text("\r"), None);
        assert_eq!(printable_text("é"), Some("é".to_owned()));
    }
}
