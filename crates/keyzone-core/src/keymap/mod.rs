//! Key codes and human-readable key names.
//!
//! Keyboard keys and mouse buttons are identified by Windows Virtual Key codes.
//! Mouse-wheel motion has no native key, so capture translates each wheel tick
//! into a synthetic code above the VK range (see [`SCROLL_UP`] / [`SCROLL_DOWN`]).

pub mod windows_vk;

/// A discrete input code: a VK code (`0x00..=0xFF`) or a synthetic wheel code.
pub type KeyCode = u16;

/// Synthetic code emitted (pressed then released) for one wheel tick away from the user.
pub const SCROLL_UP: KeyCode = 0x1000;

/// Synthetic code emitted (pressed then released) for one wheel tick toward the user.
pub const SCROLL_DOWN: KeyCode = 0x1001;

/// Default MIDI-mode toggle key (VK_SCROLL).
pub const DEFAULT_TOGGLE_KEY: KeyCode = 0x91;

/// Maps a key code to a display name.
///
/// Never fails: codes without a known name render as `"Unknown Key (<code>)"`.
pub fn key_name(code: KeyCode) -> String {
    match code {
        SCROLL_UP => "Scroll Up".to_string(),
        SCROLL_DOWN => "Scroll Down".to_string(),
        vk if vk <= 0xFF => windows_vk::vk_name(vk as u8)
            .map(str::to_string)
            .unwrap_or_else(|| unknown_key_name(code)),
        _ => unknown_key_name(code),
    }
}

/// Inverse of [`key_name`] for named keys and the synthetic wheel codes.
pub fn key_code_from_name(name: &str) -> Option<KeyCode> {
    if name.eq_ignore_ascii_case("Scroll Up") {
        return Some(SCROLL_UP);
    }
    if name.eq_ignore_ascii_case("Scroll Down") {
        return Some(SCROLL_DOWN);
    }
    windows_vk::vk_from_name(name).map(KeyCode::from)
}

fn unknown_key_name(code: KeyCode) -> String {
    format!("Unknown Key ({code})")
}
