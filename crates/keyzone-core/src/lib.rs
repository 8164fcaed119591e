//! # keyzone-core
//!
//! Shared library for KeyZone containing the mapping domain (scales, zones,
//! the zone arena, alias keys), key-code names, and MIDI message builders.
//!
//! It has zero dependencies on OS APIs, MIDI drivers, or async runtimes.
//!
//! # Architecture overview (for beginners)
//!
//! KeyZone turns ordinary input devices (keyboards, mice, number pads) into
//! MIDI controllers.  Each physical device can be given a name (an *alias*),
//! and *zones* bind a list of keys on an alias to notes of a musical scale.
//!
//! This crate (`keyzone-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure mapping logic.  The most important piece is the
//!   `ZoneManager`: an ordered list of zones that answers "which note does
//!   key K on device alias A play?".
//!
//! - **`keymap`** – Key codes (Windows virtual-key codes plus synthetic
//!   mouse-wheel codes) and their human-readable names.
//!
//! - **`midi`** – Three-byte MIDI messages and fixed sequences such as
//!   "all notes off" and the pitch-bend-range RPN.

pub mod domain;
pub mod keymap;
pub mod midi;

// Re-export the most-used types at the crate root so callers can write
// `keyzone_core::Zone` instead of `keyzone_core::domain::zone::Zone`.
pub use domain::alias::{alias_key, is_wildcard_name, AliasKey, DeviceId, ANY_ALIAS, UNASSIGNED_ALIAS};
pub use domain::scale::ScaleType;
pub use domain::zone::{LayoutStrategy, Zone};
pub use domain::zone_manager::{ZoneError, ZoneId, ZoneManager, ZoneMatch};
pub use keymap::{key_code_from_name, key_name, KeyCode, DEFAULT_TOGGLE_KEY, SCROLL_DOWN, SCROLL_UP};
pub use midi::MidiMessage;
