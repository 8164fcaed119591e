//! Infrastructure layer for the KeyZone host.
//!
//! Contains OS-facing adapters: raw input capture, MIDI output ports,
//! file-system storage, and the GUI command bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyzone_core`; the domain crate never depends on it.

pub mod input_capture;
pub mod midi_output;
pub mod storage;
pub mod ui_bridge;
