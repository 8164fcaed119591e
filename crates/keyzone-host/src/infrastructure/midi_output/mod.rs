//! MIDI output adapters.
//!
//! Implementations of [`MidiOutputPort`](crate::application::dispatch_midi::MidiOutputPort):
//!
//! - **`midir_port`** – real outputs through `midir` (WinMM, ALSA, CoreMIDI).
//! - **`mock`** – records every message in memory, for tests.

pub mod midir_port;
pub mod mock;

pub use midir_port::MidirOutputPort;
pub use mock::RecordingOutputPort;
