//! MIDI channel-voice messages and the fixed sequences built from them.
//!
//! Everything here is pure byte construction.  Sending, delaying and device
//! selection live in the host crate's dispatch queue.

pub mod message;

pub use message::{all_notes_off, pitch_bend_range_rpn, MidiMessage};
