//! Three-byte MIDI channel-voice messages.
//!
//! Channels are numbered 1–16 at this API, the way users see them; the wire
//! nibble is `channel - 1`.  Every constructor clamps instead of failing, so a
//! message built here is always valid on the wire.

use std::fmt;

/// Velocity used for every note-on the engine emits.
pub const FULL_VELOCITY: u8 = 127;
/// Highest 14-bit pitch-bend value; 8192 is centre.
pub const MAX_PITCH_BEND: u16 = 16_383;
/// Largest pitch-bend range a synth accepts through RPN 0, in semitones.
pub const MAX_PITCH_BEND_RANGE: u8 = 96;

pub const CC_ALL_NOTES_OFF: u8 = 123;
pub const CC_DATA_ENTRY_MSB: u8 = 6;
pub const CC_DATA_ENTRY_LSB: u8 = 38;
pub const CC_RPN_LSB: u8 = 100;
pub const CC_RPN_MSB: u8 = 101;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PITCH_BEND: u8 = 0xE0;

/// A single MIDI channel-voice message.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    bytes: [u8; 3],
}

impl MidiMessage {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(NOTE_ON, channel, note, velocity)
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::channel_voice(NOTE_OFF, channel, note, 0)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::channel_voice(CONTROL_CHANGE, channel, controller, value)
    }

    /// `value` is unsigned 14-bit, clamped to `0..=16383`.
    pub fn pitch_bend(channel: u8, value: i32) -> Self {
        let value = value.clamp(0, i32::from(MAX_PITCH_BEND)) as u16;
        let lsb = (value & 0x7F) as u8;
        let msb = (value >> 7) as u8;
        Self::channel_voice(PITCH_BEND, channel, lsb, msb)
    }

    fn channel_voice(kind: u8, channel: u8, data1: u8, data2: u8) -> Self {
        let nibble = channel.clamp(1, 16) - 1;
        Self {
            bytes: [kind | nibble, data1 & 0x7F, data2 & 0x7F],
        }
    }

    /// Wraps raw bytes as received from a port, without validation.
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    /// Channel number, 1–16.
    pub fn channel(&self) -> u8 {
        (self.bytes[0] & 0x0F) + 1
    }

    pub fn data1(&self) -> u8 {
        self.bytes[1]
    }

    pub fn data2(&self) -> u8 {
        self.bytes[2]
    }

    pub fn is_note_on(&self) -> bool {
        self.bytes[0] & 0xF0 == NOTE_ON
    }

    pub fn is_note_off(&self) -> bool {
        self.bytes[0] & 0xF0 == NOTE_OFF
    }
}

impl fmt::Debug for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MidiMessage({:02X} {:02X} {:02X})",
            self.bytes[0], self.bytes[1], self.bytes[2]
        )
    }
}

/// CC 123 value 0 on every channel, 1 through 16.
pub fn all_notes_off() -> Vec<MidiMessage> {
    (1..=16)
        .map(|channel| MidiMessage::control_change(channel, CC_ALL_NOTES_OFF, 0))
        .collect()
}

/// Selects RPN 0 (pitch-bend sensitivity) and writes `semitones` (clamped to 1–96).
///
/// No null-RPN (101/100 = 127) follows the data entry: some synths drop the
/// setting if the reset arrives in the same buffer.
pub fn pitch_bend_range_rpn(channel: u8, semitones: u8) -> [MidiMessage; 4] {
    let range = semitones.clamp(1, MAX_PITCH_BEND_RANGE);
    [
        MidiMessage::control_change(channel, CC_RPN_LSB, 0),
        MidiMessage::control_change(channel, CC_RPN_MSB, 0),
        MidiMessage::control_change(channel, CC_DATA_ENTRY_MSB, range),
        MidiMessage::control_change(channel, CC_DATA_ENTRY_LSB, 0),
    ]
}
