//! Scale tables and scale-degree quantization.
//!
//! Every [`ScaleType`] defines an ordered list of semitone offsets from the root
//! within one octave.  Quantizing a scale-degree index walks that list and adds
//! 12 semitones for each full cycle, so degree 7 of a major scale is the octave
//! and degree -1 is the leading tone below the root.

use std::fmt;

use serde::{Deserialize, Serialize};

const CHROMATIC: &[i32] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
const MAJOR: &[i32] = &[0, 2, 4, 5, 7, 9, 11];
const MINOR: &[i32] = &[0, 2, 3, 5, 7, 8, 10];
const PENTATONIC_MAJOR: &[i32] = &[0, 2, 4, 7, 9];
const PENTATONIC_MINOR: &[i32] = &[0, 3, 5, 7, 10];
const BLUES: &[i32] = &[0, 3, 5, 6, 7, 10];

/// Semitones per octave.
pub const OCTAVE: i32 = 12;

/// The scales a zone can quantize to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScaleType {
    Chromatic,
    #[default]
    Major,
    Minor,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
}

impl ScaleType {
    /// All scale types, in UI order.
    pub const ALL: [ScaleType; 6] = [
        ScaleType::Chromatic,
        ScaleType::Major,
        ScaleType::Minor,
        ScaleType::PentatonicMajor,
        ScaleType::PentatonicMinor,
        ScaleType::Blues,
    ];

    /// Semitone offsets from the root within one octave.
    pub fn intervals(self) -> &'static [i32] {
        match self {
            ScaleType::Chromatic => CHROMATIC,
            ScaleType::Major => MAJOR,
            ScaleType::Minor => MINOR,
            ScaleType::PentatonicMajor => PENTATONIC_MAJOR,
            ScaleType::PentatonicMinor => PENTATONIC_MINOR,
            ScaleType::Blues => BLUES,
        }
    }

    /// Number of degrees per octave.
    pub fn degrees_per_octave(self) -> i32 {
        self.intervals().len() as i32
    }

    /// Converts a scale-degree index (any sign) to a semitone offset from the root.
    pub fn semitone_offset(self, degree: i32) -> i32 {
        let table = self.intervals();
        let len = table.len() as i32;
        let octave = degree.div_euclid(len);
        let step = degree.rem_euclid(len) as usize;
        octave * OCTAVE + table[step]
    }
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScaleType::Chromatic => "Chromatic",
            ScaleType::Major => "Major",
            ScaleType::Minor => "Minor",
            ScaleType::PentatonicMajor => "Pentatonic Major",
            ScaleType::PentatonicMinor => "Pentatonic Minor",
            ScaleType::Blues => "Blues",
        };
        f.write_str(name)
    }
}
