// Pitches and the interval relation between them.
//
// A `Note` is a bare MIDI pitch number. Comparing two notes yields a
// `NoteRelationship`: the interval class within an octave, with direction
// discarded (C4 against E4 and E4 against C4 are both a major third).
//
// Unison and octave are separate variants so callers can still tell a
// doubled pitch from one an octave away, but every counterpoint rule compares
// through `same_class` / `is_unison_or_octave`, which fold the two into a
// single UNISON_OR_OCTAVE class.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semitones in an octave.
pub const OCTAVE: u8 = 12;

/// A single pitch (MIDI note number, 0-127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Note {
    pub value: u8,
}

impl Note {
    pub fn new(value: u8) -> Self {
        Note { value }
    }

    /// Interval class between two notes. Commutative.
    pub fn relate(self, other: Note) -> NoteRelationship {
        NoteRelationship::from_semitones(self.value.abs_diff(other.value))
    }

    /// Signed melodic distance from `self` to `next`, in semitones.
    pub fn motion_to(self, next: Note) -> i16 {
        i16::from(next.value) - i16::from(self.value)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
        ];
        // MIDI 60 is C4, so octave numbering starts at -1.
        let octave = i16::from(self.value / OCTAVE) - 1;
        write!(f, "{}{}", NAMES[usize::from(self.value % OCTAVE)], octave)
    }
}

/// The 13 interval classes within an octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteRelationship {
    Unison,
    MinorSecond,
    MajorSecond,
    MinorThird,
    MajorThird,
    PerfectFourth,
    Tritone,
    PerfectFifth,
    MinorSixth,
    MajorSixth,
    MinorSeventh,
    MajorSeventh,
    Octave,
}

impl NoteRelationship {
    /// Map an absolute semitone distance to its interval class.
    /// 0 is a unison; any other multiple of 12 is an octave.
    pub fn from_semitones(distance: u8) -> Self {
        use NoteRelationship::*;
        match distance % OCTAVE {
            0 if distance == 0 => Unison,
            0 => Octave,
            1 => MinorSecond,
            2 => MajorSecond,
            3 => MinorThird,
            4 => MajorThird,
            5 => PerfectFourth,
            6 => Tritone,
            7 => PerfectFifth,
            8 => MinorSixth,
            9 => MajorSixth,
            10 => MinorSeventh,
            _ => MajorSeventh,
        }
    }

    /// Semitones modulo the octave (unison and octave both give 0).
    pub fn pitch_class_distance(self) -> u8 {
        match self {
            NoteRelationship::Octave => 0,
            other => other as u8,
        }
    }

    pub fn is_unison_or_octave(self) -> bool {
        self.pitch_class_distance() == 0
    }

    /// Equality with unison and octave treated as one class.
    pub fn same_class(self, other: NoteRelationship) -> bool {
        self.pitch_class_distance() == other.pitch_class_distance()
    }

    /// Harmonic consonance for two-voice counterpoint: unison/octave,
    /// thirds, sixths and the perfect fifth. Fourths are dissonant here.
    pub fn is_consonant(self) -> bool {
        use NoteRelationship::*;
        matches!(
            self,
            Unison | Octave | MinorThird | MajorThird | PerfectFifth | MinorSixth | MajorSixth
        )
    }
}

impl fmt::Display for NoteRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
