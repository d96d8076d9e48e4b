// Chords: one or more notes sounding together.
//
// Every note in a chord shares the chord's start tick and duration. Melody
// construction (melody.rs) builds one-note chords from note-on/note-off
// pairs and then merges those with identical (time, duration) into a single
// chord. Chords are never mutated after that.

use serde::Serialize;

use crate::error::AnalysisError;
use crate::note::{Note, NoteRelationship};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chord {
    /// Ascending, no duplicate pitches. Never empty.
    notes: Vec<Note>,
    /// Start, in absolute ticks from the beginning of the voice.
    pub time: u64,
    /// Length in ticks.
    pub duration: u64,
}

impl Chord {
    /// Build a chord from the given notes. Duplicates are collapsed.
    ///
    /// Returns `None` if `notes` is empty.
    pub fn new(notes: impl IntoIterator<Item = Note>, time: u64, duration: u64) -> Option<Self> {
        let mut notes: Vec<Note> = notes.into_iter().collect();
        if notes.is_empty() {
            return None;
        }
        notes.sort_unstable();
        notes.dedup();
        Some(Chord { notes, time, duration })
    }

    pub fn single(note: Note, time: u64, duration: u64) -> Self {
        Chord {
            notes: vec![note],
            time,
            duration,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// The note of a one-note chord.
    pub fn sole_note(&self) -> Option<Note> {
        match self.notes.as_slice() {
            [note] => Some(*note),
            _ => None,
        }
    }

    /// Tick at which the chord stops sounding.
    pub fn end(&self) -> u64 {
        self.time + self.duration
    }

    /// True if `[time, end]` lies inside `[start, start + duration]`.
    pub fn is_within(&self, start: u64, duration: u64) -> bool {
        start <= self.time && self.end() <= start + duration
    }

    /// Interval class between two single-note chords.
    ///
    /// Relating chords with more than one note is undefined and fails with
    /// `AnalysisError::MultiNoteRelation`; there is no first-note fallback.
    pub fn relate(&self, other: &Chord) -> Result<NoteRelationship, AnalysisError> {
        match (self.sole_note(), other.sole_note()) {
            (Some(a), Some(b)) => Ok(a.relate(b)),
            _ => Err(AnalysisError::MultiNoteRelation {
                left_tick: self.time,
                left_notes: self.notes.len(),
                right_tick: other.time,
                right_notes: other.notes.len(),
            }),
        }
    }

    /// Signed melodic motion from this chord to `next`.
    ///
    /// Uses the same single-note restriction as `relate`.
    pub fn motion_to(&self, next: &Chord) -> Result<i16, AnalysisError> {
        match (self.sole_note(), next.sole_note()) {
            (Some(a), Some(b)) => Ok(a.motion_to(b)),
            _ => Err(AnalysisError::MultiNoteRelation {
                left_tick: self.time,
                left_notes: self.notes.len(),
                right_tick: next.time,
                right_notes: next.notes.len(),
            }),
        }
    }
}
