// Melody construction: pairing note-on/note-off events into chords.
//
// Input is one voice's event stream, where every event carries a delta in
// ticks from the previous event on the same voice. We keep a running
// absolute clock and a cache of open notes (pitch + start tick).
//
// - Note-on: push (pitch, now) onto the open cache.
// - Note-off: close the *first* cached note with the same pitch (the oldest
//   one still sounding) and emit a one-note chord for it.
// - Anything else: advances the clock, nothing more.
//
// Non-note events are not filtered out before deltas are summed. A delta
// is relative to the previous event of any kind, so summing only the note
// events' deltas would move every note after a metadata event earlier.
//
// After the stream is consumed, one-note chords with identical
// (time, duration) are merged into a single chord, and the result is ordered
// by (time, duration). The merge is keyed, so the order chords were emitted
// in has no effect on the result.
//
// Nothing here fails. Notes still open at the end of the stream and note-offs
// with no matching note-on are dropped, but both are recorded in
// `PairingLoss` and logged so callers can see them (see score.rs for strict
// mode, which turns them into errors).

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::chord::Chord;
use crate::note::Note;

/// What happened at an event, stripped of everything the analysis ignores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceEventKind {
    NoteOn { pitch: u8 },
    NoteOff { pitch: u8 },
    /// Metadata or any non-note message. Only its delta matters.
    Other,
}

/// One timed event on a voice track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceEvent {
    /// Ticks since the previous event on this voice.
    pub delta: u32,
    pub kind: VoiceEventKind,
}

impl VoiceEvent {
    pub fn note_on(delta: u32, pitch: u8) -> Self {
        VoiceEvent {
            delta,
            kind: VoiceEventKind::NoteOn { pitch },
        }
    }

    pub fn note_off(delta: u32, pitch: u8) -> Self {
        VoiceEvent {
            delta,
            kind: VoiceEventKind::NoteOff { pitch },
        }
    }

    pub fn other(delta: u32) -> Self {
        VoiceEvent {
            delta,
            kind: VoiceEventKind::Other,
        }
    }
}

/// A note-on whose matching note-off has not been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenNote {
    pub pitch: Note,
    pub start: u64,
}

/// A note-off that no open note could absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrayNoteOff {
    pub pitch: Note,
    pub tick: u64,
}

/// Events dropped while pairing a voice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairingLoss {
    /// Notes still sounding when the stream ended.
    pub unterminated: Vec<OpenNote>,
    pub stray_note_offs: Vec<StrayNoteOff>,
}

impl PairingLoss {
    pub fn is_empty(&self) -> bool {
        self.unterminated.is_empty() && self.stray_note_offs.is_empty()
    }
}

/// One voice as a time-ordered sequence of chords.
///
/// No two chords share the same (time, duration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melody {
    chords: Vec<Chord>,
    loss: PairingLoss,
}

impl Melody {
    /// Build a melody from a voice's event stream.
    pub fn from_events(events: &[VoiceEvent]) -> Self {
        let mut now: u64 = 0;
        let mut open: Vec<OpenNote> = Vec::new();
        let mut loss = PairingLoss::default();
        // Keyed by (time, duration) so simultaneous notes collapse on insert.
        let mut merged: BTreeMap<(u64, u64), Vec<Note>> = BTreeMap::new();

        for event in events {
            now += u64::from(event.delta);
            match event.kind {
                VoiceEventKind::NoteOn { pitch } => open.push(OpenNote {
                    pitch: Note::new(pitch),
                    start: now,
                }),
                VoiceEventKind::NoteOff { pitch } => {
                    let pitch = Note::new(pitch);
                    match open.iter().position(|n| n.pitch == pitch) {
                        Some(idx) => {
                            let started = open.remove(idx);
                            merged
                                .entry((started.start, now - started.start))
                                .or_default()
                                .push(pitch);
                        }
                        None => {
                            warn!("note-off for {pitch} at tick {now} has no open note-on; ignored");
                            loss.stray_note_offs.push(StrayNoteOff { pitch, tick: now });
                        }
                    }
                }
                VoiceEventKind::Other => {}
            }
        }

        for note in &open {
            warn!(
                "note {} started at tick {} never ended; dropped",
                note.pitch, note.start
            );
        }
        loss.unterminated = open;

        let chords = merged
            .into_iter()
            .filter_map(|((time, duration), notes)| Chord::new(notes, time, duration))
            .collect();

        Melody { chords, loss }
    }

    /// Build a melody directly from chords (mainly for tests and callers
    /// that already have paired notes). Chords sharing (time, duration) are
    /// merged and the result is ordered the same way `from_events` orders it.
    pub fn from_chords(chords: impl IntoIterator<Item = Chord>) -> Self {
        let mut merged: BTreeMap<(u64, u64), Vec<Note>> = BTreeMap::new();
        for chord in chords {
            merged
                .entry((chord.time, chord.duration))
                .or_default()
                .extend_from_slice(chord.notes());
        }
        let chords = merged
            .into_iter()
            .filter_map(|((time, duration), notes)| Chord::new(notes, time, duration))
            .collect();
        Melody {
            chords,
            loss: PairingLoss::default(),
        }
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn pairing_loss(&self) -> &PairingLoss {
        &self.loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitches(chord: &Chord) -> Vec<u8> {
        chord.notes().iter().map(|n| n.value).collect()
    }

    #[test]
    fn test_sequential_notes() {
        // C4 quarter, then D4 quarter.
        let events = [
            VoiceEvent::note_on(0, 60),
            VoiceEvent::note_off(480, 60),
            VoiceEvent::note_on(0, 62),
            VoiceEvent::note_off(480, 62),
        ];
        let melody = Melody::from_events(&events);
        let chords = melody.chords();
        assert_eq!(chords.len(), 2);
        assert_eq!((chords[0].time, chords[0].duration), (0, 480));
        assert_eq!(pitches(&chords[0]), vec![60]);
        assert_eq!((chords[1].time, chords[1].duration), (480, 480));
        assert_eq!(pitches(&chords[1]), vec![62]);
        assert!(melody.pairing_loss().is_empty());
    }

    #[test]
    fn test_simultaneous_notes_merge_into_one_chord() {
        let events = [
            VoiceEvent::note_on(0, 60),
            VoiceEvent::note_on(0, 64),
            VoiceEvent::note_off(480, 60),
            VoiceEvent::note_off(0, 64),
        ];
        let melody = Melody::from_events(&events);
        assert_eq!(melody.chords().len(), 1);
        assert_eq!(pitches(&melody.chords()[0]), vec![60, 64]);
    }

    #[test]
    fn test_same_start_different_duration_stays_separate() {
        let events = [
            VoiceEvent::note_on(0, 60),
            VoiceEvent::note_on(0, 64),
            VoiceEvent::note_off(240, 64),
            VoiceEvent::note_off(240, 60),
        ];
        let melody = Melody::from_events(&events);
        let chords = melody.chords();
        assert_eq!(chords.len(), 2);
        assert_eq!((chords[0].time, chords[0].duration), (0, 240));
        assert_eq!(pitches(&chords[0]), vec![64]);
        assert_eq!((chords[1].time, chords[1].duration), (0, 480));
    }

    #[test]
    fn test_overlapping_same_pitch_pairs_with_first_open_note() {
        // Two overlapping C4s: the first note-off closes the earliest one.
        let events = [
            VoiceEvent::note_on(0, 60),   // A starts at 0
            VoiceEvent::note_on(100, 60), // B starts at 100
            VoiceEvent::note_off(200, 60), // closes A at 300
            VoiceEvent::note_off(100, 60), // closes B at 400
        ];
        let melody = Melody::from_events(&events);
        let spans: Vec<(u64, u64)> = melody.chords().iter().map(|c| (c.time, c.duration)).collect();
        assert_eq!(spans, vec![(0, 300), (100, 300)]);
    }

    #[test]
    fn test_other_events_advance_the_clock() {
        let events = [
            VoiceEvent::other(120),
            VoiceEvent::note_on(0, 60),
            VoiceEvent::other(100),
            VoiceEvent::note_off(380, 60),
        ];
        let melody = Melody::from_events(&events);
        assert_eq!(melody.chords().len(), 1);
        assert_eq!((melody.chords()[0].time, melody.chords()[0].duration), (120, 480));
    }

    #[test]
    fn test_unterminated_and_stray_events_are_reported() {
        let events = [
            VoiceEvent::note_off(0, 55), // nothing open
            VoiceEvent::note_on(0, 60),
            VoiceEvent::note_off(480, 60),
            VoiceEvent::note_on(0, 62), // never ends
        ];
        let melody = Melody::from_events(&events);
        assert_eq!(melody.chords().len(), 1);

        let loss = melody.pairing_loss();
        assert_eq!(
            loss.unterminated,
            vec![OpenNote {
                pitch: Note::new(62),
                start: 480
            }]
        );
        assert_eq!(
            loss.stray_note_offs,
            vec![StrayNoteOff {
                pitch: Note::new(55),
                tick: 0
            }]
        );
    }

    #[test]
    fn test_construction_is_deterministic() {
        let events = [
            VoiceEvent::note_on(0, 67),
            VoiceEvent::note_on(0, 60),
            VoiceEvent::note_off(480, 67),
            VoiceEvent::note_on(0, 64),
            VoiceEvent::note_off(0, 60),
            VoiceEvent::note_off(480, 64),
        ];
        assert_eq!(Melody::from_events(&events), Melody::from_events(&events));
    }

    #[test]
    fn test_chords_never_invent_time() {
        // Every chord must end at or before the last event's absolute tick.
        let events = [
            VoiceEvent::note_on(0, 60),
            VoiceEvent::note_on(120, 64),
            VoiceEvent::note_off(360, 60),
            VoiceEvent::note_on(0, 67),
            VoiceEvent::note_off(240, 64),
            VoiceEvent::note_off(0, 67),
        ];
        let last_tick: u64 = events.iter().map(|e| u64::from(e.delta)).sum();
        let melody = Melody::from_events(&events);
        assert_eq!(melody.chords().len(), 3);
        for chord in melody.chords() {
            assert!(chord.end() <= last_tick);
        }
    }

    #[test]
    fn test_from_chords_merges() {
        let melody = Melody::from_chords([
            Chord::single(Note::new(64), 0, 480),
            Chord::single(Note::new(60), 0, 480),
            Chord::single(Note::new(62), 480, 480),
        ]);
        assert_eq!(melody.chords().len(), 2);
        assert_eq!(pitches(&melody.chords()[0]), vec![60, 64]);
    }
}
