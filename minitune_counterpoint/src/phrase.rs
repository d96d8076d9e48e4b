// Phrase alignment: pairing each melody chord with the countermelody chords
// that sound entirely inside it.
//
// For every melody chord we scan the whole countermelody and keep the chords
// whose [time, time + duration] span nests inside the melody chord's span.
// That is O(melody × countermelody), which is fine for a single piece; the
// scores this runs on are short.
//
// The resulting `PhrasePair`s are stably sorted by start time. This
// left-to-right order is what the rules in rules.rs mean by "previous" and
// "next".
//
// A countermelody chord that straddles a melody chord boundary (or sits in a
// melody rest) belongs to no pair. Those chords are returned alongside the
// pairs so the score can surface them instead of losing them silently.

use log::{debug, warn};

use crate::chord::Chord;
use crate::melody::Melody;

/// The two voices of a score, in track order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Voice {
    Melody = 0,
    CounterMelody = 1,
}

impl Voice {
    pub const ALL: [Voice; 2] = [Voice::Melody, Voice::CounterMelody];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A window over one voice's chords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub chords: Vec<Chord>,
    pub start_time: u64,
    pub duration: u64,
}

impl Phrase {
    pub fn new(chords: Vec<Chord>, start_time: u64, duration: u64) -> Self {
        Phrase {
            chords,
            start_time,
            duration,
        }
    }

    /// True if `chord` lies entirely inside this phrase's window.
    pub fn contains(&self, chord: &Chord) -> bool {
        chord.is_within(self.start_time, self.duration)
    }

    pub fn first(&self) -> Option<&Chord> {
        self.chords.first()
    }

    pub fn last(&self) -> Option<&Chord> {
        self.chords.last()
    }
}

/// One melody chord (the anchor) and the countermelody chords nested in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhrasePair {
    /// Always exactly one chord.
    melody: Phrase,
    counter_melody: Phrase,
    pub start_time: u64,
    pub duration: u64,
}

impl PhrasePair {
    /// Pair a melody chord with whatever countermelody chords fit inside it.
    pub fn anchored_at(anchor: Chord, counter_melody: &[Chord]) -> Self {
        let start_time = anchor.time;
        let duration = anchor.duration;
        let melody = Phrase::new(vec![anchor], start_time, duration);
        let nested = counter_melody
            .iter()
            .filter(|c| melody.contains(c))
            .cloned()
            .collect();
        PhrasePair {
            melody,
            counter_melody: Phrase::new(nested, start_time, duration),
            start_time,
            duration,
        }
    }

    /// The single melody chord defining this pair's window.
    pub fn anchor(&self) -> &Chord {
        // `anchored_at` is the only constructor and always stores one chord.
        &self.melody.chords[0]
    }

    pub fn melody(&self) -> &Phrase {
        &self.melody
    }

    pub fn counter_melody(&self) -> &Phrase {
        &self.counter_melody
    }

    pub fn phrase(&self, voice: Voice) -> &Phrase {
        match voice {
            Voice::Melody => &self.melody,
            Voice::CounterMelody => &self.counter_melody,
        }
    }
}

/// The aligned pair sequence plus the countermelody chords it could not place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub pairs: Vec<PhrasePair>,
    pub uncontained: Vec<Chord>,
}

/// Align the countermelody against every melody chord.
pub fn align(melody: &Melody, counter_melody: &Melody) -> Alignment {
    let counter = counter_melody.chords();
    let mut pairs: Vec<PhrasePair> = melody
        .chords()
        .iter()
        .map(|anchor| PhrasePair::anchored_at(anchor.clone(), counter))
        .collect();
    // Stable: ties keep melody order.
    pairs.sort_by_key(|p| p.start_time);

    let uncontained: Vec<Chord> = counter
        .iter()
        .filter(|c| !pairs.iter().any(|p| p.melody().contains(c)))
        .cloned()
        .collect();
    for chord in &uncontained {
        warn!(
            "countermelody chord at tick {} (duration {}) is not inside any melody chord; excluded",
            chord.time, chord.duration
        );
    }
    debug!(
        "aligned {} melody chords against {} countermelody chords",
        pairs.len(),
        counter.len()
    );

    Alignment { pairs, uncontained }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;

    fn chord(pitch: u8, time: u64, duration: u64) -> Chord {
        Chord::single(Note::new(pitch), time, duration)
    }

    #[test]
    fn test_first_species_alignment() {
        let melody = Melody::from_chords([chord(60, 0, 480), chord(62, 480, 480)]);
        let counter = Melody::from_chords([chord(67, 0, 480), chord(69, 480, 480)]);
        let alignment = align(&melody, &counter);

        assert_eq!(alignment.pairs.len(), 2);
        assert!(alignment.uncontained.is_empty());
        assert_eq!(alignment.pairs[0].anchor().notes(), &[Note::new(60)]);
        assert_eq!(alignment.pairs[0].counter_melody().chords, vec![chord(67, 0, 480)]);
        assert_eq!(alignment.pairs[1].start_time, 480);
        assert_eq!(alignment.pairs[1].counter_melody().chords, vec![chord(69, 480, 480)]);
    }

    #[test]
    fn test_second_species_nests_two_chords() {
        let melody = Melody::from_chords([chord(60, 0, 960)]);
        let counter = Melody::from_chords([chord(64, 0, 480), chord(67, 480, 480)]);
        let alignment = align(&melody, &counter);
        assert_eq!(alignment.pairs.len(), 1);
        assert_eq!(alignment.pairs[0].counter_melody().chords.len(), 2);
    }

    #[test]
    fn test_straddling_chord_is_uncontained() {
        let melody = Melody::from_chords([chord(60, 0, 480), chord(62, 480, 480)]);
        // Starts inside the first window, ends inside the second.
        let counter = Melody::from_chords([chord(64, 240, 480)]);
        let alignment = align(&melody, &counter);
        assert!(alignment.pairs.iter().all(|p| p.counter_melody().chords.is_empty()));
        assert_eq!(alignment.uncontained, vec![chord(64, 240, 480)]);
    }

    #[test]
    fn test_every_nested_chord_is_inside_its_window() {
        let melody = Melody::from_chords([chord(60, 0, 960), chord(65, 960, 480), chord(64, 1440, 960)]);
        let counter = Melody::from_chords([
            chord(67, 0, 240),
            chord(69, 240, 720),
            chord(72, 960, 480),
            chord(71, 1300, 400),
            chord(72, 1700, 700),
        ]);
        let alignment = align(&melody, &counter);
        for pair in &alignment.pairs {
            for c in &pair.counter_melody().chords {
                assert!(pair.melody().start_time <= c.time);
                assert!(c.time + c.duration <= pair.melody().start_time + pair.melody().duration);
            }
        }
        assert_eq!(alignment.uncontained, vec![chord(71, 1300, 400)]);
    }

    #[test]
    fn test_pairs_sorted_by_start_time() {
        // Same start, different durations: both melody chords get a pair.
        let melody = Melody::from_chords([chord(62, 480, 480), chord(60, 0, 480), chord(64, 0, 240)]);
        let counter = Melody::from_chords(Vec::new());
        let alignment = align(&melody, &counter);
        let starts: Vec<u64> = alignment.pairs.iter().map(|p| p.start_time).collect();
        assert_eq!(starts, vec![0, 0, 480]);
    }
}
