// Analysis output: located failures plus everything the pipeline dropped.
//
// A `Report` is what the CLI prints (as text via `Display`, or as JSON). Each
// failure keeps its absolute tick and gains a measure/beat position computed
// from the score's grid. `Diagnostics` makes the silent-loss cases
// observable: unterminated notes and stray note-offs from pairing, and
// countermelody chords that no melody chord contains.

use std::fmt;

use serde::Serialize;

use crate::chord::Chord;
use crate::melody::PairingLoss;
use crate::rules::{Failure, RuleId, RuleSet};
use crate::score::Score;

/// 1-based measure and beat, plus ticks into the beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub measure: u64,
    pub beat: u64,
    pub offset: u64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}:b{}", self.measure, self.beat)?;
        if self.offset > 0 {
            write!(f, "+{}", self.offset)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub melody: PairingLoss,
    pub counter_melody: PairingLoss,
    /// Countermelody chords outside every melody window.
    pub uncontained: Vec<Chord>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.melody.is_empty() && self.counter_melody.is_empty() && self.uncontained.is_empty()
    }

    /// One-line account of what was dropped.
    pub fn describe(&self) -> String {
        let unterminated = self.melody.unterminated.len() + self.counter_melody.unterminated.len();
        let stray = self.melody.stray_note_offs.len() + self.counter_melody.stray_note_offs.len();
        format!(
            "{unterminated} unterminated notes, {stray} unmatched note-offs, {} countermelody chords outside every melody chord",
            self.uncontained.len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocatedFailure {
    #[serde(flatten)]
    pub failure: Failure,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub rules: Vec<RuleId>,
    pub failures: Vec<LocatedFailure>,
    pub diagnostics: Diagnostics,
}

impl Report {
    pub fn new(score: &Score, rules: &RuleSet, failures: Vec<Failure>) -> Self {
        let failures = failures
            .into_iter()
            .map(|failure| LocatedFailure {
                failure,
                position: score.position(failure.tick),
            })
            .collect();
        Report {
            rules: rules.ids().collect(),
            failures,
            diagnostics: score.diagnostics(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            writeln!(f, "No counterpoint failures.")?;
        } else {
            writeln!(f, "{} counterpoint failures:", self.failures.len())?;
            for located in &self.failures {
                writeln!(
                    f,
                    "  {:>12}  tick {:>6}  {}",
                    located.position.to_string(),
                    located.failure.tick,
                    located.failure.kind
                )?;
            }
        }
        if !self.diagnostics.is_clean() {
            writeln!(f, "Dropped input: {}", self.diagnostics.describe())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::VoiceEvent;
    use crate::rules::FailureKind;
    use crate::score::TimeSignature;

    fn voice(pitches: &[u8]) -> Vec<VoiceEvent> {
        pitches
            .iter()
            .flat_map(|&p| [VoiceEvent::note_on(0, p), VoiceEvent::note_off(480, p)])
            .collect()
    }

    #[test]
    fn test_report_locates_failures() {
        let tracks = vec![voice(&[60, 62, 64, 65, 67]), voice(&[64, 65, 67, 69, 74])];
        let score = Score::new(&tracks, 480, TimeSignature::default()).unwrap();
        let report = score.report(&RuleSet::standard()).unwrap();

        // 67 against 74 is a fifth reached by similar motion from a third.
        assert_eq!(report.failures.len(), 1);
        let located = report.failures[0];
        assert_eq!(located.failure, Failure::new(FailureKind::DirectFifth, 1440));
        assert_eq!(located.position, Position { measure: 1, beat: 4, offset: 0 });
        assert!(report.diagnostics.is_clean());
    }

    #[test]
    fn test_report_json_shape() {
        let tracks = vec![voice(&[60, 62]), voice(&[67, 69])];
        let score = Score::new(&tracks, 480, TimeSignature::default()).unwrap();
        let report = score.report(&RuleSet::standard()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["failures"][0]["kind"], "PARALLEL_FIFTH");
        assert_eq!(json["failures"][0]["tick"], 480);
        assert_eq!(json["failures"][0]["position"]["beat"], 2);
        assert_eq!(json["rules"][0], "harmonic_consonance");
    }

    #[test]
    fn test_display() {
        let tracks = vec![voice(&[60]), voice(&[61])];
        let score = Score::new(&tracks, 480, TimeSignature::default()).unwrap();
        let text = score.report(&RuleSet::standard()).unwrap().to_string();
        assert!(text.starts_with("1 counterpoint failures:"));
        assert!(text.contains("m1:b1"));
        assert!(text.contains("dissonant harmonic interval"));
    }
}
