// The score: two voices, their alignment, and the beat grid.
//
// A score owns exactly two melodies built from two voice tracks: track 0 is
// the melody (cantus), track 1 the countermelody. Construction runs the whole
// pipeline up front (events -> melodies -> phrase pairs) so evaluation is a
// single pass over the pairs. Nothing is updated incrementally; build a new
// score for new input.
//
// Timing follows MIDI conventions: `ticks_per_beat` counts ticks per quarter
// note, and the time signature's denominator sets the beat unit, so a
// measure spans `ticks_per_beat * 4 * numerator / denominator` ticks.
//
// See rules.rs for the evaluation itself and report.rs for the output shape.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::melody::{Melody, VoiceEvent};
use crate::midi::MidiInput;
use crate::phrase::{Alignment, PhrasePair, Voice, align};
use crate::report::{Diagnostics, Position, Report};
use crate::rules::{self, Failure, RuleSet};

/// Number of voice tracks a score is built from.
pub const VOICE_COUNT: usize = 2;

/// Beats per measure over the beat unit (4 = quarter, 8 = eighth, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        TimeSignature {
            numerator,
            denominator,
        }
    }

    /// Ticks per beat unit, given ticks per quarter note.
    fn ticks_per_unit(self, ticks_per_beat: u32) -> Result<u64, AnalysisError> {
        if self.numerator == 0 {
            return Err(AnalysisError::InvalidTiming(format!(
                "time signature {self} has no beats"
            )));
        }
        if !self.denominator.is_power_of_two() {
            return Err(AnalysisError::InvalidTiming(format!(
                "time signature {self} has a beat unit that is not a power of two"
            )));
        }
        let whole_note = u64::from(ticks_per_beat) * 4;
        let denominator = u64::from(self.denominator);
        if whole_note % denominator != 0 {
            return Err(AnalysisError::InvalidTiming(format!(
                "{ticks_per_beat} ticks per quarter note cannot be split into 1/{denominator} notes"
            )));
        }
        Ok(whole_note / denominator)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::new(4, 4)
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

#[derive(Debug, Clone)]
pub struct Score {
    melodies: [Melody; VOICE_COUNT],
    time_signature: TimeSignature,
    ticks_per_beat: u32,
    ticks_per_unit: u64,
    ticks_per_measure: u64,
    alignment: Alignment,
}

impl Score {
    /// Build a score from exactly two voice tracks with the default config.
    pub fn new(
        tracks: &[Vec<VoiceEvent>],
        ticks_per_beat: u32,
        time_signature: TimeSignature,
    ) -> Result<Self, AnalysisError> {
        Score::with_config(tracks, ticks_per_beat, time_signature, &AnalysisConfig::default())
    }

    /// Build a score from exactly two voice tracks.
    ///
    /// Fails with `TrackCount` for any other number of tracks and
    /// `InvalidTiming` for a grid that cannot describe a measure. In strict
    /// mode, input that would drop notes or chords fails with `DataLoss`.
    pub fn with_config(
        tracks: &[Vec<VoiceEvent>],
        ticks_per_beat: u32,
        time_signature: TimeSignature,
        config: &AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        let [melody_events, counter_events] = tracks else {
            return Err(AnalysisError::TrackCount { got: tracks.len() });
        };
        if ticks_per_beat == 0 {
            return Err(AnalysisError::InvalidTiming(
                "ticks per beat must be positive".to_string(),
            ));
        }
        let ticks_per_unit = time_signature.ticks_per_unit(ticks_per_beat)?;
        let ticks_per_measure = ticks_per_unit * u64::from(time_signature.numerator);

        let melodies = [
            Melody::from_events(melody_events),
            Melody::from_events(counter_events),
        ];
        let alignment = align(&melodies[0], &melodies[1]);
        debug!(
            "score: {} melody chords, {} countermelody chords, {} phrase pairs, {} ticks per measure",
            melodies[0].chords().len(),
            melodies[1].chords().len(),
            alignment.pairs.len(),
            ticks_per_measure
        );

        let score = Score {
            melodies,
            time_signature,
            ticks_per_beat,
            ticks_per_unit,
            ticks_per_measure,
            alignment,
        };

        if config.strict {
            let diagnostics = score.diagnostics();
            if !diagnostics.is_clean() {
                return Err(AnalysisError::DataLoss(diagnostics.describe()));
            }
        }
        Ok(score)
    }

    /// Build a score from a decoded MIDI file's voice tracks.
    pub fn from_midi(input: &MidiInput, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Score::with_config(
            &input.tracks,
            u32::from(input.ticks_per_beat),
            input.time_signature,
            config,
        )
    }

    pub fn melody(&self, voice: Voice) -> &Melody {
        &self.melodies[voice.index()]
    }

    /// Phrase pairs sorted by start time.
    pub fn phrase_pairs(&self) -> &[PhrasePair] {
        &self.alignment.pairs
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat
    }

    pub fn ticks_per_measure(&self) -> u64 {
        self.ticks_per_measure
    }

    /// Everything pairing and alignment had to drop.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            melody: self.melody(Voice::Melody).pairing_loss().clone(),
            counter_melody: self.melody(Voice::CounterMelody).pairing_loss().clone(),
            uncontained: self.alignment.uncontained.clone(),
        }
    }

    /// Every failure across the whole pair sequence, in evaluation order.
    pub fn evaluate(&self, rules: &RuleSet) -> Result<Vec<Failure>, AnalysisError> {
        rules::evaluate(self.phrase_pairs(), rules)
    }

    /// Failures located on the measure grid, plus diagnostics.
    pub fn report(&self, rules: &RuleSet) -> Result<Report, AnalysisError> {
        let failures = self.evaluate(rules)?;
        Ok(Report::new(self, rules, failures))
    }

    /// 1-based measure and beat containing `tick`.
    pub fn position(&self, tick: u64) -> Position {
        let in_measure = tick % self.ticks_per_measure;
        Position {
            measure: tick / self.ticks_per_measure + 1,
            beat: in_measure / self.ticks_per_unit + 1,
            offset: in_measure % self.ticks_per_unit,
        }
    }
}
