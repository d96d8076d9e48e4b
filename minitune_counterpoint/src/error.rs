// Error taxonomy for the analysis pipeline.
//
// Every fatal condition aborts the whole analysis for a score: the pipeline
// is pure and deterministic, so there is nothing to retry. The caller fixes
// the input and calls again.
//
// - Configuration errors: wrong track count, degenerate timing, a rule that
//   has a name but no implementation.
// - Unsupported operations: relating chords that hold more than one note.
// - Data loss: only raised in strict mode; otherwise dropped notes and
//   chords are reported through `Diagnostics` (see `report.rs`).
// - Input errors: MIDI decoding, file I/O, config JSON.
// - Output errors: values a MIDI file cannot hold when encoding.

use thiserror::Error;

use crate::rules::RuleId;

/// Errors produced while building or evaluating a score.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A score needs exactly one melody track and one countermelody track.
    #[error("expected exactly 2 voice tracks, got {got}")]
    TrackCount { got: usize },

    /// Interval relations are only defined between single-note chords.
    #[error(
        "cannot relate chord at tick {left_tick} ({left_notes} notes) to chord at tick {right_tick} ({right_notes} notes): both must hold exactly one note"
    )]
    MultiNoteRelation {
        left_tick: u64,
        left_notes: usize,
        right_tick: u64,
        right_notes: usize,
    },

    /// The rule is named in the roster but has no check behind it.
    #[error("rule `{0}` is not implemented")]
    UnimplementedRule(RuleId),

    /// Ticks-per-beat or time signature cannot describe a measure.
    #[error("invalid timing: {0}")]
    InvalidTiming(String),

    /// SMPTE timecode files carry no beat grid.
    #[error("unsupported MIDI timing: only metrical (ticks per beat) files can be analyzed")]
    UnsupportedTiming,

    /// Strict mode: notes or chords would have been dropped silently.
    #[error("input would lose data: {0}")]
    DataLoss(String),

    /// A value outside what a MIDI file can hold.
    #[error("cannot encode as MIDI: {0}")]
    Unencodable(String),

    #[error("MIDI decode error: {0}")]
    Midi(#[from] midly::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
