// Minitune Counterpoint Analyzer
//
// Checks a two-voice piece (melody + countermelody) against the rules of
// first-species counterpoint and reports each violation with the tick where
// it happens. Input is a Standard MIDI File or raw per-voice event streams.
//
// Architecture:
// - note.rs: Notes and the 13 interval relationships between two notes
// - chord.rs: Timed sets of simultaneous notes; single-note relate/motion
// - melody.rs: Note-on/note-off pairing into chords, with loss reporting
// - phrase.rs: Segmentation of the countermelody under each melody chord
// - rules.rs: Rule roster, per-pair context, and the three implemented checks
//   (harmonic consonance, parallel and direct fifths/octaves)
// - score.rs: Two-voice container, beat grid, evaluation entry point
// - report.rs: Failures located by measure/beat, plus dropped-input diagnostics
// - midi.rs: MIDI file decoding (and encoding, for fixtures)
// - config.rs: JSON analysis configuration (rule selection, strict mode)
// - error.rs: The error type shared by all of the above
//
// Analysis is pure and deterministic: the same input always yields the same
// failures in the same order.

pub mod chord;
pub mod config;
pub mod error;
pub mod melody;
pub mod midi;
pub mod note;
pub mod phrase;
pub mod report;
pub mod rules;
pub mod score;

pub use error::AnalysisError;
pub use score::{Score, TimeSignature};
