// MIDI file input (and output) for the analysis pipeline.
//
// Decodes a Standard MIDI File with `midly` into what `Score` needs: one
// `VoiceEvent` stream per voice track, ticks per quarter note, the time
// signature and the tempo. Only note-on/note-off survive as note events; a
// note-on with velocity 0 is a note-off by MIDI convention. Everything else
// becomes `VoiceEventKind::Other` so its delta still advances the clock.
//
// Track layout: in a multi-track file whose first track has no notes, that
// track is the conductor track (tempo, time signature) and is not a voice.
// Time signature and tempo are taken from the first matching meta events on
// the header track, falling back to 4/4 and 120 BPM.
//
// `MidiInput::to_bytes` writes the same shape back out as SMF Format 1
// (conductor track + one track per voice), which is handy for producing
// fixtures.

use std::path::Path;

use log::debug;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};

use crate::error::AnalysisError;
use crate::melody::{VoiceEvent, VoiceEventKind};
use crate::score::TimeSignature;

/// Microseconds per quarter note when a file sets no tempo (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;

const MAX_PITCH: u8 = 0x7f;
const MAX_DELTA: u32 = 0x0fff_ffff;
const MAX_TEMPO: u32 = 0x00ff_ffff;
const MAX_TICKS_PER_BEAT: u16 = 0x7fff;

/// A decoded MIDI file, reduced to what the analysis reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiInput {
    /// Voice tracks in file order (conductor track excluded).
    pub tracks: Vec<Vec<VoiceEvent>>,
    /// Ticks per quarter note.
    pub ticks_per_beat: u16,
    pub time_signature: TimeSignature,
    /// Microseconds per quarter note.
    pub tempo: u32,
}

impl MidiInput {
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let data = std::fs::read(path)?;
        MidiInput::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self, AnalysisError> {
        let smf = Smf::parse(data)?;
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks) => ticks.as_int(),
            Timing::Timecode(..) => return Err(AnalysisError::UnsupportedTiming),
        };
        if ticks_per_beat == 0 {
            return Err(AnalysisError::InvalidTiming(
                "file declares 0 ticks per quarter note".to_string(),
            ));
        }

        let header_track = smf.tracks.first().map(Vec::as_slice).unwrap_or_default();
        let time_signature = header_time_signature(header_track)?;
        let tempo = header_tempo(header_track);

        let skip = usize::from(smf.tracks.len() > 1 && !has_notes(header_track));
        let tracks: Vec<Vec<VoiceEvent>> = smf
            .tracks
            .iter()
            .skip(skip)
            .map(|track| track.iter().map(voice_event).collect())
            .collect();
        debug!(
            "decoded MIDI: {} tracks ({} voices), {ticks_per_beat} ticks/beat, {time_signature}, tempo {tempo}",
            smf.tracks.len(),
            tracks.len()
        );

        Ok(MidiInput {
            tracks,
            ticks_per_beat,
            time_signature,
            tempo,
        })
    }

    /// Wall-clock seconds at an absolute tick, at the file's (single) tempo.
    pub fn seconds_at(&self, tick: u64) -> f64 {
        tick as f64 * f64::from(self.tempo) / (f64::from(self.ticks_per_beat) * 1_000_000.0)
    }

    /// Encode as SMF Format 1: a conductor track, then one track per voice.
    ///
    /// Values MIDI cannot carry (pitch above 127, deltas of 2^28 ticks or
    /// more, and so on) are rejected rather than truncated.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AnalysisError> {
        if self.ticks_per_beat == 0 || self.ticks_per_beat > MAX_TICKS_PER_BEAT {
            return Err(AnalysisError::InvalidTiming(format!(
                "{} ticks per quarter note cannot be written as metrical timing",
                self.ticks_per_beat
            )));
        }
        if self.tempo > MAX_TEMPO {
            return Err(AnalysisError::InvalidTiming(format!(
                "tempo of {} microseconds per quarter note does not fit in 24 bits",
                self.tempo
            )));
        }
        if !self.time_signature.denominator.is_power_of_two() {
            return Err(AnalysisError::InvalidTiming(format!(
                "time signature {} cannot be written: denominator is not a power of two",
                self.time_signature
            )));
        }
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(self.ticks_per_beat)),
        ));

        // Track 0: conductor
        let denominator_power = self.time_signature.denominator.trailing_zeros() as u8;
        let conductor: Track<'static> = vec![
            meta_event(MetaMessage::Tempo(u24::new(self.tempo))),
            meta_event(MetaMessage::TimeSignature(
                self.time_signature.numerator,
                denominator_power,
                24,
                8,
            )),
            meta_event(MetaMessage::EndOfTrack),
        ];
        smf.tracks.push(conductor);

        for (index, events) in self.tracks.iter().enumerate() {
            let channel = u4::new((index % 16) as u8);
            let mut track: Track<'static> = events
                .iter()
                .map(|event| -> Result<TrackEvent<'static>, AnalysisError> {
                    Ok(TrackEvent {
                        delta: encode_delta(event.delta)?,
                        kind: match event.kind {
                            VoiceEventKind::NoteOn { pitch } => TrackEventKind::Midi {
                                channel,
                                message: MidiMessage::NoteOn {
                                    key: encode_pitch(pitch)?,
                                    vel: u7::new(80),
                                },
                            },
                            VoiceEventKind::NoteOff { pitch } => TrackEventKind::Midi {
                                channel,
                                message: MidiMessage::NoteOff {
                                    key: encode_pitch(pitch)?,
                                    vel: u7::new(0),
                                },
                            },
                            // Keeps the delta; the marker carries no data.
                            VoiceEventKind::Other => {
                                TrackEventKind::Meta(MetaMessage::Marker(b""))
                            }
                        },
                    })
                })
                .collect::<Result<_, _>>()?;
            track.push(meta_event(MetaMessage::EndOfTrack));
            smf.tracks.push(track);
        }

        let mut buf = Vec::new();
        smf.write_std(&mut buf)?;
        Ok(buf)
    }
}

fn encode_pitch(pitch: u8) -> Result<u7, AnalysisError> {
    if pitch > MAX_PITCH {
        return Err(AnalysisError::Unencodable(format!(
            "pitch {pitch} is outside the MIDI note range 0-127"
        )));
    }
    Ok(u7::new(pitch))
}

fn encode_delta(delta: u32) -> Result<u28, AnalysisError> {
    if delta > MAX_DELTA {
        return Err(AnalysisError::InvalidTiming(format!(
            "delta of {delta} ticks does not fit a MIDI variable-length quantity"
        )));
    }
    Ok(u28::new(delta))
}

fn meta_event(message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(message),
    }
}

fn voice_event(event: &TrackEvent<'_>) -> VoiceEvent {
    let delta = event.delta.as_int();
    match event.kind {
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } if vel.as_int() == 0 => VoiceEvent::note_off(delta, key.as_int()),
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { key, .. },
            ..
        } => VoiceEvent::note_on(delta, key.as_int()),
        TrackEventKind::Midi {
            message: MidiMessage::NoteOff { key, .. },
            ..
        } => VoiceEvent::note_off(delta, key.as_int()),
        _ => VoiceEvent::other(delta),
    }
}

fn has_notes(track: &[TrackEvent<'_>]) -> bool {
    track.iter().any(|event| {
        matches!(
            event.kind,
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. },
                ..
            }
        )
    })
}

fn header_time_signature(track: &[TrackEvent<'_>]) -> Result<TimeSignature, AnalysisError> {
    let found = track.iter().find_map(|event| match event.kind {
        TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, power, _, _)) => {
            Some((numerator, power))
        }
        _ => None,
    });
    let Some((numerator, power)) = found else {
        return Ok(TimeSignature::default());
    };
    let denominator = 1u8.checked_shl(u32::from(power)).ok_or_else(|| {
        AnalysisError::InvalidTiming(format!("time signature denominator 2^{power} is out of range"))
    })?;
    Ok(TimeSignature::new(numerator, denominator))
}

fn header_tempo(track: &[TrackEvent<'_>]) -> u32 {
    track
        .iter()
        .find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Some(tempo.as_int()),
            _ => None,
        })
        .unwrap_or(DEFAULT_TEMPO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midi_event(delta: u32, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message,
            },
        }
    }

    fn encode(smf: &Smf<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        smf.write_std(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_velocity_zero_note_on_is_note_off() {
        let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(96))));
        smf.tracks.push(vec![
            midi_event(0, MidiMessage::NoteOn { key: u7::new(60), vel: u7::new(90) }),
            midi_event(96, MidiMessage::NoteOn { key: u7::new(60), vel: u7::new(0) }),
            meta_event(MetaMessage::EndOfTrack),
        ]);
        let input = MidiInput::parse(&encode(&smf)).unwrap();

        assert_eq!(input.ticks_per_beat, 96);
        assert_eq!(input.tempo, DEFAULT_TEMPO);
        assert_eq!(input.time_signature, TimeSignature::default());
        // Single-track file: the only track is a voice.
        assert_eq!(
            input.tracks,
            vec![vec![
                VoiceEvent::note_on(0, 60),
                VoiceEvent::note_off(96, 60),
                VoiceEvent::other(0),
            ]]
        );
    }

    #[test]
    fn test_conductor_track_supplies_meta_and_is_skipped() {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(480))));
        smf.tracks.push(vec![
            meta_event(MetaMessage::TimeSignature(3, 2, 24, 8)),
            meta_event(MetaMessage::Tempo(u24::new(600_000))),
            meta_event(MetaMessage::EndOfTrack),
        ]);
        for pitch in [60, 67] {
            smf.tracks.push(vec![
                midi_event(0, MidiMessage::NoteOn { key: u7::new(pitch), vel: u7::new(64) }),
                midi_event(480, MidiMessage::NoteOff { key: u7::new(pitch), vel: u7::new(0) }),
                meta_event(MetaMessage::EndOfTrack),
            ]);
        }
        let input = MidiInput::parse(&encode(&smf)).unwrap();

        assert_eq!(input.tracks.len(), 2);
        assert_eq!(input.time_signature, TimeSignature::new(3, 4));
        assert_eq!(input.tempo, 600_000);
        assert!((input.seconds_at(960) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_timecode_is_rejected() {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Timecode(midly::Fps::Fps25, 40),
        ));
        smf.tracks.push(vec![meta_event(MetaMessage::EndOfTrack)]);
        assert!(matches!(
            MidiInput::parse(&encode(&smf)),
            Err(AnalysisError::UnsupportedTiming)
        ));
    }

    #[test]
    fn test_garbage_is_a_midi_error() {
        assert!(matches!(
            MidiInput::parse(b"definitely not a midi file"),
            Err(AnalysisError::Midi(_))
        ));
    }

    #[test]
    fn test_to_bytes_keeps_voices_and_meta() {
        let input = MidiInput {
            tracks: vec![
                vec![VoiceEvent::note_on(0, 60), VoiceEvent::note_off(480, 60)],
                vec![
                    VoiceEvent::other(0),
                    VoiceEvent::note_on(0, 64),
                    VoiceEvent::note_off(480, 64),
                ],
            ],
            ticks_per_beat: 480,
            time_signature: TimeSignature::new(6, 8),
            tempo: 400_000,
        };
        let decoded = MidiInput::parse(&input.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded.ticks_per_beat, 480);
        assert_eq!(decoded.time_signature, TimeSignature::new(6, 8));
        assert_eq!(decoded.tempo, 400_000);
        // Each voice gains an end-of-track event.
        assert_eq!(decoded.tracks[0][..2], input.tracks[0][..]);
        assert_eq!(decoded.tracks[1][..3], input.tracks[1][..]);
        assert_eq!(decoded.tracks[1][3], VoiceEvent::other(0));
    }

    #[test]
    fn test_to_bytes_rejects_values_midi_cannot_hold() {
        let input = |tracks: Vec<Vec<VoiceEvent>>| MidiInput {
            tracks,
            ticks_per_beat: 480,
            time_signature: TimeSignature::default(),
            tempo: DEFAULT_TEMPO,
        };

        let high_pitch = input(vec![vec![
            VoiceEvent::note_on(0, 128),
            VoiceEvent::note_off(480, 128),
        ]]);
        assert!(matches!(
            high_pitch.to_bytes(),
            Err(AnalysisError::Unencodable(_))
        ));

        let long_delta = input(vec![vec![
            VoiceEvent::note_on(0, 60),
            VoiceEvent::note_off(MAX_DELTA + 1, 60),
        ]]);
        assert!(matches!(
            long_delta.to_bytes(),
            Err(AnalysisError::InvalidTiming(_))
        ));

        // The largest values that fit still encode.
        let edge = input(vec![vec![
            VoiceEvent::note_on(0, MAX_PITCH),
            VoiceEvent::note_off(MAX_DELTA, MAX_PITCH),
        ]]);
        let decoded = MidiInput::parse(&edge.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.tracks[0][1], VoiceEvent::note_off(MAX_DELTA, MAX_PITCH));

        let mut slow = input(Vec::new());
        slow.tempo = MAX_TEMPO + 1;
        assert!(matches!(slow.to_bytes(), Err(AnalysisError::InvalidTiming(_))));

        let mut fine_grid = input(Vec::new());
        fine_grid.ticks_per_beat = MAX_TICKS_PER_BEAT + 1;
        assert!(matches!(
            fine_grid.to_bytes(),
            Err(AnalysisError::InvalidTiming(_))
        ));
    }
}
