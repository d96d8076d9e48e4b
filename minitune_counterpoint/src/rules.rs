// Counterpoint rule engine.
//
// Walks the sorted `PhrasePair` sequence once, left to right, and collects
// every rule failure as a `(FailureKind, tick)` record. There is no early
// exit: a clean pair contributes nothing, a bad one contributes one record
// per violation.
//
// Each rule is a plain function `(context, pairs, index) -> failures`
// registered in a `RuleSet`. Adding a rule means writing one function and
// registering it; existing rules are untouched. The only state threaded
// between pairs is a small `RuleContext` (the previous pair's harmonic
// interval, and the direct fifth or octave it found on the step into the
// current pair), folded by value.
//
// Implemented checks:
// - Harmonic consonance: every countermelody chord against the anchor.
// - Parallel fifths/octaves: same perfect interval on consecutive pairs.
// - Direct fifths/octaves: both voices moving the same way into a perfect
//   interval. Each pair judges its own run (previous pair's last chord, its
//   own chords, next pair's first chord); a step counts if any run holding
//   it keeps one direction in both voices. Later motion never hides an
//   earlier failure. This does not yet require either voice to leap, so it
//   flags more than the textbook rule does.
//
// The other named rules (see `RuleId`) have no check behind them. Asking a
// `RuleSet` for one is an error rather than a silent no-op.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chord::Chord;
use crate::error::AnalysisError;
use crate::note::NoteRelationship;
use crate::phrase::{PhrasePair, Voice};

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    IntervalNotConsonant,
    ParallelFifth,
    ParallelOctave,
    DirectFifth,
    DirectOctave,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::IntervalNotConsonant => "dissonant harmonic interval",
            FailureKind::ParallelFifth => "parallel fifths",
            FailureKind::ParallelOctave => "parallel octaves",
            FailureKind::DirectFifth => "direct fifth",
            FailureKind::DirectOctave => "direct octave",
        };
        f.write_str(text)
    }
}

/// One rule violation at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub tick: u64,
}

impl Failure {
    pub fn new(kind: FailureKind, tick: u64) -> Self {
        Failure { kind, tick }
    }
}

/// The counterpoint rule roster. Only the first three have checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    HarmonicConsonance,
    ParallelFifthsOctaves,
    DirectFifthsOctaves,
    FinalTonicResolution,
    TritoneAvoidance,
    AugmentedSecondAvoidance,
    KeySignatureAdherence,
    LeadingToneResolution,
    StepLeapShape,
    SuccessiveLeapLimit,
    SimultaneousLeaps,
}

impl RuleId {
    pub const ALL: [RuleId; 11] = [
        RuleId::HarmonicConsonance,
        RuleId::ParallelFifthsOctaves,
        RuleId::DirectFifthsOctaves,
        RuleId::FinalTonicResolution,
        RuleId::TritoneAvoidance,
        RuleId::AugmentedSecondAvoidance,
        RuleId::KeySignatureAdherence,
        RuleId::LeadingToneResolution,
        RuleId::StepLeapShape,
        RuleId::SuccessiveLeapLimit,
        RuleId::SimultaneousLeaps,
    ];

    /// Rules with a check, in evaluation order.
    pub const IMPLEMENTED: [RuleId; 3] = [
        RuleId::HarmonicConsonance,
        RuleId::ParallelFifthsOctaves,
        RuleId::DirectFifthsOctaves,
    ];

    /// The built-in check for this rule, if there is one.
    pub fn check(self) -> Option<RuleFn> {
        match self {
            RuleId::HarmonicConsonance => Some(check_consonance as RuleFn),
            RuleId::ParallelFifthsOctaves => Some(check_parallel_motion as RuleFn),
            RuleId::DirectFifthsOctaves => Some(check_direct_motion as RuleFn),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RuleId::HarmonicConsonance => "harmonic_consonance",
            RuleId::ParallelFifthsOctaves => "parallel_fifths_octaves",
            RuleId::DirectFifthsOctaves => "direct_fifths_octaves",
            RuleId::FinalTonicResolution => "final_tonic_resolution",
            RuleId::TritoneAvoidance => "tritone_avoidance",
            RuleId::AugmentedSecondAvoidance => "augmented_second_avoidance",
            RuleId::KeySignatureAdherence => "key_signature_adherence",
            RuleId::LeadingToneResolution => "leading_tone_resolution",
            RuleId::StepLeapShape => "step_leap_shape",
            RuleId::SuccessiveLeapLimit => "successive_leap_limit",
            RuleId::SimultaneousLeaps => "simultaneous_leaps",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Melodic direction of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Still,
}

impl Direction {
    pub fn of(semitones: i16) -> Self {
        match semitones.signum() {
            1 => Direction::Up,
            -1 => Direction::Down,
            _ => Direction::Still,
        }
    }

    fn between(from: &Chord, to: &Chord) -> Result<Self, AnalysisError> {
        Ok(Direction::of(from.motion_to(to)?))
    }
}

/// State carried from one pair to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleContext {
    /// Interval between the first chords of the previous pair.
    pub previous_interval: Option<NoteRelationship>,
    /// Direct fifth or octave the previous pair found on the step leaving
    /// its own melody chord. That step is also the first step of the
    /// current pair's run.
    pub previous_direct: Option<Failure>,
}

impl RuleContext {
    /// Context for the pair after `index`.
    fn after(pairs: &[PhrasePair], index: usize) -> Result<Self, AnalysisError> {
        let current = &pairs[index];
        let departure = current.anchor().time;
        let previous_direct = direct_motion_failures(pairs, index)?
            .into_iter()
            .find(|failure| failure.tick == departure);
        Ok(RuleContext {
            previous_interval: opening_interval(current)?,
            previous_direct,
        })
    }
}

/// Harmonic interval between a pair's first melody and countermelody chords.
fn opening_interval(pair: &PhrasePair) -> Result<Option<NoteRelationship>, AnalysisError> {
    match pair.counter_melody().first() {
        Some(counter) => Ok(Some(pair.anchor().relate(counter)?)),
        None => Ok(None),
    }
}

/// A rule check: failures for the pair at `index`.
pub type RuleFn =
    fn(&RuleContext, &[PhrasePair], usize) -> Result<Vec<Failure>, AnalysisError>;

/// Ordered list of registered rules.
#[derive(Clone)]
pub struct RuleSet {
    rules: Vec<(RuleId, RuleFn)>,
}

impl RuleSet {
    pub fn empty() -> Self {
        RuleSet { rules: Vec::new() }
    }

    /// Every implemented rule, in roster order.
    pub fn standard() -> Self {
        let mut set = RuleSet::empty();
        for id in RuleId::IMPLEMENTED {
            if let Some(check) = id.check() {
                set.register(id, check);
            }
        }
        set
    }

    /// Built-in checks for the given rules, in the given order.
    ///
    /// Fails with `AnalysisError::UnimplementedRule` for a rule that has no check.
    pub fn from_ids(ids: &[RuleId]) -> Result<Self, AnalysisError> {
        let mut set = RuleSet::empty();
        for &id in ids {
            let check = id.check().ok_or(AnalysisError::UnimplementedRule(id))?;
            set.register(id, check);
        }
        Ok(set)
    }

    /// Append a rule. It runs after every rule registered before it.
    pub fn register(&mut self, id: RuleId, check: RuleFn) -> &mut Self {
        self.rules.push((id, check));
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules.iter().map(|&(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet::standard()
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// Run every rule over every pair, in order.
///
/// `pairs` may be any slice of a pair sequence; the first pair in the slice
/// has no previous context.
pub fn evaluate(pairs: &[PhrasePair], rules: &RuleSet) -> Result<Vec<Failure>, AnalysisError> {
    let (_, failures) = (0..pairs.len()).try_fold(
        (RuleContext::default(), Vec::new()),
        |(context, mut failures), index| {
            for (_, check) in &rules.rules {
                failures.extend(check(&context, pairs, index)?);
            }
            Ok::<_, AnalysisError>((RuleContext::after(pairs, index)?, failures))
        },
    )?;
    Ok(failures)
}

// ── Harmonic consonance ──

fn check_consonance(
    _context: &RuleContext,
    pairs: &[PhrasePair],
    index: usize,
) -> Result<Vec<Failure>, AnalysisError> {
    let pair = &pairs[index];
    let anchor = pair.anchor();
    let mut failures = Vec::new();
    for chord in &pair.counter_melody().chords {
        if !anchor.relate(chord)?.is_consonant() {
            failures.push(Failure::new(FailureKind::IntervalNotConsonant, chord.time));
        }
    }
    Ok(failures)
}

// ── Parallel fifths / octaves ──

fn check_parallel_motion(
    context: &RuleContext,
    pairs: &[PhrasePair],
    index: usize,
) -> Result<Vec<Failure>, AnalysisError> {
    if index == 0 {
        return Ok(Vec::new());
    }
    let pair = &pairs[index];
    let (Some(previous), Some(current)) = (context.previous_interval, opening_interval(pair)?)
    else {
        return Ok(Vec::new());
    };
    if !previous.same_class(current) {
        return Ok(Vec::new());
    }

    let tick = pair.anchor().time;
    let failure = if current == NoteRelationship::PerfectFifth {
        Some(Failure::new(FailureKind::ParallelFifth, tick))
    } else if current.is_unison_or_octave() {
        Some(Failure::new(FailureKind::ParallelOctave, tick))
    } else {
        None
    };
    Ok(failure.into_iter().collect())
}

// ── Direct fifths / octaves ──

/// One voice's chords around a pair: the previous pair's last chord, the
/// pair's own chords, then the next pair's first chord.
struct NeighborLine<'a> {
    chords: Vec<&'a Chord>,
}

impl<'a> NeighborLine<'a> {
    fn around(pairs: &'a [PhrasePair], index: usize, voice: Voice) -> Self {
        let mut chords = Vec::new();
        if let Some(previous) = index.checked_sub(1).and_then(|i| pairs.get(i)) {
            chords.extend(previous.phrase(voice).last());
        }
        chords.extend(pairs[index].phrase(voice).chords.iter());
        if let Some(next) = pairs.get(index + 1) {
            chords.extend(next.phrase(voice).first());
        }
        NeighborLine { chords }
    }

    /// The direction this line holds across every step, if it holds one.
    ///
    /// The first step sets the direction and any step that disagrees ends
    /// the run. Standing still never counts as a direction.
    fn steady_direction(&self) -> Result<Option<Direction>, AnalysisError> {
        let [first, second, ..] = self.chords.as_slice() else {
            return Ok(None);
        };
        let established = Direction::between(first, second)?;
        if established == Direction::Still {
            return Ok(None);
        }
        for step in self.chords.windows(2).skip(1) {
            if Direction::between(step[0], step[1])? != established {
                return Ok(None);
            }
        }
        Ok(Some(established))
    }
}

fn check_direct_motion(
    context: &RuleContext,
    pairs: &[PhrasePair],
    index: usize,
) -> Result<Vec<Failure>, AnalysisError> {
    let mut failures = direct_motion_failures(pairs, index)?;
    // Already reported by the previous pair, whose run shares this step.
    failures.retain(|failure| Some(*failure) != context.previous_direct);
    Ok(failures)
}

/// Direct fifths and octaves inside one pair's run, recorded at the
/// departing melody chord.
fn direct_motion_failures(pairs: &[PhrasePair], index: usize) -> Result<Vec<Failure>, AnalysisError> {
    let melody = NeighborLine::around(pairs, index, Voice::Melody);
    let counter = NeighborLine::around(pairs, index, Voice::CounterMelody);
    match (melody.steady_direction()?, counter.steady_direction()?) {
        (Some(m), Some(c)) if m == c => {}
        _ => return Ok(Vec::new()),
    }

    let mut failures = Vec::new();
    for (m, c) in melody.chords.windows(2).zip(counter.chords.windows(2)) {
        let before = m[0].relate(c[0])?;
        let after = m[1].relate(c[1])?;
        if before.same_class(after) {
            // Perfect-to-same-perfect is parallel motion, reported elsewhere.
            continue;
        }
        let kind = if after == NoteRelationship::PerfectFifth {
            FailureKind::DirectFifth
        } else if after.is_unison_or_octave() {
            FailureKind::DirectOctave
        } else {
            continue;
        };
        failures.push(Failure::new(kind, m[0].time));
    }
    Ok(failures)
}
