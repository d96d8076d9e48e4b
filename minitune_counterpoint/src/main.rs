// Minitune Counterpoint Analyzer: CLI entry point.
//
// Reads a two-voice MIDI file, runs the configured counterpoint rules, and
// prints the report as text or JSON. The first voice track is the melody,
// the second the countermelody; a leading conductor track is skipped.
//
// Usage:
//   cargo run -p minitune_counterpoint --bin analyze -- piece.mid
//     [--config analysis.json] [--json]
//
// Logging goes to stderr through env_logger (RUST_LOG, default "warn"), so
// dropped notes and chords show up even in JSON mode without polluting
// stdout. Exits with status 1 on any error, 2 if the piece has failures.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;
use minitune_counterpoint::AnalysisError;
use minitune_counterpoint::chord::Chord;
use minitune_counterpoint::config::AnalysisConfig;
use minitune_counterpoint::midi::MidiInput;
use minitune_counterpoint::phrase::Voice;
use minitune_counterpoint::report::Report;
use minitune_counterpoint::score::Score;

#[derive(Parser, Debug)]
#[command(name = "analyze", about = "Check a two-voice MIDI file for counterpoint errors")]
struct Args {
    /// MIDI file with a melody track and a countermelody track
    midi: PathBuf,

    /// JSON analysis config (rule selection, strict mode)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Report, AnalysisError> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    let rules = config.rule_set()?;

    let input = MidiInput::load(&args.midi)?;
    info!(
        "{}: {} voice tracks, {} ticks/beat, {}",
        args.midi.display(),
        input.tracks.len(),
        input.ticks_per_beat,
        input.time_signature
    );
    let score = Score::from_midi(&input, &config)?;
    let report = score.report(&rules)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let end = score
            .melody(Voice::Melody)
            .chords()
            .iter()
            .map(Chord::end)
            .max()
            .unwrap_or(0);
        println!(
            "{}: {} phrase pairs, {:.1}s at {} ticks/beat in {}",
            args.midi.display(),
            score.phrase_pairs().len(),
            input.seconds_at(end),
            score.ticks_per_beat(),
            score.time_signature()
        );
        print!("{report}");
    }
    Ok(report)
}
