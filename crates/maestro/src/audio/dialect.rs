//! The Code Lab music dialects
//!
//! Every dialect is a small pattern-matcher rather than a real parser: it turns
//! source text into [`SoundEvent`]s and never fails. Malformed input yields
//! fewer events, possibly none.

use std::sync::OnceLock;

use rand::{Rng, RngCore};
use regex::Regex;
use serde::Serialize;
use strum_macros::{Display, EnumIter};

use super::notes::{note_frequency, octave_frequency};
use super::{Drone, SchedulerEvent, SoundEvent, Waveform};

/// Step between note-sequence tokens; notes sound for less, leaving a gap
pub const NOTE_STEP: f64 = 0.5;
pub const NOTE_LENGTH: f64 = 0.4;
/// Length of a `play` tone
pub const PLAY_LENGTH: f64 = 0.4;
/// Step between pattern-string tokens
pub const PATTERN_STEP: f64 = 0.25;
pub const KICK_FREQUENCY: f64 = 60.0;
pub const HIT_LENGTH: f64 = 0.2;
/// Longest run one snippet may describe, in seconds. Events past it are dropped.
pub const MAX_TIMELINE: f64 = 300.0;

/// Languages that are accepted but have no interpreter of their own
pub const SIMULATED_LANGUAGES: [&str; 6] = [
    "supercollider",
    "csound",
    "chuck",
    "faust",
    "glicol",
    "puredata",
];

/// Virtual beat position for one interpretation, in seconds.
///
/// Starts at zero, can only move forward and stops at [`MAX_TIMELINE`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Cursor(f64);

impl Cursor {
    pub fn new() -> Self {
        Self(0.0)
    }

    pub fn position(&self) -> f64 {
        self.0
    }

    /// Ignores negative and non-finite steps
    pub fn advance(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.0 = (self.0 + seconds).min(MAX_TIMELINE);
        }
    }

    /// True once nothing more can be placed on this run's timeline
    pub fn exhausted(&self) -> bool {
        self.0 >= MAX_TIMELINE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Dialect {
    /// `instrument: c d e5` (alda)
    NoteSequence,
    /// `play N` and `sleep S` lines (sonic pi)
    LineCommand,
    /// First quoted pattern of `bd`/`sn` steps (tidal, strudel)
    PatternString,
    /// Generative drone standing in for heavyweight DSP languages
    Simulated,
}

impl Dialect {
    /// Case-insensitive exact match on a language tag
    pub fn for_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        match tag.as_str() {
            "alda" => Some(Dialect::NoteSequence),
            "sonicpi" | "sonic-pi" => Some(Dialect::LineCommand),
            "tidal" | "tidalcycles" | "strudel" => Some(Dialect::PatternString),
            other if SIMULATED_LANGUAGES.contains(&other) => Some(Dialect::Simulated),
            _ => None,
        }
    }

    /// Every accepted language tag
    pub fn tags() -> Vec<&'static str> {
        let mut tags = vec![
            "alda",
            "sonicpi",
            "sonic-pi",
            "tidal",
            "tidalcycles",
            "strudel",
        ];
        tags.extend(SIMULATED_LANGUAGES);
        tags
    }

    pub fn interpret(&self, source: &str, rng: &mut dyn RngCore) -> Vec<SoundEvent> {
        match self {
            Dialect::NoteSequence => note_sequence(source),
            Dialect::LineCommand => line_command(source),
            Dialect::PatternString => pattern_string(source),
            Dialect::Simulated => simulated(rng),
        }
    }
}

fn instrument_waveform(instrument: &str) -> Waveform {
    match instrument.trim().to_ascii_lowercase().as_str() {
        "piano" => Waveform::Triangle,
        "synth" => Waveform::Sawtooth,
        _ => Waveform::Sine,
    }
}

pub fn note_sequence(source: &str) -> Vec<SoundEvent> {
    let (waveform, notes) = match source.split_once(':') {
        Some((instrument, notes)) => (instrument_waveform(instrument), notes),
        None => (Waveform::Sine, source),
    };

    let mut cursor = Cursor::new();
    let mut events = Vec::new();
    for token in notes.split_whitespace() {
        if cursor.exhausted() {
            break;
        }
        events.push(SoundEvent::Tone(SchedulerEvent::new(
            note_frequency(token),
            cursor.position(),
            NOTE_LENGTH,
            waveform,
        )));
        cursor.advance(NOTE_STEP);
    }
    events
}

fn play_pattern() -> &'static Regex {
    static PLAY: OnceLock<Regex> = OnceLock::new();
    PLAY.get_or_init(|| Regex::new(r"^play\s+(\S+)").expect("valid regex"))
}

fn sleep_pattern() -> &'static Regex {
    static SLEEP: OnceLock<Regex> = OnceLock::new();
    SLEEP.get_or_init(|| Regex::new(r"^sleep\s+(\S+)").expect("valid regex"))
}

pub fn line_command(source: &str) -> Vec<SoundEvent> {
    let mut cursor = Cursor::new();
    let mut events = Vec::new();

    for line in source.lines().map(str::trim) {
        if cursor.exhausted() {
            break;
        }
        if let Some(captures) = play_pattern().captures(line) {
            let Ok(note) = captures[1].parse::<f64>() else {
                continue;
            };
            if !note.is_finite() {
                continue;
            }
            events.push(SoundEvent::Tone(SchedulerEvent::new(
                octave_frequency(note),
                cursor.position(),
                PLAY_LENGTH,
                Waveform::Sawtooth,
            )));
        } else if let Some(captures) = sleep_pattern().captures(line) {
            if let Ok(seconds) = captures[1].parse::<f64>() {
                cursor.advance(seconds);
            }
        }
    }
    events
}

fn quoted_pattern() -> &'static Regex {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    QUOTED.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("valid regex"))
}

pub fn pattern_string(source: &str) -> Vec<SoundEvent> {
    let Some(captures) = quoted_pattern().captures(source) else {
        return Vec::new();
    };

    let mut cursor = Cursor::new();
    let mut events = Vec::new();
    for token in captures[1].split_whitespace() {
        if cursor.exhausted() {
            break;
        }
        match token {
            "bd" => events.push(SoundEvent::Tone(SchedulerEvent::new(
                KICK_FREQUENCY,
                cursor.position(),
                HIT_LENGTH,
                Waveform::Sine,
            ))),
            "sn" => events.push(SoundEvent::Noise {
                start_offset: cursor.position(),
                duration: HIT_LENGTH,
            }),
            _ => {}
        }
        cursor.advance(PATTERN_STEP);
    }
    events
}

/// One randomized drone; the source text is not consulted
pub fn simulated(rng: &mut dyn RngCore) -> Vec<SoundEvent> {
    let waveform = Waveform::OSCILLATORS[rng.gen_range(0..Waveform::OSCILLATORS.len())];
    vec![SoundEvent::Drone(Drone {
        start_offset: 0.0,
        waveform,
        base_frequency: rng.gen_range(100.0..=300.0),
        lfo_rate: rng.gen_range(5.0..=15.0),
        mod_depth: rng.gen_range(200.0..=600.0),
        cutoff: rng.gen_range(800.0..=2000.0),
        q: rng.gen_range(5.0..=15.0),
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tones(events: &[SoundEvent]) -> Vec<SchedulerEvent> {
        events.iter().filter_map(|e| e.as_tone().copied()).collect()
    }

    #[test]
    fn test_tag_lookup_is_case_insensitive() {
        assert_eq!(Dialect::for_tag("Alda"), Some(Dialect::NoteSequence));
        assert_eq!(Dialect::for_tag("SONIC-PI"), Some(Dialect::LineCommand));
        assert_eq!(Dialect::for_tag("sonicpi"), Some(Dialect::LineCommand));
        assert_eq!(Dialect::for_tag("Strudel"), Some(Dialect::PatternString));
        assert_eq!(Dialect::for_tag("TidalCycles"), Some(Dialect::PatternString));
        assert_eq!(Dialect::for_tag("ChucK"), Some(Dialect::Simulated));
        assert_eq!(Dialect::for_tag("cobol"), None);
        assert_eq!(Dialect::for_tag("alda2"), None);
        for tag in Dialect::tags() {
            assert!(Dialect::for_tag(tag).is_some(), "{tag}");
        }
    }

    #[test]
    fn test_note_sequence_piano() {
        let events = note_sequence("piano: c d");
        let tones = tones(&events);
        assert_eq!(tones.len(), 2);
        assert_eq!(tones[0].waveform, Waveform::Triangle);
        assert_eq!(tones[0].frequency, 261.63);
        assert_eq!(tones[0].start_offset, 0.0);
        assert_eq!(tones[0].duration, 0.4);
        assert_eq!(tones[1].frequency, 293.66);
        assert_eq!(tones[1].start_offset, 0.5);
        assert_eq!(tones[1].duration, 0.4);
    }

    #[test]
    fn test_note_sequence_instruments_and_octaves() {
        let synth = tones(&note_sequence("Synth: a5 c#3"));
        assert_eq!(synth[0].waveform, Waveform::Sawtooth);
        assert_eq!(synth[0].frequency, 880.0);
        assert!((synth[1].frequency - 277.18 / 2.0).abs() < 1e-9);

        let other = tones(&note_sequence("cello: e"));
        assert_eq!(other[0].waveform, Waveform::Sine);

        // only the first colon splits
        let odd = tones(&note_sequence("piano: c: d"));
        assert_eq!(odd.len(), 2);
        assert_eq!(odd[0].frequency, 440.0);
    }

    #[test]
    fn test_note_sequence_without_colon() {
        let bare = tones(&note_sequence("c4 g4"));
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[0].waveform, Waveform::Sine);
        assert_eq!(bare[1].frequency, 392.0);
    }

    #[test]
    fn test_line_command() {
        let events = line_command("play 24\nsleep 1\nplay 36");
        let tones = tones(&events);
        assert_eq!(tones.len(), 2);
        assert_eq!(tones[0].start_offset, 0.0);
        assert_eq!(tones[1].start_offset, 1.0);
        assert_eq!(tones[0].frequency, 261.63 * 2f64.powi(2 - 4));
        assert_eq!(tones[1].frequency, 261.63 * 2f64.powi(3 - 4));
        assert!(tones.iter().all(|t| t.waveform == Waveform::Sawtooth));
        assert!(tones.iter().all(|t| t.duration == 0.4));
    }

    #[test]
    fn test_line_command_ignores_noise() {
        let events = line_command("# intro\nuse_synth :saw\n  play 60  \nsleep -2\nsleep abc\nplay x\nsleep 0.5\nplay 72");
        let tones = tones(&events);
        assert_eq!(tones.len(), 2);
        assert_eq!(tones[0].start_offset, 0.0);
        assert_eq!(tones[1].start_offset, 0.5);
    }

    #[test]
    fn test_pattern_string() {
        let events = pattern_string(r#"d1 $ s "bd sn bd""#);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].start_offset(), 0.0);
        assert_eq!(events[0].as_tone().map(|t| t.frequency), Some(60.0));
        assert_eq!(
            events[1],
            SoundEvent::Noise {
                start_offset: 0.25,
                duration: 0.2
            }
        );
        assert_eq!(events[2].start_offset(), 0.5);
        assert_eq!(events[2].duration(), 0.2);
    }

    #[test]
    fn test_pattern_string_rests_advance() {
        let events = pattern_string(r#"s "~ hh bd" # gain "0.5""#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_offset(), 0.5);
        assert!(pattern_string("no quotes here").is_empty());
    }

    #[test]
    fn test_simulated_drone_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let events = Dialect::Simulated.interpret("ignored", &mut rng);
            assert_eq!(events.len(), 1);
            let SoundEvent::Drone(drone) = events[0] else {
                panic!("expected a drone");
            };
            assert!(Waveform::OSCILLATORS.contains(&drone.waveform));
            assert!((100.0..=300.0).contains(&drone.base_frequency));
            assert!((5.0..=15.0).contains(&drone.lfo_rate));
            assert!((200.0..=600.0).contains(&drone.mod_depth));
            assert!((800.0..=2000.0).contains(&drone.cutoff));
            assert!((5.0..=15.0).contains(&drone.q));
        }
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        for dialect in [
            Dialect::NoteSequence,
            Dialect::LineCommand,
            Dialect::PatternString,
        ] {
            assert!(dialect.interpret("", &mut rng).is_empty());
        }
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let mut cursor = Cursor::new();
        cursor.advance(0.5);
        cursor.advance(-1.0);
        cursor.advance(f64::NAN);
        assert_eq!(cursor.position(), 0.5);
        assert_eq!(Dialect::LineCommand.to_string(), "line-command");
    }

    #[test]
    fn test_huge_sleeps_stop_at_the_timeline_end() {
        assert!(line_command("sleep 100000\nplay 60").is_empty());
        assert!(line_command("sleep 1e300\nplay 60").is_empty());

        let events = line_command("play 60\nsleep 299.9\nplay 62\nsleep 1\nplay 64");
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.start_offset() < MAX_TIMELINE));

        let mut cursor = Cursor::new();
        cursor.advance(f64::MAX);
        assert_eq!(cursor.position(), MAX_TIMELINE);
        assert!(cursor.exhausted());
    }

    #[test]
    fn test_long_note_sequences_are_truncated() {
        let source = format!("piano: {}", "c ".repeat(1000));
        let events = note_sequence(&source);
        assert_eq!(events.len(), (MAX_TIMELINE / NOTE_STEP) as usize);
        assert!(events.iter().all(|e| e.start_offset() < MAX_TIMELINE));
    }
}
