//! Studio state mutated by tools and scripts

use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::audio::Waveform;
use crate::errors::{AgentError, AgentResult};
use crate::services::voices::Voice;

pub const PAD_COUNT: usize = 16;
pub const DEFAULT_BPM: f64 = 120.0;
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;
pub const MIN_STEPS: usize = 4;
pub const MAX_STEPS: usize = 64;
pub const DEFAULT_STEPS: usize = 16;

/// Code Lab language handled by the script host rather than the runner
pub const SCRIPT_LANGUAGE: &str = "script";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum View {
    #[default]
    Studio,
    VoiceLab,
    Tracks,
    DrumPads,
    Effects,
    Sequencer,
    Arrangement,
    CodeLab,
    SheetMusic,
    Videos,
    Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    pub elevenlabs: Option<String>,
    pub youtube: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumPad {
    pub label: String,
    pub sound: String,
    pub frequency: f64,
    pub waveform: Waveform,
    /// 0.0 ..= 1.0
    pub volume: f64,
}

fn default_pads() -> Vec<DrumPad> {
    let presets: [(&str, f64, Waveform); PAD_COUNT] = [
        ("Kick", 60.0, Waveform::Sine),
        ("Snare", 200.0, Waveform::Noise),
        ("Closed Hat", 8000.0, Waveform::Noise),
        ("Open Hat", 6000.0, Waveform::Noise),
        ("Clap", 1200.0, Waveform::Noise),
        ("Rim", 800.0, Waveform::Square),
        ("Low Tom", 100.0, Waveform::Sine),
        ("Mid Tom", 150.0, Waveform::Sine),
        ("High Tom", 220.0, Waveform::Sine),
        ("Crash", 5000.0, Waveform::Noise),
        ("Ride", 4000.0, Waveform::Triangle),
        ("Cowbell", 560.0, Waveform::Square),
        ("Bass", 55.0, Waveform::Sawtooth),
        ("Stab", 330.0, Waveform::Sawtooth),
        ("Pluck", 440.0, Waveform::Triangle),
        ("Blip", 880.0, Waveform::Square),
    ];
    presets
        .iter()
        .map(|(label, frequency, waveform)| DrumPad {
            label: label.to_string(),
            sound: label.to_lowercase().replace(' ', "-"),
            frequency: *frequency,
            waveform: *waveform,
            volume: 0.8,
        })
        .collect()
}

/// Parameter ranges per effect: (effect, parameter, min, max, default)
const EFFECT_PARAMETERS: [(&str, &str, f64, f64, f64); 13] = [
    ("reverb", "mix", 0.0, 1.0, 0.2),
    ("reverb", "decay", 0.1, 10.0, 2.0),
    ("delay", "time", 0.0, 2.0, 0.25),
    ("delay", "feedback", 0.0, 0.95, 0.3),
    ("delay", "mix", 0.0, 1.0, 0.2),
    ("distortion", "amount", 0.0, 1.0, 0.0),
    ("distortion", "mix", 0.0, 1.0, 0.5),
    ("filter", "cutoff", 20.0, 20000.0, 20000.0),
    ("filter", "resonance", 0.1, 20.0, 0.7),
    ("compressor", "threshold", -60.0, 0.0, -24.0),
    ("compressor", "ratio", 1.0, 20.0, 4.0),
    ("compressor", "attack", 0.0, 1.0, 0.003),
    ("compressor", "release", 0.0, 1.0, 0.25),
];

pub type Effects = BTreeMap<String, BTreeMap<String, f64>>;

fn default_effects() -> Effects {
    let mut effects = Effects::new();
    for (effect, parameter, _, _, default) in EFFECT_PARAMETERS {
        effects
            .entry(effect.to_string())
            .or_default()
            .insert(parameter.to_string(), default);
    }
    effects
}

/// One Code Lab run authorized by an increment of the [`RunTrigger`]
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredRun {
    pub ticket: u64,
    pub language: String,
    pub code: String,
}

/// Monotonic run counter. Each increment snapshots the code current at that
/// moment, so edits made afterwards never leak into the queued run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunTrigger {
    count: u64,
    #[serde(skip)]
    pending: VecDeque<TriggeredRun>,
}

impl RunTrigger {
    pub fn value(&self) -> u64 {
        self.count
    }

    pub fn fire(&mut self, language: &str, code: &str) -> u64 {
        self.count += 1;
        self.pending.push_back(TriggeredRun {
            ticket: self.count,
            language: language.to_string(),
            code: code.to_string(),
        });
        self.count
    }

    /// Queued runs in increment order
    pub fn drain(&mut self) -> Vec<TriggeredRun> {
        self.pending.drain(..).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeLab {
    pub language: String,
    pub code: String,
    pub trigger: RunTrigger,
}

impl CodeLab {
    pub fn is_script(&self) -> bool {
        self.language.eq_ignore_ascii_case(SCRIPT_LANGUAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTrack {
    pub instrument: String,
    pub steps: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerPattern {
    pub id: String,
    pub name: String,
    pub style: String,
    pub steps: usize,
    pub tracks: Vec<PatternTrack>,
}

impl SequencerPattern {
    /// Grid rendering, one row per track: `kick  x...x...`
    pub fn grid(&self) -> String {
        self.tracks
            .iter()
            .map(|track| {
                let row: String = track
                    .steps
                    .iter()
                    .map(|on| if *on { 'x' } else { '.' })
                    .collect();
                format!("{:<8}{}", track.instrument, row)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementSection {
    pub name: String,
    pub pattern_id: String,
    pub repeats: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongArrangement {
    pub id: String,
    pub title: String,
    pub bpm: f64,
    pub sections: Vec<ArrangementSection>,
}

impl SongArrangement {
    /// Length in seconds, assuming every pattern step is a sixteenth note
    pub fn duration(&self, patterns: &[SequencerPattern]) -> f64 {
        let sixteenth = 60.0 / self.bpm / 4.0;
        self.sections
            .iter()
            .filter_map(|section| {
                patterns
                    .iter()
                    .find(|p| p.id == section.pattern_id)
                    .map(|p| p.steps as f64 * sixteenth * section.repeats as f64)
            })
            .sum()
    }
}

/// Everything the assistant can change in the studio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    pub view: View,
    pub api_keys: ApiKeys,
    pub voices: Vec<Voice>,
    pub selected_voice: Option<String>,
    pub pads: Vec<DrumPad>,
    pub effects: Effects,
    pub bpm: f64,
    pub code_lab: CodeLab,
    pub patterns: Vec<SequencerPattern>,
    pub arrangements: Vec<SongArrangement>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            view: View::default(),
            api_keys: ApiKeys::default(),
            voices: Vec::new(),
            selected_voice: None,
            pads: default_pads(),
            effects: default_effects(),
            bpm: DEFAULT_BPM,
            code_lab: CodeLab::default(),
            patterns: Vec::new(),
            arrangements: Vec::new(),
        }
    }
}

impl AppState {
    pub fn navigate(&mut self, view: &str) -> AgentResult<View> {
        let view = View::from_str(view.trim())
            .map_err(|_| AgentError::InvalidParameters(format!("Unknown view '{}'", view)))?;
        self.view = view;
        Ok(view)
    }

    /// Update the fields present in `config` on pad `index` (0-based)
    pub fn configure_pad(&mut self, index: usize, config: &Value) -> AgentResult<&DrumPad> {
        let pad = self.pads.get_mut(index).ok_or_else(|| {
            AgentError::InvalidParameters(format!(
                "Pad {} does not exist, there are {} pads",
                index, PAD_COUNT
            ))
        })?;

        let mut updated = pad.clone();
        if let Some(label) = config.get("label").and_then(|v| v.as_str()) {
            updated.label = label.to_string();
        }
        if let Some(sound) = config.get("sound").and_then(|v| v.as_str()) {
            updated.sound = sound.to_string();
        }
        if let Some(frequency) = config.get("frequency") {
            let frequency = frequency
                .as_f64()
                .filter(|f| f.is_finite() && *f > 0.0)
                .ok_or_else(|| {
                    AgentError::InvalidParameters("frequency must be a positive number".into())
                })?;
            updated.frequency = frequency;
        }
        if let Some(waveform) = config.get("waveform").and_then(|v| v.as_str()) {
            updated.waveform = Waveform::from_str(waveform).map_err(|_| {
                AgentError::InvalidParameters(format!("Unknown waveform '{}'", waveform))
            })?;
        }
        if let Some(volume) = config.get("volume") {
            let volume = volume
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AgentError::InvalidParameters("volume must be a number".into()))?;
            updated.volume = volume.clamp(0.0, 1.0);
        }

        *pad = updated;
        Ok(pad)
    }

    /// Set an effect parameter, clamped to its range. Returns the stored value.
    pub fn set_effect(&mut self, effect: &str, parameter: &str, value: f64) -> AgentResult<f64> {
        let effect = effect.trim().to_lowercase();
        let parameter = parameter.trim().to_lowercase();
        let (_, _, min, max, _) = EFFECT_PARAMETERS
            .iter()
            .find(|(e, p, ..)| *e == effect && *p == parameter)
            .ok_or_else(|| {
                AgentError::InvalidParameters(format!(
                    "Unknown effect parameter '{}.{}'",
                    effect, parameter
                ))
            })?;
        if !value.is_finite() {
            return Err(AgentError::InvalidParameters(
                "value must be a finite number".into(),
            ));
        }

        let value = value.clamp(*min, *max);
        self.effects
            .entry(effect)
            .or_default()
            .insert(parameter, value);
        Ok(value)
    }

    pub fn set_bpm(&mut self, bpm: f64) -> AgentResult<f64> {
        if !bpm.is_finite() {
            return Err(AgentError::InvalidParameters("bpm must be a number".into()));
        }
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        Ok(self.bpm)
    }

    pub fn set_code_lab(&mut self, language: &str, code: &str) {
        self.code_lab.language = language.trim().to_string();
        self.code_lab.code = code.to_string();
    }

    /// Increment the run trigger with the current Code Lab contents
    pub fn trigger_code_lab(&mut self) -> u64 {
        let CodeLab {
            language,
            code,
            trigger,
        } = &mut self.code_lab;
        trigger.fire(language, code)
    }

    pub fn add_voice(&mut self, voice: Voice) {
        self.selected_voice = Some(voice.voice_id.clone());
        self.voices.push(voice);
    }

    pub fn find_pattern(&self, reference: &str) -> Option<&SequencerPattern> {
        self.patterns
            .iter()
            .find(|p| p.id == reference)
            .or_else(|| {
                self.patterns
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(reference))
            })
    }

    pub fn add_pattern(&mut self, pattern: SequencerPattern) -> &SequencerPattern {
        self.patterns.push(pattern);
        &self.patterns[self.patterns.len() - 1]
    }

    pub fn add_arrangement(&mut self, arrangement: SongArrangement) -> &SongArrangement {
        self.arrangements.push(arrangement);
        &self.arrangements[self.arrangements.len() - 1]
    }

    /// Compact view for scripts and the system prompt; api keys are reported
    /// only as configured or not
    pub fn snapshot(&self) -> Value {
        json!({
            "view": self.view,
            "bpm": self.bpm,
            "apiKeys": {
                "elevenlabs": self.api_keys.elevenlabs.is_some(),
                "youtube": self.api_keys.youtube.is_some(),
            },
            "voices": self.voices.iter().map(|v| &v.name).collect::<Vec<_>>(),
            "selectedVoice": self.selected_voice,
            "pads": self.pads,
            "effects": self.effects,
            "codeLab": {
                "language": self.code_lab.language,
                "code": self.code_lab.code,
                "runs": self.code_lab.trigger.value(),
            },
            "patterns": self.patterns.iter().map(|p| &p.name).collect::<Vec<_>>(),
            "arrangements": self.arrangements.iter().map(|a| &a.title).collect::<Vec<_>>(),
        })
    }
}

/// Named drum grids used when a pattern is generated from a style alone
pub fn style_tracks(style: &str, steps: usize) -> Vec<PatternTrack> {
    let every = |n: usize, offset: usize| -> Vec<bool> {
        (0..steps).map(|i| i % n == offset % n).collect()
    };
    let track = |instrument: &str, steps: Vec<bool>| PatternTrack {
        instrument: instrument.to_string(),
        steps,
    };

    match style.trim().to_lowercase().as_str() {
        "house" | "techno" => vec![
            track("kick", every(4, 0)),
            track("clap", every(8, 4)),
            track("hihat", every(4, 2)),
        ],
        "hiphop" | "hip-hop" | "boom-bap" => vec![
            track("kick", (0..steps).map(|i| matches!(i % 16, 0 | 7 | 10)).collect()),
            track("snare", every(8, 4)),
            track("hihat", every(2, 0)),
        ],
        "rock" => vec![
            track("kick", (0..steps).map(|i| matches!(i % 16, 0 | 8 | 10)).collect()),
            track("snare", every(8, 4)),
            track("hihat", every(2, 0)),
        ],
        "breakbeat" | "dnb" => vec![
            track("kick", (0..steps).map(|i| matches!(i % 16, 0 | 10)).collect()),
            track("snare", every(8, 4)),
            track("hihat", every(2, 1)),
        ],
        _ => vec![
            track("kick", every(8, 0)),
            track("snare", every(8, 4)),
            track("hihat", every(2, 0)),
        ],
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
