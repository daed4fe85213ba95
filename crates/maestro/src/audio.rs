//! Code Lab audio engine
//!
//! Source snippets in one of a few tiny music dialects are interpreted into
//! [`SoundEvent`]s, which the [`OscillatorScheduler`] renders additively onto a
//! shared [`MixBus`]. Timing inside one run is a virtual cursor measured in
//! seconds from the epoch captured when the run started.

pub mod bus;
pub mod dialect;
pub mod notes;
pub mod runner;
pub mod scheduler;

pub use bus::MixBus;
pub use dialect::{Cursor, Dialect};
pub use runner::{PolyglotRunner, RunReport, SinkOpener};
pub use scheduler::OscillatorScheduler;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Audio engine errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio sink unavailable: {0}")]
    Init(String),

    #[error("Failed to write audio: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
    Noise,
}

impl Waveform {
    /// Oscillator shapes, excluding noise
    pub const OSCILLATORS: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];
}

/// One tone request produced by a dialect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerEvent {
    /// Hz, positive
    pub frequency: f64,
    /// Seconds after the run epoch
    pub start_offset: f64,
    /// Seconds, positive
    pub duration: f64,
    pub waveform: Waveform,
}

impl SchedulerEvent {
    pub fn new(frequency: f64, start_offset: f64, duration: f64, waveform: Waveform) -> Self {
        Self {
            frequency,
            start_offset,
            duration,
            waveform,
        }
    }
}

/// Length of the generative fallback sound, in seconds
pub const DRONE_DURATION: f64 = 4.0;

/// Frequency-modulated, lowpass filtered generative sound used for languages
/// that are declared but have no interpreter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drone {
    pub start_offset: f64,
    pub waveform: Waveform,
    pub base_frequency: f64,
    pub lfo_rate: f64,
    pub mod_depth: f64,
    pub cutoff: f64,
    pub q: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SoundEvent {
    Tone(SchedulerEvent),
    /// Unenveloped uniform noise buffer, played to its end
    Noise { start_offset: f64, duration: f64 },
    Drone(Drone),
}

impl SoundEvent {
    pub fn start_offset(&self) -> f64 {
        match self {
            SoundEvent::Tone(tone) => tone.start_offset,
            SoundEvent::Noise { start_offset, .. } => *start_offset,
            SoundEvent::Drone(drone) => drone.start_offset,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            SoundEvent::Tone(tone) => tone.duration,
            SoundEvent::Noise { duration, .. } => *duration,
            SoundEvent::Drone(_) => DRONE_DURATION,
        }
    }

    pub fn as_tone(&self) -> Option<&SchedulerEvent> {
        match self {
            SoundEvent::Tone(tone) => Some(tone),
            _ => None,
        }
    }
}
