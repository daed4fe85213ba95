//! In-memory mono mix bus with its own clock

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::{AudioError, Result};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
const MAX_SAMPLE_RATE: u32 = 192_000;
/// Audio a bus buffers unless told otherwise, in seconds
pub const DEFAULT_CAPACITY_SECONDS: f64 = 600.0;

/// Shared sink that every scheduled sound is mixed into additively.
///
/// The clock starts at zero and only moves forward through [`MixBus::advance`];
/// scheduled audio may extend past the clock. The buffer never grows past its
/// capacity; audio mixed beyond it is dropped.
#[derive(Debug, Clone)]
pub struct MixBus {
    sample_rate: u32,
    clock: f64,
    samples: Vec<f32>,
    /// Upper bound on buffered frames
    max_frames: usize,
}

impl MixBus {
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
            return Err(AudioError::Init(format!(
                "unsupported sample rate {sample_rate}"
            )));
        }
        Ok(Self {
            sample_rate,
            clock: 0.0,
            samples: Vec::new(),
            max_frames: capacity_frames(DEFAULT_CAPACITY_SECONDS, sample_rate),
        })
    }

    /// Cap the buffer at `seconds` of audio; anything mixed past it is dropped
    pub fn with_capacity_seconds(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            self.max_frames = capacity_frames(seconds, self.sample_rate);
        }
        self
    }

    /// Capacity in seconds
    pub fn capacity(&self) -> f64 {
        self.max_frames as f64 / self.sample_rate as f64
    }

    /// Whether anything mixed at `start` would still land in the buffer
    pub fn accepts(&self, start: f64) -> bool {
        self.room(start) > 0
    }

    /// Frames left between `start` and the end of the buffer
    pub fn room(&self, start: f64) -> usize {
        self.max_frames.saturating_sub(self.frame_at(start))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current clock time in seconds
    pub fn now(&self) -> f64 {
        self.clock
    }

    pub fn advance(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.clock += seconds;
        }
    }

    /// Move the clock to the end of everything mixed so far
    pub fn advance_to_end(&mut self) {
        self.clock = self.clock.max(self.duration());
    }

    /// Length of the mixed audio in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Saturates at `usize::MAX` for times too far out to address
    pub fn frame_at(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Add `buffer` onto the bus starting at absolute time `start`.
    /// Returns the number of frames actually mixed.
    pub fn mix(&mut self, start: f64, buffer: &[f32]) -> usize {
        let offset = self.frame_at(start);
        let end = offset
            .saturating_add(buffer.len())
            .min(self.max_frames);
        if end <= offset {
            return 0;
        }
        if self.samples.len() < end {
            self.samples.resize(end, 0.0);
        }
        let count = end - offset;
        for (slot, sample) in self.samples[offset..end].iter_mut().zip(buffer) {
            *slot += sample;
        }
        count
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root mean square over `[start, end)` seconds
    pub fn rms(&self, start: f64, end: f64) -> f32 {
        let from = self.frame_at(start).min(self.samples.len());
        let to = self.frame_at(end).min(self.samples.len());
        if to <= from {
            return 0.0;
        }
        let sum: f64 = self.samples[from..to]
            .iter()
            .map(|s| (*s as f64) * (*s as f64))
            .sum();
        (sum / (to - from) as f64).sqrt() as f32
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.clock = 0.0;
    }

    /// Render the bus as 16-bit mono PCM, clamping anything outside [-1, 1]
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

fn capacity_frames(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).ceil() as usize
}
