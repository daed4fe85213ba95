//! Renders sound events onto the mix bus relative to a run epoch

use std::f64::consts::TAU;

use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::bus::MixBus;
use super::{Drone, SoundEvent, Waveform, DRONE_DURATION};

/// Peak gain of a scheduled tone
pub const TONE_PEAK: f32 = 0.5;
/// Attack time of a scheduled tone, in seconds
pub const TONE_ATTACK: f64 = 0.01;

const DRONE_PEAK: f64 = 0.3;
const DRONE_ATTACK: f64 = 0.1;
const DRONE_FLOOR: f64 = 0.001;

/// Schedules tones at `epoch + start_offset` on a shared [`MixBus`].
///
/// There is no voice limit and no deduplication: every call renders an
/// independent sound that is summed with whatever is already on the bus.
pub struct OscillatorScheduler {
    bus: MixBus,
    rng: StdRng,
    epoch: f64,
    scheduled: usize,
}

impl OscillatorScheduler {
    pub fn new(bus: MixBus, seed: u64) -> Self {
        let epoch = bus.now();
        Self {
            bus,
            rng: StdRng::seed_from_u64(seed),
            epoch,
            scheduled: 0,
        }
    }

    /// Capture the bus clock as the epoch for the next run
    pub fn begin(&mut self) -> f64 {
        self.epoch = self.bus.now();
        self.epoch
    }

    /// Move the bus clock past everything scheduled so far and return it
    pub fn finish(&mut self) -> f64 {
        self.bus.advance_to_end();
        self.bus.now()
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    /// Number of sounds rendered since creation
    pub fn scheduled_count(&self) -> usize {
        self.scheduled
    }

    pub fn bus(&self) -> &MixBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MixBus {
        &mut self.bus
    }

    pub fn into_bus(self) -> MixBus {
        self.bus
    }

    /// Frames the bus can still take at `start_offset`, or `None` when it is
    /// full there. Sounds past the capacity are dropped before rendering.
    fn room(&self, start_offset: f64) -> Option<usize> {
        let start = self.epoch + start_offset;
        match self.bus.room(start) {
            0 => {
                warn!(
                    start,
                    capacity = self.bus.capacity(),
                    "mix bus is full, dropping sound"
                );
                None
            }
            room => Some(room),
        }
    }

    pub fn schedule(&mut self, event: &SoundEvent) -> bool {
        match event {
            SoundEvent::Tone(tone) => self.schedule_tone(
                tone.frequency,
                tone.start_offset,
                tone.duration,
                tone.waveform,
            ),
            SoundEvent::Noise {
                start_offset,
                duration,
            } => self.schedule_noise_burst(*start_offset, *duration),
            SoundEvent::Drone(drone) => self.schedule_drone(drone),
        }
    }

    /// Render one enveloped tone. Envelope rises linearly to 0.5 over 10 ms and
    /// falls linearly to silence at `start_offset + duration`.
    pub fn schedule_tone(
        &mut self,
        frequency: f64,
        start_offset: f64,
        duration: f64,
        waveform: Waveform,
    ) -> bool {
        if !valid_timing(start_offset, duration) || !(frequency.is_finite() && frequency > 0.0) {
            debug!(frequency, start_offset, duration, "skipping invalid tone");
            return false;
        }
        let Some(room) = self.room(start_offset) else {
            return false;
        };

        let sample_rate = self.bus.sample_rate() as f64;
        let frames = ((duration * sample_rate).round() as usize).min(room);
        let attack = TONE_ATTACK.min(duration);
        let mut buffer = Vec::with_capacity(frames);
        let mut phase = 0.0;

        for i in 0..frames {
            let t = i as f64 / sample_rate;
            let gain = if t < attack {
                t / attack
            } else if duration > attack {
                1.0 - (t - attack) / (duration - attack)
            } else {
                0.0
            };
            let value = match waveform {
                Waveform::Noise => self.rng.gen_range(-1.0f64..=1.0),
                shape => oscillate(shape, phase),
            };
            buffer.push((value * gain.max(0.0)) as f32 * TONE_PEAK);
            phase = (phase + frequency / sample_rate).fract();
        }

        self.bus.mix(self.epoch + start_offset, &buffer);
        self.scheduled += 1;
        true
    }

    /// Unenveloped uniform noise played to the end of its buffer
    pub fn schedule_noise_burst(&mut self, start_offset: f64, duration: f64) -> bool {
        if !valid_timing(start_offset, duration) {
            debug!(start_offset, duration, "skipping invalid noise burst");
            return false;
        }
        let Some(room) = self.room(start_offset) else {
            return false;
        };

        let frames = ((duration * self.bus.sample_rate() as f64).round() as usize).min(room);
        let buffer: Vec<f32> = (0..frames)
            .map(|_| self.rng.gen_range(-1.0f32..=1.0))
            .collect();

        self.bus.mix(self.epoch + start_offset, &buffer);
        self.scheduled += 1;
        true
    }

    /// Frequency-modulated oscillator through a resonant lowpass, 4 s long
    pub fn schedule_drone(&mut self, drone: &Drone) -> bool {
        let Some(room) = self.room(drone.start_offset) else {
            return false;
        };
        let sample_rate = self.bus.sample_rate() as f64;
        let coefficients = match Coefficients::<f32>::from_params(
            Type::LowPass,
            (sample_rate as f32).hz(),
            (drone.cutoff as f32).hz(),
            drone.q as f32,
        ) {
            Ok(coefficients) => coefficients,
            Err(e) => {
                debug!(cutoff = drone.cutoff, q = drone.q, "skipping drone: {:?}", e);
                return false;
            }
        };
        let mut filter = DirectForm1::<f32>::new(coefficients);

        let frames = ((DRONE_DURATION * sample_rate).round() as usize).min(room);
        let decay_time = DRONE_DURATION - DRONE_ATTACK;
        let mut buffer = Vec::with_capacity(frames);
        let mut phase = 0.0;

        for i in 0..frames {
            let t = i as f64 / sample_rate;
            let gain = if t < DRONE_ATTACK {
                DRONE_PEAK * t / DRONE_ATTACK
            } else {
                DRONE_PEAK * (DRONE_FLOOR / DRONE_PEAK).powf((t - DRONE_ATTACK) / decay_time)
            };
            let instantaneous =
                drone.base_frequency + drone.mod_depth * (TAU * drone.lfo_rate * t).sin();
            let value = match drone.waveform {
                Waveform::Noise => self.rng.gen_range(-1.0f64..=1.0),
                shape => oscillate(shape, phase),
            };
            buffer.push(filter.run((value * gain) as f32));
            phase = (phase + instantaneous / sample_rate).rem_euclid(1.0);
        }

        self.bus.mix(self.epoch + drone.start_offset, &buffer);
        self.scheduled += 1;
        true
    }
}

fn valid_timing(start_offset: f64, duration: f64) -> bool {
    start_offset.is_finite() && start_offset >= 0.0 && duration.is_finite() && duration > 0.0
}

/// One sample of a unit-amplitude oscillator at `phase` in [0, 1)
fn oscillate(waveform: Waveform, phase: f64) -> f64 {
    match waveform {
        Waveform::Sine => (TAU * phase).sin(),
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        Waveform::Noise => 0.0,
    }
}
