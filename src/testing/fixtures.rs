use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Seed used for all synthetic noise so fixtures stay reproducible
pub const NOISE_SEED: u64 = 0x5A5A_FFF0;

/// Waveforms the synthetic source can generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticPattern {
    Sine,
    Silence,
    WhiteNoise,
}

/// Synthetic signal description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub pattern: SyntheticPattern,
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
}

fn default_frequency_hz() -> f32 {
    220.0
}

fn default_amplitude() -> f32 {
    0.3
}

impl SyntheticSpec {
    pub fn sine(frequency_hz: f32, amplitude: f32) -> Self {
        Self {
            pattern: SyntheticPattern::Sine,
            frequency_hz,
            amplitude,
        }
    }
}

/// Streaming generator that keeps phase continuous across reads
pub struct SyntheticSource {
    spec: SyntheticSpec,
    sample_rate: f32,
    phase: f32,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(spec: SyntheticSpec, sample_rate: f32) -> Self {
        Self {
            spec,
            sample_rate,
            phase: 0.0,
            rng: StdRng::seed_from_u64(NOISE_SEED),
        }
    }

    pub fn spec(&self) -> &SyntheticSpec {
        &self.spec
    }

    pub fn set_pattern(&mut self, pattern: SyntheticPattern) {
        self.spec.pattern = pattern;
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.spec.frequency_hz = frequency_hz;
    }

    pub fn fill(&mut self, buffer: &mut [f32]) {
        let step = self.spec.frequency_hz / self.sample_rate;
        for sample in buffer.iter_mut() {
            *sample = match self.spec.pattern {
                SyntheticPattern::Sine => {
                    let value = (2.0 * PI * self.phase).sin() * self.spec.amplitude;
                    self.phase += step;
                    if self.phase >= 1.0 {
                        self.phase -= 1.0;
                    }
                    value
                }
                SyntheticPattern::Silence => 0.0,
                SyntheticPattern::WhiteNoise if self.spec.amplitude > 0.0 => self
                    .rng
                    .gen_range(-self.spec.amplitude..self.spec.amplitude),
                SyntheticPattern::WhiteNoise => 0.0,
            };
        }
    }

    pub fn render(&mut self, len: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; len];
        self.fill(&mut buffer);
        buffer
    }
}

/// One-shot sine block starting at phase zero
pub fn sine(frequency_hz: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
    SyntheticSource::new(SyntheticSpec::sine(frequency_hz, amplitude), sample_rate).render(len)
}

pub fn silence(len: usize) -> Vec<f32> {
    vec![0.0; len]
}

/// Seeded white noise in `[-amplitude, amplitude)`
pub fn white_noise(len: usize, amplitude: f32) -> Vec<f32> {
    let spec = SyntheticSpec {
        pattern: SyntheticPattern::WhiteNoise,
        frequency_hz: default_frequency_hz(),
        amplitude,
    };
    SyntheticSource::new(spec, 44_100.0).render(len)
}
