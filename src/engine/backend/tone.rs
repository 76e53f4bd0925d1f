//! Reference tone synthesis
//!
//! Pure sample generation for the tone a singer matches. Output devices pull
//! samples from a [`ReferenceTone`] iterator; nothing here touches hardware.

use std::f32::consts::PI;

use crate::config::ToneTimbre;

/// Constant level of the plain sine tone
const SINE_LEVEL: f32 = 0.2;

/// Gain applied to the sine + triangle mix of the piano tone
const PIANO_MIX_GAIN: f32 = 0.6;

const ATTACK_END_SEC: f32 = 0.02;
const ATTACK_PEAK: f32 = 0.7;
const DECAY_END_SEC: f32 = 0.4;
const SUSTAIN_LEVEL: f32 = 0.4;
const RELEASE_FLOOR: f32 = 0.0001;

/// Amplitude envelope of the piano tone at `t` seconds
///
/// Linear attack to 0.7 over 20 ms, exponential decay to 0.4 by 400 ms,
/// then a linear release reaching 0.0001 at the end of the tone.
pub fn piano_envelope(t: f32, duration_sec: f32) -> f32 {
    if t < 0.0 || t >= duration_sec {
        return 0.0;
    }
    if t < ATTACK_END_SEC {
        return ATTACK_PEAK * t / ATTACK_END_SEC;
    }
    if t < DECAY_END_SEC {
        let progress = (t - ATTACK_END_SEC) / (DECAY_END_SEC - ATTACK_END_SEC);
        return ATTACK_PEAK * (SUSTAIN_LEVEL / ATTACK_PEAK).powf(progress);
    }
    let progress = (t - DECAY_END_SEC) / (duration_sec - DECAY_END_SEC);
    SUSTAIN_LEVEL + (RELEASE_FLOOR - SUSTAIN_LEVEL) * progress
}

/// A finite reference tone rendered sample by sample
#[derive(Debug, Clone)]
pub struct ReferenceTone {
    frequency_hz: f32,
    duration_sec: f32,
    sample_rate: f32,
    timbre: ToneTimbre,
    position: u64,
}

impl ReferenceTone {
    pub fn new(frequency_hz: f32, duration_sec: f32, sample_rate: f32, timbre: ToneTimbre) -> Self {
        Self {
            frequency_hz,
            duration_sec: duration_sec.max(0.0),
            sample_rate,
            timbre,
            position: 0,
        }
    }

    /// Number of samples in the whole tone
    pub fn total_samples(&self) -> u64 {
        if self.sample_rate <= 0.0 {
            return 0;
        }
        (self.duration_sec * self.sample_rate).round() as u64
    }

    /// Tone value at `t` seconds from its start
    pub fn sample_at(&self, t: f32) -> f32 {
        if t < 0.0 || t >= self.duration_sec {
            return 0.0;
        }
        let phase = 2.0 * PI * self.frequency_hz * t;
        match self.timbre {
            ToneTimbre::Sine => SINE_LEVEL * phase.sin(),
            ToneTimbre::Piano => {
                let triangle = (2.0 / PI) * phase.sin().asin();
                (phase.sin() + triangle) * PIANO_MIX_GAIN * piano_envelope(t, self.duration_sec)
            }
        }
    }
}

impl Iterator for ReferenceTone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.total_samples() {
            return None;
        }
        let t = self.position as f32 / self.sample_rate;
        self.position += 1;
        Some(self.sample_at(t))
    }
}
