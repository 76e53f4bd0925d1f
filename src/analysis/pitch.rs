//! Fundamental-frequency estimation by autocorrelation.
//!
//! The estimator correlates a block with lagged copies of itself, skips the
//! initial descending run (the zero-lag lobe), takes the strongest remaining
//! lag as the period and refines it with a parabola through its neighbours.
//! Direct-form autocorrelation is O(N²); blocks around 2048 samples polled a
//! few times per second are the intended load.

use serde::{Deserialize, Serialize};

/// Frequency reported when no pitch could be detected
pub const NO_PITCH: f32 = -1.0;

/// RMS below which a block is treated as silence
pub const DEFAULT_SILENCE_RMS: f32 = 0.001;

/// Result of estimating the fundamental of one block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Estimated f0 in Hz, or [`NO_PITCH`]
    pub frequency_hz: f32,
    /// RMS level of the block
    pub rms: f32,
}

impl PitchEstimate {
    fn unvoiced(rms: f32) -> Self {
        Self {
            frequency_hz: NO_PITCH,
            rms,
        }
    }

    /// Whether a usable pitch was found
    pub fn is_voiced(&self) -> bool {
        self.frequency_hz > 0.0
    }

    /// The frequency when voiced
    pub fn frequency(&self) -> Option<f32> {
        self.is_voiced().then_some(self.frequency_hz)
    }
}

/// Root-mean-square level of a block (0.0 for an empty block).
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (energy / samples.len() as f64).sqrt() as f32
}

/// Estimate the fundamental using the default silence floor.
pub fn estimate(samples: &[f32], sample_rate: f32) -> PitchEstimate {
    estimate_with_floor(samples, sample_rate, DEFAULT_SILENCE_RMS)
}

/// Estimate the fundamental of `samples`.
///
/// Never fails: silence, aperiodic input or degenerate blocks yield
/// `frequency_hz == NO_PITCH` together with the measured RMS.
pub fn estimate_with_floor(samples: &[f32], sample_rate: f32, silence_rms: f32) -> PitchEstimate {
    let level = rms(samples);
    if level < silence_rms || samples.len() < 2 || sample_rate <= 0.0 {
        return PitchEstimate::unvoiced(level);
    }

    let correlation = autocorrelate(samples);
    let size = correlation.len();

    // Walk off the zero-lag lobe
    let mut start = 0;
    while start + 1 < size && correlation[start] > correlation[start + 1] {
        start += 1;
    }

    let mut peak_lag = None;
    let mut peak_value = f64::NEG_INFINITY;
    for (lag, &value) in correlation.iter().enumerate().skip(start) {
        if value > peak_value {
            peak_value = value;
            peak_lag = Some(lag);
        }
    }

    let peak_lag = match peak_lag {
        Some(lag) if peak_value > 0.0 => lag,
        _ => return PitchEstimate::unvoiced(level),
    };

    let period = peak_lag as f64 + parabolic_shift(&correlation, peak_lag);
    let frequency = sample_rate as f64 / period;
    if period <= 0.0 || !frequency.is_finite() {
        return PitchEstimate::unvoiced(level);
    }

    PitchEstimate {
        frequency_hz: frequency as f32,
        rms: level,
    }
}

/// Unnormalized autocorrelation `r[lag] = Σ x[i]·x[i+lag]` for every lag.
fn autocorrelate(samples: &[f32]) -> Vec<f64> {
    let size = samples.len();
    (0..size)
        .map(|lag| {
            samples[..size - lag]
                .iter()
                .zip(&samples[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum()
        })
        .collect()
}

/// Sub-sample offset of the vertex of the parabola through the peak and its
/// neighbours; neighbours outside the buffer count as zero.
fn parabolic_shift(correlation: &[f64], peak: usize) -> f64 {
    let left = if peak > 0 { correlation[peak - 1] } else { 0.0 };
    let center = correlation[peak];
    let right = correlation.get(peak + 1).copied().unwrap_or(0.0);

    let denominator = left - 2.0 * center + right;
    if denominator != 0.0 {
        (left - right) / (2.0 * denominator)
    } else {
        0.0
    }
}
