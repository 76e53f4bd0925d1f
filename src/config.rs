//! Configuration management for assessment tuning
//!
//! This module provides runtime configuration loading from JSON files, so
//! grading thresholds, timing windows and capture parameters can be adjusted
//! without recompilation. Every section falls back to its defaults when a
//! field is missing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::SessionError;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assessment: AssessmentConfig,
    pub timing: TimingConfig,
    pub audio: AudioConfig,
}

/// Grading and range parameters for one assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Length of the pitch measurement window after onset, in seconds
    pub measurement_window_sec: f32,
    /// RMS level that counts as the singer starting
    pub onset_rms_threshold: f32,
    /// Interval between pitch frames in milliseconds
    pub frame_interval_ms: u64,
    /// Deviation (cents) within which a frame is strong
    pub strong_cents: f32,
    /// Deviation (cents) within which a frame is weak
    pub weak_cents: f32,
    /// Strong-frame ratio required for a Strong grade
    pub strong_percent: f32,
    /// Weak-frame ratio required for a Weak grade
    pub weak_percent: f32,
    /// Lowest MIDI note tested (inclusive)
    pub midi_range_low: i32,
    /// Highest MIDI note tested (inclusive)
    pub midi_range_high: i32,
    /// Consecutive non-strong notes a tessitura run may bridge
    pub max_retry_gaps: usize,
    /// Minimum strong notes for a tessitura segment
    pub min_tessitura_notes: usize,
    /// Strong ratio at which a note counts toward the tessitura
    pub tessitura_strong_threshold: f32,
}

impl AssessmentConfig {
    /// Piano-tone assessment (the default)
    pub fn piano() -> Self {
        Self {
            measurement_window_sec: 3.0,
            onset_rms_threshold: 0.015,
            frame_interval_ms: 60,
            strong_cents: 30.0,
            weak_cents: 75.0,
            strong_percent: 0.6,
            weak_percent: 0.4,
            midi_range_low: 48,
            midi_range_high: 72,
            max_retry_gaps: 1,
            min_tessitura_notes: 3,
            tessitura_strong_threshold: 0.6,
        }
    }

    /// Pure sine-tone assessment with a more sensitive onset gate
    pub fn sine() -> Self {
        Self {
            onset_rms_threshold: 0.01,
            ..Self::piano()
        }
    }

    pub fn measurement_window(&self) -> Duration {
        Duration::from_secs_f32(self.measurement_window_sec.max(0.0))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self::piano()
    }
}

/// Per-note timing windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Silent lead-in before the reference tone
    pub count_in_ms: u64,
    /// Duration of the reference tone
    pub reference_tone_sec: f32,
    /// Wait after triggering the reference tone (slightly longer than the tone)
    pub reference_wait_ms: u64,
    /// Polling cadence while waiting for the singer to start
    pub onset_poll_ms: u64,
    /// Give up waiting for the singer after this long
    pub onset_deadline_ms: u64,
    /// Pause between one note's grading and the next note's count-in
    pub inter_note_pause_ms: u64,
}

impl TimingConfig {
    /// Piano-tone timing (the default): a 2 s tone with a long decay
    pub fn piano() -> Self {
        Self {
            count_in_ms: 1000,
            reference_tone_sec: 2.0,
            reference_wait_ms: 2300,
            onset_poll_ms: 100,
            onset_deadline_ms: 4000,
            inter_note_pause_ms: 800,
        }
    }

    /// Sine-tone timing: a short 1 s tone and a tighter onset deadline
    pub fn sine() -> Self {
        Self {
            reference_tone_sec: 1.0,
            reference_wait_ms: 1200,
            onset_deadline_ms: 3000,
            ..Self::piano()
        }
    }

    pub fn count_in(&self) -> Duration {
        Duration::from_millis(self.count_in_ms)
    }

    pub fn reference_wait(&self) -> Duration {
        Duration::from_millis(self.reference_wait_ms)
    }

    pub fn onset_poll(&self) -> Duration {
        Duration::from_millis(self.onset_poll_ms)
    }

    pub fn onset_deadline(&self) -> Duration {
        Duration::from_millis(self.onset_deadline_ms)
    }

    pub fn inter_note_pause(&self) -> Duration {
        Duration::from_millis(self.inter_note_pause_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::piano()
    }
}

/// Reference tone timbre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneTimbre {
    /// Plain sine at constant level
    Sine,
    /// Sine/triangle mix with a struck-string envelope
    #[default]
    Piano,
}

/// Capture and playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Samples per analysis block
    pub block_size: usize,
    /// RMS below which the pitch estimator reports no pitch
    pub silence_rms: f32,
    /// Sample rate requested from capture and playback devices, falling back
    /// to the device default; the simulator renders at this rate
    pub sample_rate: u32,
    /// Capacity of the capture ring buffer in samples
    pub ring_capacity: usize,
    /// Timbre of the reference tone
    pub timbre: ToneTimbre,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            block_size: 2048,
            silence_rms: 0.001,
            sample_rate: 44_100,
            ring_capacity: 16_384,
            timbre: ToneTimbre::Piano,
        }
    }
}

impl AppConfig {
    /// Configuration for the sine-tone assessment variant
    pub fn sine() -> Self {
        Self {
            assessment: AssessmentConfig::sine(),
            timing: TimingConfig::sine(),
            audio: AudioConfig {
                timbre: ToneTimbre::Sine,
                ..AudioConfig::default()
            },
        }
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration; if the file doesn't exist or the JSON is
    /// invalid, the defaults are returned and a warning is logged.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/assessment_config.json")
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// `SessionError::InvalidConfig` naming the first violated constraint
    pub fn validate(&self) -> Result<(), SessionError> {
        let a = &self.assessment;
        let invalid = |reason: String| Err(SessionError::InvalidConfig { reason });

        if a.strong_cents >= a.weak_cents {
            return invalid(format!(
                "strong_cents ({}) must be below weak_cents ({})",
                a.strong_cents, a.weak_cents
            ));
        }
        if a.midi_range_low > a.midi_range_high {
            return invalid(format!(
                "midi range {}..={} is empty",
                a.midi_range_low, a.midi_range_high
            ));
        }
        for (name, value) in [
            ("strong_percent", a.strong_percent),
            ("weak_percent", a.weak_percent),
            ("tessitura_strong_threshold", a.tessitura_strong_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} ({}) must be within [0, 1]", name, value));
            }
        }
        if a.min_tessitura_notes == 0 {
            return invalid("min_tessitura_notes must be at least 1".to_string());
        }
        if a.frame_interval_ms == 0 || self.timing.onset_poll_ms == 0 {
            return invalid("frame and onset poll intervals must be non-zero".to_string());
        }
        if self.audio.block_size < 2 {
            return invalid(format!(
                "block_size ({}) must be at least 2",
                self.audio.block_size
            ));
        }
        Ok(())
    }
}
