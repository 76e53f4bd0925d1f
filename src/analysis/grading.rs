//! Frame and note grading.
//!
//! A frame is one voiced pitch sample taken while the singer holds a note.
//! Frames are classified by their absolute deviation in cents against two
//! nested tolerances, and a note's frames are aggregated into strong/weak
//! ratios that decide its [`Grade`].

use serde::{Deserialize, Serialize};

use crate::config::AssessmentConfig;
use crate::notes::Note;

/// One voiced pitch sample captured during a note's measurement window.
///
/// Unvoiced estimates are never stored as frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Measured fundamental in Hz
    pub frequency_hz: f32,
    /// Absolute deviation from the target in cents
    pub cents_deviation: f32,
}

impl Frame {
    /// Build a frame for a measurement against a target
    ///
    /// # Returns
    /// * `Some(Frame)` - Measurement is voiced and comparable
    /// * `None` - Measurement carries no pitch (sentinel or non-positive)
    pub fn measure(target_hz: f32, measured_hz: f32) -> Option<Self> {
        let cents = cents_deviation(target_hz, measured_hz);
        if !cents.is_finite() {
            return None;
        }
        Some(Self {
            frequency_hz: measured_hz,
            cents_deviation: cents.abs(),
        })
    }
}

/// Tolerance band a frame falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameClass {
    /// Within the strong tolerance (and therefore the weak one too)
    Strong,
    /// Within the weak tolerance only
    Weak,
    /// Outside both tolerances
    Outside,
}

/// Discrete per-note grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Strong,
    Weak,
    Fail,
}

impl Grade {
    /// Get human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Grade::Strong => "Strong OK",
            Grade::Weak => "Weak OK",
            Grade::Fail => "Fail",
        }
    }
}

/// Static grading thresholds.
///
/// `strong_cents < weak_cents` keeps the strong band nested inside the weak
/// band, so a note's weak ratio is never below its strong ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradingThresholds {
    pub strong_cents: f32,
    pub weak_cents: f32,
    pub strong_percent: f32,
    pub weak_percent: f32,
}

impl Default for GradingThresholds {
    fn default() -> Self {
        Self::from(&AssessmentConfig::default())
    }
}

impl From<&AssessmentConfig> for GradingThresholds {
    fn from(config: &AssessmentConfig) -> Self {
        Self {
            strong_cents: config.strong_cents,
            weak_cents: config.weak_cents,
            strong_percent: config.strong_percent,
            weak_percent: config.weak_percent,
        }
    }
}

/// Graded outcome of one reference note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteResult {
    pub note: Note,
    /// Share of frames within `strong_cents`, in [0, 1]
    pub strong_ratio: f32,
    /// Share of frames within `weak_cents`, in [0, 1]
    pub weak_ratio: f32,
    pub grade: Grade,
    /// Number of voiced frames the ratios were computed from
    pub frame_count: usize,
}

impl NoteResult {
    pub fn is_strong(&self) -> bool {
        self.grade == Grade::Strong
    }
}

/// Deviation of `measured_hz` from `target_hz` in cents.
///
/// Returns `f32::INFINITY` when either frequency is not positive, meaning the
/// two are not comparable.
pub fn cents_deviation(target_hz: f32, measured_hz: f32) -> f32 {
    if target_hz <= 0.0 || measured_hz <= 0.0 {
        return f32::INFINITY;
    }
    1200.0 * (measured_hz / target_hz).log2()
}

/// Classify a deviation (either sign) against the thresholds.
pub fn classify(cents: f32, thresholds: &GradingThresholds) -> FrameClass {
    let magnitude = cents.abs();
    if magnitude <= thresholds.strong_cents {
        FrameClass::Strong
    } else if magnitude <= thresholds.weak_cents {
        FrameClass::Weak
    } else {
        FrameClass::Outside
    }
}

/// Aggregate a note's frames into ratios and a grade.
///
/// Zero frames grade as `Fail` with both ratios at 0. Strong is checked
/// before Weak, so a note meeting both percentages is `Strong`.
pub fn grade(note: &Note, frames: &[Frame], thresholds: &GradingThresholds) -> NoteResult {
    let total = frames.len().max(1) as f32;
    let within = |limit: f32| {
        frames
            .iter()
            .filter(|frame| frame.cents_deviation.abs() <= limit)
            .count() as f32
    };

    let strong_ratio = within(thresholds.strong_cents) / total;
    let weak_ratio = within(thresholds.weak_cents) / total;

    let grade = if strong_ratio >= thresholds.strong_percent {
        Grade::Strong
    } else if weak_ratio >= thresholds.weak_percent {
        Grade::Weak
    } else {
        Grade::Fail
    };

    NoteResult {
        note: note.clone(),
        strong_ratio,
        weak_ratio,
        grade,
        frame_count: frames.len(),
    }
}
