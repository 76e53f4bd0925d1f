//! Deterministic test harness.
//!
//! Virtual time, synthetic signals and a scripted singer, so complete
//! sessions run without audio hardware. Compiled into the library so
//! integration tests and the CLI `simulate` command share it.

pub mod clock;
pub mod fixtures;
pub mod virtual_singer;

pub use clock::ManualClock;
pub use fixtures::{sine, silence, white_noise, SyntheticPattern, SyntheticSource, SyntheticSpec};
pub use virtual_singer::{
    virtual_singer, RecordingTonePlayer, Response, ScriptedCapture, SingerScript, ToneLog,
    SINGER_AMPLITUDE,
};

use crate::config::AppConfig;

/// Short configuration for fast simulated sessions
///
/// C4..G4 (five naturals) with a 250 ms measurement window, giving five
/// frames per sung note at the default 60 ms frame interval.
pub fn quick_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.assessment.midi_range_low = 60;
    config.assessment.midi_range_high = 67;
    config.assessment.measurement_window_sec = 0.25;
    config
}
