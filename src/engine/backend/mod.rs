//! Collaborator abstractions for the assessment engine.
//!
//! The sequence runner never touches a device or the wall clock directly.
//! Capture, reference-tone playback and time are injected through the traits
//! below, so the same runner drives real hardware, the CLI simulator and the
//! deterministic test harness.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::AudioConfig;
use crate::error::AudioError;

/// Opens microphone capture for a single run.
pub trait AudioCapture: Send {
    fn open(&mut self) -> Result<Box<dyn CaptureHandle>, AudioError>;
}

/// An open capture stream.
pub trait CaptureHandle: Send {
    /// Latest `size` samples of mono input, zero-padded if fewer are available
    fn read_block(&mut self, size: usize) -> Vec<f32>;

    fn sample_rate(&self) -> f32;

    /// Release the device; further reads return silence
    fn close(&mut self);
}

/// Plays reference tones. Playback is fire-and-forget.
pub trait TonePlayer: Send {
    fn play(&mut self, frequency_hz: f32, duration_sec: f32);

    /// Silence any tone still sounding
    fn stop(&mut self);
}

/// Monotonic time and sleeping.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant` and `thread::sleep`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Everything a runner needs from the outside world.
pub struct Collaborators {
    pub capture: Box<dyn AudioCapture>,
    pub player: Box<dyn TonePlayer>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        capture: Box<dyn AudioCapture>,
        player: Box<dyn TonePlayer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            capture,
            player,
            clock,
        }
    }

    /// Platform devices with the system clock
    pub fn platform(audio: &AudioConfig) -> Self {
        Self::new(
            platform_capture(audio),
            platform_player(audio),
            Arc::new(SystemClock::new()),
        )
    }
}

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "android"))] {
        mod cpal;
        pub use self::cpal::{CpalCapture, CpalTonePlayer};

        fn platform_capture(audio: &AudioConfig) -> Box<dyn AudioCapture> {
            Box::new(CpalCapture::new(audio.clone()))
        }

        fn platform_player(audio: &AudioConfig) -> Box<dyn TonePlayer> {
            Box::new(CpalTonePlayer::new(audio.timbre, audio.sample_rate))
        }
    } else {
        fn platform_capture(_audio: &AudioConfig) -> Box<dyn AudioCapture> {
            Box::new(UnavailableCapture::new(AudioError::NoInputDevice))
        }

        fn platform_player(_audio: &AudioConfig) -> Box<dyn TonePlayer> {
            Box::new(SilentTonePlayer::new())
        }
    }
}

mod desktop_stub;
pub use desktop_stub::{SilentTonePlayer, UnavailableCapture};

pub mod tone;
pub use tone::ReferenceTone;
