use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{log_audio_error, AudioError};

use super::{AudioCapture, CaptureHandle, TonePlayer};

/// Capture backend for platforms or environments without a microphone.
///
/// Every `open` fails with the configured error, so sessions report the
/// device as unavailable instead of grading silence.
pub struct UnavailableCapture {
    error: AudioError,
}

impl UnavailableCapture {
    pub fn new(error: AudioError) -> Self {
        Self { error }
    }
}

impl AudioCapture for UnavailableCapture {
    fn open(&mut self) -> Result<Box<dyn CaptureHandle>, AudioError> {
        log_audio_error(&self.error, "UnavailableCapture::open");
        Err(self.error.clone())
    }
}

/// Tone player that produces no sound.
///
/// Counts requests so headless tooling can confirm the sequence advanced.
#[derive(Default)]
pub struct SilentTonePlayer {
    played: AtomicU64,
}

impl SilentTonePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }
}

impl TonePlayer for SilentTonePlayer {
    fn play(&mut self, frequency_hz: f32, duration_sec: f32) {
        self.played.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[SilentTonePlayer] Skipping {:.2} Hz tone ({:.1}s)",
            frequency_hz,
            duration_sec
        );
    }

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_capture_reports_error() {
        let mut capture = UnavailableCapture::new(AudioError::PermissionDenied);
        assert_eq!(capture.open().err(), Some(AudioError::PermissionDenied));
    }

    #[test]
    fn test_silent_player_counts_requests() {
        let mut player = SilentTonePlayer::new();
        player.play(261.63, 2.0);
        player.play(293.66, 2.0);
        player.stop();
        assert_eq!(player.played(), 2);
    }
}
