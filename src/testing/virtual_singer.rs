//! Scripted stand-in for a singer and their microphone.
//!
//! The tone player and the capture share a cue: whenever a reference tone is
//! played, the capture starts "singing" back according to the script entry
//! for that note.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::engine::backend::{AudioCapture, CaptureHandle, TonePlayer};
use crate::error::AudioError;
use crate::notes;
use crate::testing::fixtures::{SyntheticPattern, SyntheticSource, SyntheticSpec};

/// Level of the sung signal
pub const SINGER_AMPLITUDE: f32 = 0.3;

/// How the virtual singer answers one reference note
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// Sings the reference pitch
    Exact,
    /// Sings the reference shifted by the given cents
    Detuned(f32),
    /// Never starts singing
    Silent,
}

type Cue = Arc<Mutex<Option<f32>>>;

/// Shared, editable singer script
///
/// Changes apply to the next block read, so a test can make the singer
/// improve before retrying a note.
#[derive(Debug, Clone, Default)]
pub struct SingerScript {
    responses: Arc<Mutex<HashMap<i32, Response>>>,
}

impl SingerScript {
    pub fn set(&self, midi: i32, response: Response) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(midi, response);
    }

    /// Response for a note; unscripted notes are sung exactly
    pub fn response(&self, midi: i32) -> Response {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&midi)
            .copied()
            .unwrap_or(Response::Exact)
    }
}

/// Build a capture/player pair driven by `script`
///
/// Notes missing from the script are sung exactly.
pub fn virtual_singer(
    script: Vec<(i32, Response)>,
    sample_rate: f32,
) -> (ScriptedCapture, RecordingTonePlayer) {
    let cue: Cue = Arc::new(Mutex::new(None));
    let singer_script = SingerScript::default();
    for (midi, response) in script {
        singer_script.set(midi, response);
    }
    let capture = ScriptedCapture {
        script: singer_script,
        sample_rate,
        noise_amplitude: 0.0,
        cue: Arc::clone(&cue),
        opens: Arc::new(AtomicUsize::new(0)),
    };
    let player = RecordingTonePlayer {
        cue,
        log: ToneLog::default(),
    };
    (capture, player)
}

/// Capture backend that sings back the cued note
pub struct ScriptedCapture {
    script: SingerScript,
    sample_rate: f32,
    noise_amplitude: f32,
    cue: Cue,
    opens: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    /// Add seeded background noise at the given amplitude
    pub fn with_noise(mut self, amplitude: f32) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Handle for editing the script after the capture is boxed
    pub fn script(&self) -> SingerScript {
        self.script.clone()
    }

    /// Shared counter of successful `open` calls
    pub fn open_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }
}

impl AudioCapture for ScriptedCapture {
    fn open(&mut self) -> Result<Box<dyn CaptureHandle>, AudioError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let noise = SyntheticSpec {
            pattern: SyntheticPattern::WhiteNoise,
            frequency_hz: 0.0,
            amplitude: self.noise_amplitude,
        };
        Ok(Box::new(ScriptedHandle {
            script: self.script.clone(),
            sample_rate: self.sample_rate,
            cue: Arc::clone(&self.cue),
            voice: SyntheticSource::new(
                SyntheticSpec::sine(0.0, SINGER_AMPLITUDE),
                self.sample_rate,
            ),
            noise: SyntheticSource::new(noise, self.sample_rate),
            open: true,
        }))
    }
}

struct ScriptedHandle {
    script: SingerScript,
    sample_rate: f32,
    cue: Cue,
    voice: SyntheticSource,
    noise: SyntheticSource,
    open: bool,
}

impl ScriptedHandle {
    fn sung_frequency(&self) -> Option<f32> {
        let target = (*self.cue.lock().unwrap_or_else(PoisonError::into_inner))?;
        let midi = notes::frequency_to_midi(target)?.round() as i32;
        match self.script.response(midi) {
            Response::Exact => Some(target),
            Response::Detuned(cents) => Some(target * 2f32.powf(cents / 1200.0)),
            Response::Silent => None,
        }
    }
}

impl CaptureHandle for ScriptedHandle {
    fn read_block(&mut self, size: usize) -> Vec<f32> {
        if !self.open {
            return vec![0.0; size];
        }
        let mut block = self.noise.render(size);
        if let Some(frequency_hz) = self.sung_frequency() {
            self.voice.set_frequency(frequency_hz);
            for (out, sung) in block.iter_mut().zip(self.voice.render(size)) {
                *out += sung;
            }
        }
        block
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Record of reference tones requested from a [`RecordingTonePlayer`]
#[derive(Debug, Clone, Default)]
pub struct ToneLog {
    played: Arc<Mutex<Vec<f32>>>,
    stops: Arc<AtomicUsize>,
}

impl ToneLog {
    /// Frequencies played, in order
    pub fn frequencies(&self) -> Vec<f32> {
        self.played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Tone player that cues the virtual singer and records every request
pub struct RecordingTonePlayer {
    cue: Cue,
    log: ToneLog,
}

impl RecordingTonePlayer {
    /// Handle to the play log, usable after the player is boxed
    pub fn log(&self) -> ToneLog {
        self.log.clone()
    }
}

impl TonePlayer for RecordingTonePlayer {
    fn play(&mut self, frequency_hz: f32, _duration_sec: f32) {
        self.log
            .played
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frequency_hz);
        *self.cue.lock().unwrap_or_else(PoisonError::into_inner) = Some(frequency_hz);
    }

    fn stop(&mut self) {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        *self.cue.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis;
    use crate::notes::midi_to_frequency;

    #[test]
    fn test_silent_before_any_cue() {
        let (mut capture, _player) = virtual_singer(Vec::new(), 44_100.0);
        let mut handle = capture.open().unwrap();
        assert_eq!(analysis::rms(&handle.read_block(1024)), 0.0);
    }

    #[test]
    fn test_sings_cued_note() {
        let (mut capture, mut player) = virtual_singer(Vec::new(), 44_100.0);
        let mut handle = capture.open().unwrap();
        let target = midi_to_frequency(64);
        player.play(target, 2.0);

        let block = handle.read_block(2048);
        let hz = analysis::estimate(&block, 44_100.0).frequency().unwrap();
        assert!(analysis::cents_deviation(target, hz).abs() < 15.0);
    }

    #[test]
    fn test_detuned_response() {
        let (mut capture, mut player) =
            virtual_singer(vec![(62, Response::Detuned(100.0))], 44_100.0);
        let mut handle = capture.open().unwrap();
        player.play(midi_to_frequency(62), 2.0);

        let block = handle.read_block(2048);
        let hz = analysis::estimate(&block, 44_100.0).frequency().unwrap();
        let cents = analysis::cents_deviation(midi_to_frequency(62), hz);
        assert!((cents - 100.0).abs() < 15.0, "cents {}", cents);
    }

    #[test]
    fn test_silent_response_and_stop() {
        let (mut capture, mut player) = virtual_singer(vec![(60, Response::Silent)], 44_100.0);
        let log = player.log();
        let mut handle = capture.open().unwrap();
        player.play(midi_to_frequency(60), 2.0);
        assert_eq!(analysis::rms(&handle.read_block(512)), 0.0);

        player.play(midi_to_frequency(62), 2.0);
        assert!(analysis::rms(&handle.read_block(512)) > 0.1);
        player.stop();
        assert_eq!(analysis::rms(&handle.read_block(512)), 0.0);
        assert_eq!(log.frequencies().len(), 2);
        assert_eq!(log.stop_count(), 1);
    }

    #[test]
    fn test_script_edits_apply_to_open_handles() {
        let (mut capture, mut player) = virtual_singer(Vec::new(), 44_100.0);
        let script = capture.script();
        let mut handle = capture.open().unwrap();
        player.play(midi_to_frequency(65), 2.0);
        assert!(analysis::rms(&handle.read_block(512)) > 0.1);

        script.set(65, Response::Silent);
        assert_eq!(analysis::rms(&handle.read_block(512)), 0.0);
    }

    #[test]
    fn test_noise_stays_below_onset_level() {
        let (capture, _player) = virtual_singer(Vec::new(), 44_100.0);
        let mut capture = capture.with_noise(0.005);
        let mut handle = capture.open().unwrap();
        let level = analysis::rms(&handle.read_block(2048));
        assert!(level > 0.0 && level < 0.015);
    }
}
