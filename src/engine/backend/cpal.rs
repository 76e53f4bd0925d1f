//! CPAL-based devices for desktop platforms (Linux, macOS, Windows)
//!
//! `cpal::Stream` is not `Send` on every host, so each stream lives on a
//! dedicated thread for its whole lifetime. Captured samples cross to the
//! session thread through a lock-free rtrb ring buffer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::config::{AudioConfig, ToneTimbre};
use crate::error::{log_audio_error, AudioError};

use super::tone::ReferenceTone;
use super::{AudioCapture, CaptureHandle, TonePlayer};

/// Microphone capture through the default input device
pub struct CpalCapture {
    config: AudioConfig,
}

impl CpalCapture {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl AudioCapture for CpalCapture {
    fn open(&mut self) -> Result<Box<dyn CaptureHandle>, AudioError> {
        let capacity = self.config.ring_capacity.max(self.config.block_size);
        let (producer, consumer) = RingBuffer::<f32>::new(capacity);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let preferred_hz = self.config.sample_rate;

        let worker = thread::Builder::new()
            .name("vocal-capture".to_string())
            .spawn(move || match create_input_stream(producer, preferred_hz) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    // Park until the handle is closed or dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to spawn capture thread: {}", e),
            })?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| AudioError::StreamOpenFailed {
                reason: "Capture thread exited before reporting".to_string(),
            })??;

        log::info!(
            "[CpalCapture] Input stream open at {} Hz (ring capacity {})",
            sample_rate,
            capacity
        );

        Ok(Box::new(CpalCaptureHandle {
            consumer,
            history: VecDeque::with_capacity(self.config.block_size),
            sample_rate,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        }))
    }
}

/// First F32 config range that supports `preferred_hz`, fixed at that rate
fn config_at_rate(
    ranges: impl IntoIterator<Item = cpal::SupportedStreamConfigRange>,
    preferred_hz: u32,
) -> Option<cpal::SupportedStreamConfig> {
    ranges
        .into_iter()
        .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
        .find_map(|range| range.try_with_sample_rate(cpal::SampleRate(preferred_hz)))
}

fn create_input_stream(
    mut producer: Producer<f32>,
    preferred_hz: u32,
) -> Result<(cpal::Stream, f32), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioError::NoInputDevice)?;

    let preferred = device
        .supported_input_configs()
        .ok()
        .and_then(|ranges| config_at_rate(ranges, preferred_hz));
    let config = match preferred {
        Some(config) => config,
        None => {
            log::info!(
                "[CpalCapture] {} Hz unsupported, using the device default",
                preferred_hz
            );
            device
                .default_input_config()
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("Failed to get default input config: {:?}", e),
                })?
        }
    };

    let stream_config: cpal::StreamConfig = config.clone().into();
    let channels_count = (stream_config.channels as usize).max(1);
    let sample_rate = stream_config.sample_rate.0 as f32;

    let err_fn = |err: cpal::StreamError| log::warn!("[CpalCapture] Input stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // First channel only; overflow drops the newest samples
                for frame in data.chunks(channels_count) {
                    let _ = producer.push(frame[0]);
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::StreamOpenFailed {
                reason: format!("Unsupported input sample format {:?}", other),
            })
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
        other => AudioError::StreamOpenFailed {
            reason: format!("{:?}", other),
        },
    })?;

    stream.play().map_err(|e| AudioError::StreamOpenFailed {
        reason: format!("Failed to start input stream: {:?}", e),
    })?;

    Ok((stream, sample_rate))
}

struct CpalCaptureHandle {
    consumer: Consumer<f32>,
    /// Most recent samples, oldest first
    history: VecDeque<f32>,
    sample_rate: f32,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureHandle for CpalCaptureHandle {
    fn read_block(&mut self, size: usize) -> Vec<f32> {
        while let Ok(sample) = self.consumer.pop() {
            self.history.push_back(sample);
        }
        while self.history.len() > size {
            self.history.pop_front();
        }

        let mut block = vec![0.0; size - self.history.len()];
        block.extend(self.history.iter().copied());
        block
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("[CpalCapture] Capture thread panicked");
            }
            log::debug!("[CpalCapture] Input stream closed");
        }
        self.history.clear();
    }
}

impl Drop for CpalCaptureHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reference tone playback through the default output device
///
/// Each tone runs on its own thread and output stream; starting a new tone
/// or calling `stop` cuts the previous one short.
pub struct CpalTonePlayer {
    timbre: ToneTimbre,
    preferred_hz: u32,
    active: Option<Arc<AtomicBool>>,
}

impl CpalTonePlayer {
    pub fn new(timbre: ToneTimbre, preferred_hz: u32) -> Self {
        Self {
            timbre,
            preferred_hz,
            active: None,
        }
    }
}

impl TonePlayer for CpalTonePlayer {
    fn play(&mut self, frequency_hz: f32, duration_sec: f32) {
        self.stop();

        let cancelled = Arc::new(AtomicBool::new(false));
        self.active = Some(Arc::clone(&cancelled));
        let timbre = self.timbre;
        let preferred_hz = self.preferred_hz;

        let spawned = thread::Builder::new()
            .name("vocal-reference-tone".to_string())
            .spawn(move || {
                if let Err(err) = play_blocking(frequency_hz, duration_sec, timbre, preferred_hz, &cancelled) {
                    log_audio_error(&err, "CpalTonePlayer::play");
                }
            });

        if let Err(err) = spawned {
            log::warn!("[CpalTonePlayer] Failed to spawn playback thread: {}", err);
        }
    }

    fn stop(&mut self) {
        if let Some(cancelled) = self.active.take() {
            cancelled.store(true, Ordering::Relaxed);
        }
    }
}

impl Drop for CpalTonePlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn play_blocking(
    frequency_hz: f32,
    duration_sec: f32,
    timbre: ToneTimbre,
    preferred_hz: u32,
    cancelled: &AtomicBool,
) -> Result<(), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoOutputDevice)?;

    let preferred = device
        .supported_output_configs()
        .ok()
        .and_then(|ranges| config_at_rate(ranges, preferred_hz));
    let config = match preferred {
        Some(config) => config,
        None => device
            .default_output_config()
            .map_err(|e| AudioError::PlaybackFailed {
                reason: format!("Failed to get default output config: {:?}", e),
            })?,
    };

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::PlaybackFailed {
            reason: "Only F32 sample format is currently supported for output".to_string(),
        });
    }

    let stream_config: cpal::StreamConfig = config.into();
    let channels_count = (stream_config.channels as usize).max(1);
    let sample_rate = stream_config.sample_rate.0 as f32;
    let mut tone = ReferenceTone::new(frequency_hz, duration_sec, sample_rate, timbre);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels_count) {
                    let sample = tone.next().unwrap_or(0.0);
                    frame.iter_mut().for_each(|out| *out = sample);
                }
            },
            |err: cpal::StreamError| log::warn!("[CpalTonePlayer] Output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::PlaybackFailed {
            reason: format!("{:?}", e),
        })?;

    stream.play().map_err(|e| AudioError::PlaybackFailed {
        reason: format!("{:?}", e),
    })?;

    log::debug!(
        "[CpalTonePlayer] Playing {:.2} Hz for {:.1}s",
        frequency_hz,
        duration_sec
    );

    let deadline = Instant::now() + Duration::from_secs_f32(duration_sec.max(0.0) + 0.05);
    while Instant::now() < deadline && !cancelled.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}
