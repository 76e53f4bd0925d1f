// SequenceRunner - drives an assessment session through its notes
//
// One runner owns one session. `run_sequence` walks every note in the
// configured range through the per-note state machine and grades it;
// `retry_note` re-measures a single eligible note afterwards. Both calls
// block the calling thread until the run finishes or is aborted.
//
// Time, capture and playback come from injected collaborators, so a
// ManualClock plus scripted capture replays a whole session instantly.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};

use crate::analysis::{
    self, pitch, Frame, GradingThresholds, NoteResult, RangeSummary, TessituraAnalysis,
};
use crate::config::AppConfig;
use crate::engine::backend::{AudioCapture, CaptureHandle, Clock, Collaborators, TonePlayer};
use crate::error::{
    log_audio_error, log_session_error, AudioError, ErrorCode, RetryRejection, SessionError,
};
use crate::notes::{self, Note};
use crate::session::events::{
    FrameEvent, FrameEventStream, SessionEvent, SessionReport, SessionSnapshot,
    EVENT_CHANNEL_CAPACITY,
};
use crate::session::phase::{NotePhase, SessionStatus};
use crate::session::retry;
use crate::session::state::SessionState;

/// How a blocking run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Finished(T),
    /// Stopped by an abort request; results graded so far are kept
    Aborted,
}

impl<T> RunOutcome<T> {
    pub fn finished(self) -> Option<T> {
        match self {
            RunOutcome::Finished(value) => Some(value),
            RunOutcome::Aborted => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RunOutcome::Aborted)
    }
}

/// Requests cancellation of the active run from any thread
///
/// A request stays pending until the runner call it interrupts returns, so
/// a request made just before a run starts still stops that run.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    requested: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Marker for a run unwound by an abort request
#[derive(Debug)]
struct Interrupted;

/// Per-note step with the data each step carries
#[derive(Debug, Clone, Copy)]
enum Step {
    CountIn,
    PlayReference,
    WaitOnset { deadline: Duration },
    Measuring { started: Duration },
    Graded,
}

impl Step {
    fn initial(retry: bool) -> Self {
        match NotePhase::initial(retry) {
            NotePhase::PlayReference => Step::PlayReference,
            _ => Step::CountIn,
        }
    }

    fn phase(&self) -> NotePhase {
        match self {
            Step::CountIn => NotePhase::CountIn,
            Step::PlayReference => NotePhase::PlayReference,
            Step::WaitOnset { .. } => NotePhase::WaitOnset,
            Step::Measuring { .. } => NotePhase::Measuring,
            Step::Graded => NotePhase::Graded,
        }
    }
}

/// Assessment session driver
pub struct SequenceRunner {
    config: AppConfig,
    thresholds: GradingThresholds,
    notes: Vec<Note>,
    capture: Box<dyn AudioCapture>,
    player: Box<dyn TonePlayer>,
    clock: Arc<dyn Clock>,
    state: SessionState,
    abort: AbortHandle,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    frames: Option<mpsc::UnboundedSender<FrameEvent>>,
}

impl SequenceRunner {
    /// Create a runner for the configured note range
    ///
    /// # Errors
    /// `SessionError::InvalidConfig` when the configuration fails validation
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Result<Self, SessionError> {
        config.validate()?;

        let notes = notes::generate(
            config.assessment.midi_range_low,
            config.assessment.midi_range_high,
        );
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        log::info!(
            "[SequenceRunner] Ready: {} notes ({}..={})",
            notes.len(),
            config.assessment.midi_range_low,
            config.assessment.midi_range_high
        );

        Ok(Self {
            thresholds: GradingThresholds::from(&config.assessment),
            config,
            notes,
            capture: collaborators.capture,
            player: collaborators.player,
            clock: collaborators.clock,
            state: SessionState::new(),
            abort: AbortHandle::default(),
            snapshots,
            events,
            frames: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Notes assessed by `run_sequence`, ascending
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    /// Frame events for the next run
    ///
    /// Replaces any earlier subscription, which ends immediately.
    pub fn subscribe_frames(&mut self) -> FrameEventStream {
        let (tx, stream) = FrameEventStream::channel();
        self.frames = Some(tx);
        stream
    }

    /// MIDI numbers that `retry_note` would currently accept
    ///
    /// Empty until every note of the session has been graded.
    pub fn eligible_retries(&self) -> BTreeSet<i32> {
        if !self.session_complete() {
            return BTreeSet::new();
        }
        retry::eligible_notes(self.state.results(), self.state.retried())
    }

    /// Whether every note in range has a graded result
    pub fn session_complete(&self) -> bool {
        self.state.results().len() == self.notes.len()
    }

    /// Segmentation of the current results
    pub fn tessitura_analysis(&self) -> TessituraAnalysis {
        let assessment = &self.config.assessment;
        analysis::analyze(
            self.state.results(),
            assessment.tessitura_strong_threshold,
            assessment.min_tessitura_notes,
            assessment.max_retry_gaps,
        )
    }

    pub fn report(&self) -> SessionReport {
        SessionReport::new(
            self.state.results().to_vec(),
            self.tessitura_analysis(),
            self.state.retried().clone(),
        )
    }

    /// Assess every note in range, discarding any previous session
    ///
    /// # Returns
    /// * `Ok(RunOutcome::Finished(report))` - All notes graded
    /// * `Ok(RunOutcome::Aborted)` - Abort requested; status is back to Idle
    /// * `Err(SessionError::DeviceUnavailable)` - Capture could not be opened;
    ///   nothing was graded
    /// * `Err(SessionError::AlreadyRunning)` - A run is still active
    pub fn run_sequence(&mut self) -> Result<RunOutcome<SessionReport>, SessionError> {
        let outcome = self.sequence();
        self.abort.clear();
        outcome
    }

    /// Re-measure one eligible note and replace its result in place
    ///
    /// Only a session that graded every note accepts retries. Retries skip
    /// the count-in. A note counts as retried only once its re-measurement
    /// completes; an aborted retry can be requested again.
    ///
    /// # Errors
    /// * `SessionError::RetryRejected` - Session incomplete, or note unknown,
    ///   not eligible or already retried; nothing changed
    /// * `SessionError::DeviceUnavailable` - Capture could not be opened
    /// * `SessionError::AlreadyRunning` - A run is still active
    pub fn retry_note(&mut self, midi: i32) -> Result<RunOutcome<NoteResult>, SessionError> {
        let outcome = self.retry(midi);
        self.abort.clear();
        outcome
    }

    fn sequence(&mut self) -> Result<RunOutcome<SessionReport>, SessionError> {
        self.ensure_idle()?;
        self.state.begin();
        self.publish_snapshot();

        let mut capture = match self.capture.open() {
            Ok(capture) => capture,
            Err(err) => {
                self.state.halt();
                return Err(self.device_failure(err, "SequenceRunner::run_sequence"));
            }
        };

        self.state.set_status(SessionStatus::Running);
        self.emit(SessionEvent::Started {
            note_count: self.notes.len(),
        });
        self.publish_snapshot();
        log::info!("[SequenceRunner] Session started");

        let outcome = self.run_notes(capture.as_mut());
        capture.close();

        match outcome {
            Ok(()) => {
                self.finish();
                Ok(RunOutcome::Finished(self.report()))
            }
            Err(Interrupted) => {
                self.halt();
                Ok(RunOutcome::Aborted)
            }
        }
    }

    fn retry(&mut self, midi: i32) -> Result<RunOutcome<NoteResult>, SessionError> {
        self.ensure_idle()?;

        let checked = if self.session_complete() {
            retry::check(self.state.results(), self.state.retried(), midi)
        } else {
            Err(RetryRejection::SessionIncomplete)
        };
        let index = checked.map_err(|reason| {
            let err = SessionError::RetryRejected { midi, reason };
            log_session_error(&err, "SequenceRunner::retry_note");
            err
        })?;
        let note = self.state.results()[index].note.clone();

        let mut capture = match self.capture.open() {
            Ok(capture) => capture,
            Err(err) => return Err(self.device_failure(err, "SequenceRunner::retry_note")),
        };

        self.state.set_status(SessionStatus::Retrying);
        self.emit(SessionEvent::RetryStarted {
            index,
            note: note.clone(),
        });
        log::info!("[SequenceRunner] Retrying {} (MIDI {})", note.name, midi);

        let outcome = self.measure_note(capture.as_mut(), index, &note, true);
        capture.close();

        match outcome {
            Ok(result) => {
                self.state.mark_retried(midi);
                self.commit(result.clone());
                self.finish();
                Ok(RunOutcome::Finished(result))
            }
            Err(Interrupted) => {
                self.halt();
                Ok(RunOutcome::Aborted)
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.state.status().is_active() {
            let err = SessionError::AlreadyRunning;
            log_session_error(&err, "SequenceRunner::ensure_idle");
            return Err(err);
        }
        Ok(())
    }

    fn run_notes(&mut self, capture: &mut dyn CaptureHandle) -> Result<(), Interrupted> {
        let count = self.notes.len();
        for index in 0..count {
            let note = self.notes[index].clone();
            let result = self.measure_note(capture, index, &note, false)?;
            self.commit(result);

            if index + 1 < count {
                self.pause(self.config.timing.inter_note_pause())?;
            }
        }
        Ok(())
    }

    /// Walk one note through the per-note state machine
    fn measure_note(
        &mut self,
        capture: &mut dyn CaptureHandle,
        index: usize,
        note: &Note,
        retry: bool,
    ) -> Result<NoteResult, Interrupted> {
        self.state.set_current_note(Some(note.clone()));
        self.emit(SessionEvent::NoteStarted {
            index,
            note: note.clone(),
        });
        self.publish_snapshot();

        let timing = self.config.timing.clone();
        let mut frames = Vec::new();
        let mut step = Step::initial(retry);

        loop {
            self.check_abort()?;
            self.emit(SessionEvent::PhaseChanged {
                index,
                phase: step.phase(),
            });

            step = match step {
                Step::CountIn => {
                    self.pause(timing.count_in())?;
                    Step::PlayReference
                }
                Step::PlayReference => {
                    self.player
                        .play(note.frequency_hz, timing.reference_tone_sec);
                    self.pause(timing.reference_wait())?;
                    Step::WaitOnset {
                        deadline: self.clock.now() + timing.onset_deadline(),
                    }
                }
                Step::WaitOnset { deadline } => {
                    if self.wait_for_onset(capture, deadline)? {
                        Step::Measuring {
                            started: self.clock.now(),
                        }
                    } else {
                        tracing::debug!(note = %note.name, "onset deadline passed");
                        self.emit(SessionEvent::OnsetTimeout { index });
                        Step::Graded
                    }
                }
                Step::Measuring { started } => {
                    self.collect_frames(capture, index, note, started, &mut frames)?;
                    Step::Graded
                }
                Step::Graded => break,
            };
        }

        let result = analysis::grade(note, &frames, &self.thresholds);
        tracing::info!(
            note = %note.name,
            grade = result.grade.display_name(),
            strong_ratio = result.strong_ratio,
            weak_ratio = result.weak_ratio,
            frames = result.frame_count,
            "note graded"
        );
        Ok(result)
    }

    /// Poll input level until it crosses the onset threshold
    ///
    /// # Returns
    /// `true` on onset, `false` once `deadline` passes without one
    fn wait_for_onset(
        &self,
        capture: &mut dyn CaptureHandle,
        deadline: Duration,
    ) -> Result<bool, Interrupted> {
        let block_size = self.config.audio.block_size;
        let threshold = self.config.assessment.onset_rms_threshold;
        let poll = self.config.timing.onset_poll();

        while self.clock.now() < deadline {
            let block = capture.read_block(block_size);
            if pitch::rms(&block) > threshold {
                return Ok(true);
            }
            self.pause(poll)?;
        }
        Ok(false)
    }

    /// Take a pitch frame every frame interval until the window closes
    fn collect_frames(
        &mut self,
        capture: &mut dyn CaptureHandle,
        index: usize,
        note: &Note,
        started: Duration,
        frames: &mut Vec<Frame>,
    ) -> Result<(), Interrupted> {
        let block_size = self.config.audio.block_size;
        let silence_rms = self.config.audio.silence_rms;
        let window = self.config.assessment.measurement_window();
        let interval = self.config.assessment.frame_interval();

        while self.clock.now().saturating_sub(started) < window {
            let block = capture.read_block(block_size);
            let estimate = pitch::estimate_with_floor(&block, capture.sample_rate(), silence_rms);
            let frame = estimate
                .frequency()
                .and_then(|hz| Frame::measure(note.frequency_hz, hz));

            if let Some(frame) = frame {
                frames.push(frame);
                self.publish_frame(FrameEvent {
                    note_index: index,
                    frame,
                });
            }
            self.pause(interval)?;
        }
        Ok(())
    }

    /// Store a graded result and recompute the tessitura
    fn commit(&mut self, result: NoteResult) {
        let index = self.state.record(result.clone());
        self.emit(SessionEvent::NoteGraded { index, result });

        let best = self.tessitura_analysis().best;
        self.state.set_tessitura(best.clone());
        self.emit(SessionEvent::TessituraUpdated { tessitura: best });
        self.publish_snapshot();
    }

    fn finish(&mut self) {
        self.state.set_status(SessionStatus::Done);
        self.state.set_current_note(None);
        self.frames = None;

        let summary = self.state.tessitura().and_then(RangeSummary::from_segment);
        match &summary {
            Some(range) => log::info!(
                "[SequenceRunner] Session complete: tessitura MIDI {}..={} (median {})",
                range.midi_min,
                range.midi_max,
                range.midi_median
            ),
            None => log::info!("[SequenceRunner] Session complete: no tessitura found"),
        }

        self.emit(SessionEvent::Completed { summary });
        self.publish_snapshot();
    }

    fn halt(&mut self) {
        self.player.stop();
        self.state.halt();
        self.frames = None;
        log::info!(
            "[SequenceRunner] Aborted with {} graded notes",
            self.state.results().len()
        );
        self.emit(SessionEvent::Aborted);
        self.publish_snapshot();
    }

    fn device_failure(&mut self, err: AudioError, context: &str) -> SessionError {
        log_audio_error(&err, context);
        let err = SessionError::from(err);
        self.frames = None;
        self.emit(SessionEvent::Failed {
            code: err.code(),
            message: err.message(),
        });
        self.publish_snapshot();
        err
    }

    /// Sleep on the injected clock, honouring abort before and after
    fn pause(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check_abort()?;
        self.clock.sleep(duration);
        self.check_abort()
    }

    fn check_abort(&self) -> Result<(), Interrupted> {
        if self.abort.is_requested() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.state.snapshot());
    }

    fn publish_frame(&mut self, event: FrameEvent) {
        if let Some(tx) = &self.frames {
            if tx.send(event).is_err() {
                self.frames = None;
            }
        }
    }
}
