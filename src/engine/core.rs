//! EngineHandle: thread-safe front for an assessment session.
//!
//! Wraps a [`SequenceRunner`] behind a mutex so CLI and UI entry points can
//! share one engine. Runs block the calling thread; abort, snapshots and
//! event subscriptions stay available from other threads while a run holds
//! the runner.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, TryLockError};

use tokio::sync::{broadcast, watch};

use crate::analysis::NoteResult;
use crate::config::AppConfig;
use crate::engine::backend::Collaborators;
use crate::error::{log_session_error, SessionError};
use crate::session::{
    retry, AbortHandle, FrameEventStream, RunOutcome, SequenceRunner, SessionEvent, SessionReport,
    SessionSnapshot,
};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// EngineHandle shares one session across threads.
pub struct EngineHandle {
    config: AppConfig,
    runner: Mutex<SequenceRunner>,
    note_count: usize,
    abort: AbortHandle,
    snapshots: watch::Receiver<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl EngineHandle {
    /// Create an engine on the platform's default devices.
    ///
    /// # Errors
    /// `SessionError::InvalidConfig` when the configuration fails validation
    pub fn new(config: AppConfig) -> Result<Self, SessionError> {
        let collaborators = Collaborators::platform(&config.audio);
        Self::with_collaborators(config, collaborators)
    }

    /// Create an engine on injected collaborators (simulation and tests).
    pub fn with_collaborators(
        config: AppConfig,
        collaborators: Collaborators,
    ) -> Result<Self, SessionError> {
        let runner = SequenceRunner::new(config.clone(), collaborators)?;
        Ok(Self {
            config,
            note_count: runner.notes().len(),
            abort: runner.abort_handle(),
            snapshots: runner.subscribe_snapshots(),
            events_tx: runner.event_sender(),
            runner: Mutex::new(runner),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the full note sequence on the calling thread.
    ///
    /// # Errors
    /// * `SessionError::AlreadyRunning` - Another thread holds the session
    /// * `SessionError::DeviceUnavailable` - Capture could not be opened
    pub fn start_session(&self) -> Result<RunOutcome<SessionReport>, SessionError> {
        self.lock_runner("EngineHandle::start_session")?
            .run_sequence()
    }

    /// Re-measure one note of the completed session on the calling thread.
    pub fn retry_note(&self, midi: i32) -> Result<RunOutcome<NoteResult>, SessionError> {
        self.lock_runner("EngineHandle::retry_note")?
            .retry_note(midi)
    }

    /// Request the active run to stop at its next check.
    ///
    /// Ignored while no call holds the session, so a stray request never
    /// cancels a later run.
    pub fn abort(&self) {
        match self.runner.try_lock() {
            Err(TryLockError::WouldBlock) => {
                log::info!("[EngineHandle] Abort requested");
                self.abort.abort();
            }
            _ => log::debug!("[EngineHandle] Abort ignored: no active run"),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Latest published session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// MIDI numbers a retry would currently accept.
    pub fn eligible_retries(&self) -> BTreeSet<i32> {
        let snapshot = self.snapshot();
        if snapshot.results.len() != self.note_count {
            return BTreeSet::new();
        }
        retry::eligible_notes(&snapshot.results, &snapshot.retried)
    }

    /// Frame events for the next run.
    ///
    /// # Errors
    /// `SessionError::AlreadyRunning` while a run is active
    pub fn subscribe_frames(&self) -> Result<FrameEventStream, SessionError> {
        let mut runner = self.lock_runner("EngineHandle::subscribe_frames")?;
        let stream = runner.subscribe_frames();
        self.abort.clear();
        Ok(stream)
    }

    /// Results of the most recent session for export.
    pub fn report(&self) -> Result<SessionReport, SessionError> {
        let runner = self.lock_runner("EngineHandle::report")?;
        let report = runner.report();
        // An abort aimed at this call has nothing to stop
        self.abort.clear();
        Ok(report)
    }

    fn lock_runner(&self, context: &str) -> Result<MutexGuard<'_, SequenceRunner>, SessionError> {
        self.runner.try_lock().map_err(|err| {
            let err = match err {
                TryLockError::WouldBlock => SessionError::AlreadyRunning,
                TryLockError::Poisoned(_) => SessionError::LockPoisoned,
            };
            log_session_error(&err, context);
            err
        })
    }
}
