// Session error types and constants

use crate::error::{AudioError, ErrorCode};
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session error code constants
///
/// Error code range: 3001-3005
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Capture could not be opened; the session cannot start
    pub const DEVICE_UNAVAILABLE: i32 = 3001;

    /// Another sequence or retry is already active
    pub const ALREADY_RUNNING: i32 = 3002;

    /// Retry request rejected
    pub const RETRY_REJECTED: i32 = 3003;

    /// Configuration failed validation
    pub const INVALID_CONFIG: i32 = 3004;

    /// Session lock was poisoned
    pub const LOCK_POISONED: i32 = 3005;
}

/// Why a retry request was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryRejection {
    /// The note was already re-measured this session
    AlreadyRetried,
    /// The note is outside the retry-eligible set
    NotEligible,
    /// No result exists for the requested note
    UnknownNote,
    /// The session was aborted or never run, so not every note is graded
    SessionIncomplete,
}

impl RetryRejection {
    pub fn describe(&self) -> &'static str {
        match self {
            RetryRejection::AlreadyRetried => "note was already retried",
            RetryRejection::NotEligible => "note is not eligible for retry",
            RetryRejection::UnknownNote => "note is not part of this session",
            RetryRejection::SessionIncomplete => "session has not graded every note",
        }
    }
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SequenceRunner, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session-level errors
///
/// Per-note conditions (no pitch, onset timeout) are never errors; only
/// failures that stop a whole session or reject a request appear here.
///
/// Error code range: 3001-3005
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Capture could not be opened
    DeviceUnavailable { source: AudioError },

    /// A sequence or retry is already active
    AlreadyRunning,

    /// Retry request rejected; no state was changed
    RetryRejected { midi: i32, reason: RetryRejection },

    /// Configuration failed validation
    InvalidConfig { reason: String },

    /// Session lock was poisoned
    LockPoisoned,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::DeviceUnavailable { .. } => SessionErrorCodes::DEVICE_UNAVAILABLE,
            SessionError::AlreadyRunning => SessionErrorCodes::ALREADY_RUNNING,
            SessionError::RetryRejected { .. } => SessionErrorCodes::RETRY_REJECTED,
            SessionError::InvalidConfig { .. } => SessionErrorCodes::INVALID_CONFIG,
            SessionError::LockPoisoned => SessionErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::DeviceUnavailable { source } => {
                format!("Cannot start session: {}", source.message())
            }
            SessionError::AlreadyRunning => {
                "A session is already running. Abort it or wait for it to finish.".to_string()
            }
            SessionError::RetryRejected { midi, reason } => {
                format!("Retry rejected for MIDI {}: {}", midi, reason.describe())
            }
            SessionError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            SessionError::LockPoisoned => "Session lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::DeviceUnavailable { source } => Some(source),
            _ => None,
        }
    }
}

impl From<AudioError> for SessionError {
    fn from(source: AudioError) -> Self {
        SessionError::DeviceUnavailable { source }
    }
}
