// Audio device error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for device error codes reported to observers.
///
/// Error code range: 1001-1006
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1001;

    /// No input device available
    pub const NO_INPUT_DEVICE: i32 = 1002;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// No output device available for reference tones
    pub const NO_OUTPUT_DEVICE: i32 = 1004;

    /// Reference tone playback failed
    pub const PLAYBACK_FAILED: i32 = 1005;

    /// Capture handle used after it was closed
    pub const NOT_OPEN: i32 = 1006;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioDevice, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Capture and playback device errors
///
/// Any of these raised while opening capture makes a session unable to
/// start; none of them is ever attributed to a single note.
///
/// Error code range: 1001-1006
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Microphone permission denied
    PermissionDenied,

    /// No input device available
    NoInputDevice,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// No output device available
    NoOutputDevice,

    /// Reference tone playback failed
    PlaybackFailed { reason: String },

    /// Capture handle used after close
    NotOpen,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::NoInputDevice => AudioErrorCodes::NO_INPUT_DEVICE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::NoOutputDevice => AudioErrorCodes::NO_OUTPUT_DEVICE,
            AudioError::PlaybackFailed { .. } => AudioErrorCodes::PLAYBACK_FAILED,
            AudioError::NotOpen => AudioErrorCodes::NOT_OPEN,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::PermissionDenied => "Microphone permission denied".to_string(),
            AudioError::NoInputDevice => "No audio input device found".to_string(),
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::NoOutputDevice => "No audio output device found".to_string(),
            AudioError::PlaybackFailed { reason } => {
                format!("Reference tone playback failed: {}", reason)
            }
            AudioError::NotOpen => "Capture handle is not open".to_string(),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}
