// Error types for the vocal range trainer
//
// This module defines custom error types for capture/playback devices and
// assessment sessions, providing structured error handling with numeric
// codes that observers can report without parsing messages.

mod audio;
mod session;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use session::{log_session_error, RetryRejection, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting to observers.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
