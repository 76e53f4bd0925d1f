// Vocal Range Trainer Core - pitch-matching assessment engine
// Plays reference notes, grades the sung pitch and derives the tessitura

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod notes;
pub mod session;
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::EngineHandle;
pub use error::{AudioError, ErrorCode, SessionError};
pub use session::{RunOutcome, SequenceRunner, SessionEvent, SessionReport, SessionSnapshot};

/// Install the global tracing subscriber.
///
/// Output goes to stderr and `log` records are forwarded too. Calling this
/// more than once is harmless.
pub fn init_logging(level: tracing::Level) {
    if tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
    {
        log::debug!("[Logging] Initialized at {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(tracing::Level::DEBUG);
        init_logging(tracing::Level::INFO);
    }
}
