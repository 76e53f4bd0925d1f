// NotePhase - per-note step of the assessment state machine
//
// Every note in a sequence walks the same path:
// 1. CountIn: silent lead-in (skipped on retries)
// 2. PlayReference: reference tone plus a fixed wait
// 3. WaitOnset: poll input level until the singer starts or the deadline passes
// 4. Measuring: collect pitch frames for the measurement window
// 5. Graded: frames aggregated into a NoteResult

use serde::{Deserialize, Serialize};

/// Observable phase of the note currently being assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePhase {
    CountIn,
    PlayReference,
    WaitOnset,
    Measuring,
    Graded,
}

impl NotePhase {
    /// Phase a note starts in
    ///
    /// Retries go straight to the reference tone.
    pub fn initial(retry: bool) -> Self {
        if retry {
            NotePhase::PlayReference
        } else {
            NotePhase::CountIn
        }
    }

    /// Whether the phase ends the note
    pub fn is_terminal(&self) -> bool {
        matches!(self, NotePhase::Graded)
    }

    /// Get human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            NotePhase::CountIn => "Count-in",
            NotePhase::PlayReference => "Listen",
            NotePhase::WaitOnset => "Sing now",
            NotePhase::Measuring => "Measuring",
            NotePhase::Graded => "Graded",
        }
    }
}

/// Whole-session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session activity; also the state after an abort
    #[default]
    Idle,
    /// Opening capture before the first note
    Initializing,
    /// Working through the note sequence
    Running,
    /// Re-measuring a single note
    Retrying,
    /// Sequence finished and results are final until a retry
    Done,
}

impl SessionStatus {
    /// Whether a sequence or retry currently owns the devices
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::Initializing | SessionStatus::Running | SessionStatus::Retrying
        )
    }
}
