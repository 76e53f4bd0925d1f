// Session module - vocal range assessment workflow
//
// A session plays a reference tone for each note in range, waits for the
// singer, measures pitch frames and grades the note. Once every note is
// graded the tessitura is derived and individual notes may be retried.

pub mod events;
pub mod phase;
pub mod retry;
pub mod runner;
pub mod state;

pub use events::{FrameEvent, FrameEventStream, SessionEvent, SessionReport, SessionSnapshot};
pub use phase::{NotePhase, SessionStatus};
pub use runner::{AbortHandle, RunOutcome, SequenceRunner};
pub use state::SessionState;
