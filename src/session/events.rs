//! Observer-facing session data.
//!
//! Three channels leave the runner:
//! - a `tokio::sync::watch` of [`SessionSnapshot`] (latest state only)
//! - a `tokio::sync::broadcast` of [`SessionEvent`] (lifecycle transitions)
//! - an unbounded `tokio::sync::mpsc` of [`FrameEvent`] (live pitch frames)

use std::collections::BTreeSet;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::analysis::{Frame, NoteResult, RangeSummary, Segment, TessituraAnalysis};
use crate::notes::Note;
use crate::session::phase::{NotePhase, SessionStatus};

/// Buffer size of the lifecycle event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Copy of the session state published after every change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub results: Vec<NoteResult>,
    pub tessitura: Option<Segment>,
    pub retried: BTreeSet<i32>,
    pub current_note: Option<Note>,
}

/// Lifecycle transitions of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        note_count: usize,
    },
    NoteStarted {
        index: usize,
        note: Note,
    },
    PhaseChanged {
        index: usize,
        phase: NotePhase,
    },
    /// The singer never crossed the onset threshold; the note grades with no frames
    OnsetTimeout {
        index: usize,
    },
    NoteGraded {
        index: usize,
        result: NoteResult,
    },
    TessituraUpdated {
        tessitura: Option<Segment>,
    },
    RetryStarted {
        index: usize,
        note: Note,
    },
    Completed {
        summary: Option<RangeSummary>,
    },
    Aborted,
    Failed {
        code: i32,
        message: String,
    },
}

/// One voiced pitch frame, tagged with the note it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub note_index: usize,
    pub frame: Frame,
}

/// Finite stream of frame events for one run
///
/// The stream ends once the run it was subscribed for finishes, aborts or
/// fails. It cannot be restarted; subscribe again before the next run.
pub struct FrameEventStream {
    rx: mpsc::UnboundedReceiver<FrameEvent>,
}

impl FrameEventStream {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<FrameEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Next frame if one is already queued
    pub fn try_next(&mut self) -> Option<FrameEvent> {
        self.rx.try_recv().ok()
    }

    /// Convert into an async stream
    pub fn into_stream(self) -> impl Stream<Item = FrameEvent> + Unpin {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Blocking iteration; must not be driven from inside an async runtime.
impl Iterator for FrameEventStream {
    type Item = FrameEvent;

    fn next(&mut self) -> Option<FrameEvent> {
        self.rx.blocking_recv()
    }
}

/// Final results of a session, suitable for export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub results: Vec<NoteResult>,
    pub tessitura: Option<Segment>,
    pub segments: Vec<Segment>,
    pub summary: Option<RangeSummary>,
    pub retried: BTreeSet<i32>,
}

impl SessionReport {
    pub fn new(
        results: Vec<NoteResult>,
        analysis: TessituraAnalysis,
        retried: BTreeSet<i32>,
    ) -> Self {
        let summary = analysis.best.as_ref().and_then(RangeSummary::from_segment);
        Self {
            results,
            tessitura: analysis.best,
            segments: analysis.segments,
            summary,
            retried,
        }
    }

    /// Pretty JSON for export
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
