// SessionState - mutable record of one assessment session
//
// Owned exclusively by the SequenceRunner. Observers never see it directly;
// they receive SessionSnapshot copies published after every change.

use std::collections::BTreeSet;

use crate::analysis::{NoteResult, Segment};
use crate::notes::Note;
use crate::session::events::SessionSnapshot;
use crate::session::phase::SessionStatus;

/// Results, retry bookkeeping and tessitura for the current session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    status: SessionStatus,
    /// Graded results in the order notes were assessed
    results: Vec<NoteResult>,
    /// MIDI numbers re-measured this session
    retried: BTreeSet<i32>,
    current_note: Option<Note>,
    tessitura: Option<Segment>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything from a previous session and start initializing
    pub fn begin(&mut self) {
        *self = Self {
            status: SessionStatus::Initializing,
            ..Self::default()
        };
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn results(&self) -> &[NoteResult] {
        &self.results
    }

    pub fn retried(&self) -> &BTreeSet<i32> {
        &self.retried
    }

    pub fn current_note(&self) -> Option<&Note> {
        self.current_note.as_ref()
    }

    pub fn tessitura(&self) -> Option<&Segment> {
        self.tessitura.as_ref()
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub(crate) fn set_current_note(&mut self, note: Option<Note>) {
        self.current_note = note;
    }

    pub(crate) fn set_tessitura(&mut self, tessitura: Option<Segment>) {
        self.tessitura = tessitura;
    }

    /// Store a graded result
    ///
    /// A result for a note already in the list replaces it in place (retry
    /// pass); otherwise it is appended (first pass).
    ///
    /// # Returns
    /// Index of the stored result
    pub(crate) fn record(&mut self, result: NoteResult) -> usize {
        match self
            .results
            .iter()
            .position(|existing| existing.note.midi == result.note.midi)
        {
            Some(index) => {
                self.results[index] = result;
                index
            }
            None => {
                self.results.push(result);
                self.results.len() - 1
            }
        }
    }

    pub(crate) fn mark_retried(&mut self, midi: i32) {
        self.retried.insert(midi);
    }

    /// Return to Idle after an abort or a device failure
    ///
    /// Results graded so far are kept.
    pub(crate) fn halt(&mut self) {
        self.status = SessionStatus::Idle;
        self.current_note = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            results: self.results.clone(),
            tessitura: self.tessitura.clone(),
            retried: self.retried.clone(),
            current_note: self.current_note.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Grade;

    fn result(midi: i32, grade: Grade) -> NoteResult {
        NoteResult {
            note: Note::from_midi(midi),
            strong_ratio: 0.5,
            weak_ratio: 0.5,
            grade,
            frame_count: 8,
        }
    }

    #[test]
    fn test_record_appends_then_replaces() {
        let mut state = SessionState::new();
        assert_eq!(state.record(result(60, Grade::Fail)), 0);
        assert_eq!(state.record(result(62, Grade::Strong)), 1);
        assert_eq!(state.record(result(60, Grade::Weak)), 0);
        assert_eq!(state.results().len(), 2);
        assert_eq!(state.results()[0].grade, Grade::Weak);
        assert_eq!(state.results()[1].note.midi, 62);
    }

    #[test]
    fn test_begin_discards_previous_session() {
        let mut state = SessionState::new();
        state.record(result(60, Grade::Strong));
        state.mark_retried(60);
        state.set_status(SessionStatus::Done);

        state.begin();
        assert_eq!(state.status(), SessionStatus::Initializing);
        assert!(state.results().is_empty());
        assert!(state.retried().is_empty());
    }

    #[test]
    fn test_halt_keeps_results() {
        let mut state = SessionState::new();
        state.set_status(SessionStatus::Running);
        state.set_current_note(Some(Note::from_midi(64)));
        state.record(result(62, Grade::Strong));

        state.halt();
        assert_eq!(state.status(), SessionStatus::Idle);
        assert!(state.current_note().is_none());
        assert_eq!(state.results().len(), 1);
    }

    #[test]
    fn test_snapshot_copies_state() {
        let mut state = SessionState::new();
        state.record(result(60, Grade::Strong));
        state.mark_retried(60);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.results.len(), 1);
        assert!(snapshot.retried.contains(&60));
        assert_eq!(snapshot.status, SessionStatus::Idle);
    }
}
