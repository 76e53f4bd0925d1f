// Retry eligibility
//
// A note may be re-measured once per session when it sits inside, or
// immediately beside, the span of strongly-graded notes:
// - Weak or Fail notes strictly between the lowest and highest Strong note
// - the contiguous Weak run just below the lowest Strong note
// - the contiguous Weak run just above the highest Strong note
//
// Fail notes outside the strong span are never eligible, and nothing is
// eligible until at least one note is Strong.

use std::collections::BTreeSet;

use crate::analysis::{Grade, NoteResult};
use crate::error::RetryRejection;

/// MIDI numbers of the notes that may currently be retried
pub fn eligible_notes(results: &[NoteResult], retried: &BTreeSet<i32>) -> BTreeSet<i32> {
    let strong: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, result)| result.grade == Grade::Strong)
        .map(|(index, _)| index)
        .collect();

    let (min, max) = match (strong.first(), strong.last()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => return BTreeSet::new(),
    };

    let inside = results[min..=max]
        .iter()
        .filter(|result| result.grade != Grade::Strong);
    let below = results[..min]
        .iter()
        .rev()
        .take_while(|result| result.grade == Grade::Weak);
    let above = results[max + 1..]
        .iter()
        .take_while(|result| result.grade == Grade::Weak);

    inside
        .chain(below)
        .chain(above)
        .map(|result| result.note.midi)
        .filter(|midi| !retried.contains(midi))
        .collect()
}

/// Validate a retry request
///
/// # Returns
/// * `Ok(index)` - Position of the note in `results`
/// * `Err(RetryRejection)` - Why the request is turned down
///
/// An already-retried note is reported as such even though it is also
/// no longer in the eligible set.
pub fn check(
    results: &[NoteResult],
    retried: &BTreeSet<i32>,
    midi: i32,
) -> Result<usize, RetryRejection> {
    let index = results
        .iter()
        .position(|result| result.note.midi == midi)
        .ok_or(RetryRejection::UnknownNote)?;

    if retried.contains(&midi) {
        return Err(RetryRejection::AlreadyRetried);
    }
    if !eligible_notes(results, retried).contains(&midi) {
        return Err(RetryRejection::NotEligible);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes;

    /// Naturals from C3 upward graded by the letters in `pattern`
    /// (S = Strong, W = Weak, F = Fail)
    fn graded(pattern: &str) -> Vec<NoteResult> {
        notes::generate(48, 84)
            .into_iter()
            .zip(pattern.chars())
            .map(|(note, letter)| {
                let (grade, ratio) = match letter {
                    'S' => (Grade::Strong, 0.9),
                    'W' => (Grade::Weak, 0.3),
                    _ => (Grade::Fail, 0.0),
                };
                NoteResult {
                    note,
                    strong_ratio: ratio,
                    weak_ratio: ratio.max(0.5),
                    grade,
                    frame_count: 20,
                }
            })
            .collect()
    }

    fn midi_of(results: &[NoteResult], indices: &[usize]) -> BTreeSet<i32> {
        indices.iter().map(|&i| results[i].note.midi).collect()
    }

    #[test]
    fn test_interior_and_adjacent_weak_notes_are_eligible() {
        //              0123456789
        let results = graded("FWWSFSSWWF");
        let eligible = eligible_notes(&results, &BTreeSet::new());
        assert_eq!(eligible, midi_of(&results, &[1, 2, 4, 7, 8]));
    }

    #[test]
    fn test_adjacent_run_stops_at_first_non_weak() {
        let results = graded("WFWSSFWF");
        let eligible = eligible_notes(&results, &BTreeSet::new());
        assert_eq!(eligible, midi_of(&results, &[2]));
    }

    #[test]
    fn test_no_strong_notes_means_nothing_eligible() {
        let results = graded("WWFWW");
        assert!(eligible_notes(&results, &BTreeSet::new()).is_empty());
        assert_eq!(
            check(&results, &BTreeSet::new(), results[0].note.midi),
            Err(RetryRejection::NotEligible)
        );
    }

    #[test]
    fn test_single_strong_note() {
        let results = graded("WSW");
        let eligible = eligible_notes(&results, &BTreeSet::new());
        assert_eq!(eligible, midi_of(&results, &[0, 2]));
    }

    #[test]
    fn test_retried_notes_are_excluded() {
        let results = graded("SFS");
        let midi = results[1].note.midi;
        let retried: BTreeSet<i32> = [midi].into_iter().collect();
        assert!(eligible_notes(&results, &retried).is_empty());
    }

    #[test]
    fn test_check_accepts_eligible_note() {
        let results = graded("SFS");
        assert_eq!(
            check(&results, &BTreeSet::new(), results[1].note.midi),
            Ok(1)
        );
    }

    #[test]
    fn test_check_reports_already_retried_first() {
        let results = graded("SFS");
        let midi = results[1].note.midi;
        let retried: BTreeSet<i32> = [midi].into_iter().collect();
        assert_eq!(
            check(&results, &retried, midi),
            Err(RetryRejection::AlreadyRetried)
        );
    }

    #[test]
    fn test_check_rejects_fail_outside_span() {
        let results = graded("FSS");
        assert_eq!(
            check(&results, &BTreeSet::new(), results[0].note.midi),
            Err(RetryRejection::NotEligible)
        );
    }

    #[test]
    fn test_check_rejects_strong_note() {
        let results = graded("SSS");
        assert_eq!(
            check(&results, &BTreeSet::new(), results[1].note.midi),
            Err(RetryRejection::NotEligible)
        );
    }

    #[test]
    fn test_check_rejects_unknown_note() {
        let results = graded("SWS");
        assert_eq!(
            check(&results, &BTreeSet::new(), 13),
            Err(RetryRejection::UnknownNote)
        );
    }
}
