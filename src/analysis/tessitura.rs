//! Tessitura segmentation.
//!
//! Finds the best contiguous run of strongly-sung notes in a graded result
//! list. A run may bridge up to `max_gaps` consecutive weak notes; bridged
//! notes keep the run contiguous but are not counted in it.

use serde::{Deserialize, Serialize};

use crate::analysis::grading::NoteResult;
use crate::notes::Note;

/// A candidate tessitura region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First strong note of the run
    pub low: Note,
    /// Last strong note of the run
    pub high: Note,
    /// Result-list indices of the strong notes inside the run, ascending
    pub included: Vec<usize>,
    /// MIDI numbers of the included notes, ascending
    pub included_midi: Vec<i32>,
    /// Number of included strong notes
    pub length: usize,
    /// Mean strong ratio over the included notes
    pub avg_strong_ratio: f32,
}

/// Output of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TessituraAnalysis {
    pub best: Option<Segment>,
    pub segments: Vec<Segment>,
}

/// Range summary handed to reporting collaborators once a session completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSummary {
    pub midi_min: i32,
    /// Middle MIDI value, or the mean of the two middle values for even counts
    pub midi_median: f32,
    pub midi_max: i32,
}

impl RangeSummary {
    /// Summarize the notes included in a tessitura segment
    pub fn from_segment(segment: &Segment) -> Option<Self> {
        let midi = &segment.included_midi;
        let (&midi_min, &midi_max) = (midi.first()?, midi.last()?);
        let mid = midi.len() / 2;
        let midi_median = if midi.len() % 2 == 0 {
            (midi[mid - 1] + midi[mid]) as f32 / 2.0
        } else {
            midi[mid] as f32
        };
        Some(Self {
            midi_min,
            midi_median,
            midi_max,
        })
    }
}

/// Scan `results` for strong runs and pick the best one.
///
/// # Arguments
/// * `strong_threshold` - Minimum strong ratio for a note to count as strong
/// * `min_notes` - Minimum strong notes for a run to qualify
/// * `max_gaps` - Consecutive non-strong notes a run may bridge
///
/// The best segment is the longest; ties go to the higher average strong
/// ratio, then to the lower segment.
pub fn analyze(
    results: &[NoteResult],
    strong_threshold: f32,
    min_notes: usize,
    max_gaps: usize,
) -> TessituraAnalysis {
    let strong: Vec<bool> = results
        .iter()
        .map(|result| result.strong_ratio >= strong_threshold)
        .collect();

    let mut segments = Vec::new();
    let mut index = 0;
    while index < strong.len() {
        if !strong[index] {
            index += 1;
            continue;
        }

        let start = index;
        let mut end = index;
        let mut gaps = 0;
        for (offset, &is_strong) in strong.iter().enumerate().skip(start + 1) {
            if is_strong {
                end = offset;
                gaps = 0;
            } else {
                gaps += 1;
                if gaps > max_gaps {
                    break;
                }
            }
        }

        let included: Vec<usize> = (start..=end).filter(|&i| strong[i]).collect();
        if included.len() >= min_notes {
            segments.push(build_segment(results, included));
        }
        index = end + 1;
    }

    let best = segments
        .iter()
        .fold(None::<&Segment>, |best, candidate| match best {
            Some(current) if !outranks(candidate, current) => Some(current),
            _ => Some(candidate),
        })
        .cloned();

    TessituraAnalysis { best, segments }
}

fn build_segment(results: &[NoteResult], included: Vec<usize>) -> Segment {
    let length = included.len();
    let ratio_sum: f32 = included.iter().map(|&i| results[i].strong_ratio).sum();
    Segment {
        low: results[included[0]].note.clone(),
        high: results[included[length - 1]].note.clone(),
        included_midi: included.iter().map(|&i| results[i].note.midi).collect(),
        included,
        length,
        avg_strong_ratio: ratio_sum / length as f32,
    }
}

fn outranks(candidate: &Segment, current: &Segment) -> bool {
    candidate.length > current.length
        || (candidate.length == current.length
            && candidate.avg_strong_ratio > current.avg_strong_ratio)
}
