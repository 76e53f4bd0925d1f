// Analysis module - pitch estimation, grading and range segmentation
//
// Pure computations shared by the sequence runner and the CLI tooling.
// Nothing here touches devices, clocks or channels.
//
// Pipeline per note:
// - pitch: block of samples -> fundamental frequency (or no pitch)
// - grading: voiced frames -> strong/weak ratios -> Grade
// - tessitura: graded result list -> best contiguous strong segment

pub mod grading;
pub mod pitch;
pub mod tessitura;

pub use grading::{
    cents_deviation, classify, grade, Frame, FrameClass, Grade, GradingThresholds, NoteResult,
};
pub use pitch::{estimate, estimate_with_floor, rms, PitchEstimate, NO_PITCH};
pub use tessitura::{analyze, RangeSummary, Segment, TessituraAnalysis};
