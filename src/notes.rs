// NoteTable - reference note generation
//
// Builds the ordered list of reference notes an assessment walks through.
// Only natural pitch classes (the white keys) are included, ascending by
// MIDI number, with equal-temperament frequencies relative to A4 = 440 Hz.

use serde::{Deserialize, Serialize};

/// MIDI number of the tuning reference (A4)
pub const A4_MIDI: i32 = 69;

/// Frequency of the tuning reference in Hz
pub const A4_FREQUENCY_HZ: f32 = 440.0;

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A reference note presented to the singer
///
/// Immutable once generated; the MIDI number doubles as the note identifier
/// for retry requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Scientific pitch name, e.g. "C4"
    pub name: String,
    /// MIDI note number (60 = C4)
    pub midi: i32,
    /// Equal-temperament target frequency in Hz
    pub frequency_hz: f32,
}

impl Note {
    /// Build the note for a MIDI number
    pub fn from_midi(midi: i32) -> Self {
        Self {
            name: midi_to_note_name(midi),
            midi,
            frequency_hz: midi_to_frequency(midi),
        }
    }
}

/// Convert a MIDI number to its equal-temperament frequency
pub fn midi_to_frequency(midi: i32) -> f32 {
    let semitones = (midi - A4_MIDI) as f64 / 12.0;
    (A4_FREQUENCY_HZ as f64 * 2f64.powf(semitones)) as f32
}

/// Convert a frequency to a fractional MIDI number
///
/// # Returns
/// * `Some(midi)` - Fractional MIDI position, used for pitch plotting
/// * `None` - Frequency is not positive or not finite
pub fn frequency_to_midi(frequency_hz: f32) -> Option<f32> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    Some(A4_MIDI as f32 + 12.0 * (frequency_hz / A4_FREQUENCY_HZ).log2())
}

/// Scientific pitch name for a MIDI number ("C4", "F#3", ...)
pub fn midi_to_note_name(midi: i32) -> String {
    let class = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", PITCH_CLASS_NAMES[class], octave)
}

/// Name of the note closest to a frequency
pub fn nearest_note_name(frequency_hz: f32) -> Option<String> {
    frequency_to_midi(frequency_hz).map(|midi| midi_to_note_name(midi.round() as i32))
}

/// Whether a MIDI number falls on a natural (non-accidental) pitch class
pub fn is_natural(midi: i32) -> bool {
    !PITCH_CLASS_NAMES[midi.rem_euclid(12) as usize].contains('#')
}

/// Generate the reference note list for an inclusive MIDI range
///
/// Returns an empty list when `midi_low > midi_high`.
pub fn generate(midi_low: i32, midi_high: i32) -> Vec<Note> {
    (midi_low..=midi_high)
        .filter(|&midi| is_natural(midi))
        .map(Note::from_midi)
        .collect()
}
