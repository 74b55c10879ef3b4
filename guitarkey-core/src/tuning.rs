//! # Musical Tuning Module
//!
//! Equal-tempered note naming and nearest-note classification.
//!
//! ## Features
//! - Chromatic note tables for any MIDI range and reference pitch
//! - Note name parsing (`"A4"`, `"C#3"`, `"Db2"`, `"B-1"`) to MIDI numbers
//! - Nearest-note lookup with a deterministic tie-break
//! - Cent deviation calculation for diagnostics
//!
//! Octaves follow MIDI numbering: C4 is middle C and A4 is MIDI note 69.

use once_cell::sync::Lazy;

use crate::config::DEFAULT_REFERENCE_PITCH;
use crate::mapping::ActionMapping;
use crate::Detection;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI number of A4.
pub const A4_MIDI: i32 = 69;

/// Lowest and highest MIDI note that can be named, C-1 to G9.
pub const MIDI_MIN: i32 = 0;
pub const MIDI_MAX: i32 = 127;

/// MIDI range of the default table, C0 to C8.
pub const DEFAULT_LOWEST_MIDI: i32 = 12;
pub const DEFAULT_HIGHEST_MIDI: i32 = 108;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Statically computed table from C0 to C8 at A4 = 440 Hz.
static STANDARD: Lazy<NoteTable> = Lazy::new(|| {
    NoteTable::chromatic(DEFAULT_LOWEST_MIDI, DEFAULT_HIGHEST_MIDI, DEFAULT_REFERENCE_PITCH)
});

/// Canonical name of a MIDI note number, using sharps.
pub fn midi_to_note_name(midi: i32) -> String {
    let pitch_class = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class], octave)
}

/// Parses a note name into its MIDI number.
///
/// Accepts a letter `A`-`G` (either case), an optional `#` or `b`
/// accidental, and an octave number which may be negative. Names outside
/// the MIDI range (C-1 to G9) are rejected.
pub fn note_name_to_midi(name: &str) -> Option<i32> {
    let name = name.trim();
    let mut chars = name.chars();
    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (offset, octave) = if let Some(stripped) = rest.strip_prefix('#') {
        (1, stripped)
    } else if let Some(stripped) = rest.strip_prefix('b') {
        (-1, stripped)
    } else {
        (0, rest)
    };
    let octave: i32 = octave.parse().ok()?;
    let midi = octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(base + offset)?;
    (MIDI_MIN..=MIDI_MAX).contains(&midi).then_some(midi)
}

/// Rewrites a parseable note name into the table spelling (`"db4"` -> `"C#4"`).
pub fn canonical_note_name(name: &str) -> Option<String> {
    note_name_to_midi(name).map(midi_to_note_name)
}

/// Equal-tempered frequency of a MIDI note.
pub fn midi_to_frequency(midi: i32, reference_pitch: f32) -> f32 {
    reference_pitch * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values indicate sharpness, negative values flatness.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Ordered list of reference notes used for classification.
///
/// Iteration order is the order entries were added. Classification ties go
/// to the entry that comes first.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTable {
    notes: Vec<Note>,
}

impl NoteTable {
    /// Builds a chromatic table from `lowest` to `highest` MIDI note, inclusive.
    pub fn chromatic(lowest: i32, highest: i32, reference_pitch: f32) -> Self {
        let notes = (lowest..=highest)
            .map(|midi| Note {
                name: midi_to_note_name(midi),
                frequency: midi_to_frequency(midi, reference_pitch),
            })
            .collect();
        Self { notes }
    }

    /// Builds a table from explicit entries, kept in the given order.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let notes = entries
            .into_iter()
            .map(|(name, frequency)| Note {
                name: name.into(),
                frequency,
            })
            .collect();
        Self { notes }
    }

    /// The shared C0..=C8 table at A4 = 440 Hz.
    pub fn standard() -> &'static NoteTable {
        &STANDARD
    }

    /// Builds a table reaching one octave below the lowest and one octave
    /// above the highest note that has an action in `mapping`.
    ///
    /// The extra octave keeps notes just outside the mapped range from being
    /// snapped onto a mapped edge note. Without any mapped note the default
    /// C0..=C8 range is used. The table never extends past the MIDI range.
    pub fn covering(mapping: &ActionMapping, reference_pitch: f32) -> Self {
        let range = mapping
            .iter()
            .filter_map(|(note, _)| note_name_to_midi(note))
            .fold(None, |acc: Option<(i32, i32)>, midi| match acc {
                Some((lo, hi)) => Some((lo.min(midi), hi.max(midi))),
                None => Some((midi, midi)),
            });
        match range {
            Some((lo, hi)) => Self::chromatic(
                (lo - 12).max(MIDI_MIN),
                (hi + 12).min(MIDI_MAX),
                reference_pitch,
            ),
            None => Self::chromatic(DEFAULT_LOWEST_MIDI, DEFAULT_HIGHEST_MIDI, reference_pitch),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.notes.iter().any(|note| note.name == name)
    }

    /// Reference frequency of `name`, if the table has it.
    pub fn frequency_of(&self, name: &str) -> Option<f32> {
        self.notes.iter().find(|note| note.name == name).map(|note| note.frequency)
    }

    /// Finds the closest note to `freq`.
    ///
    /// Ties resolve to the earlier entry. Returns `None` only for an empty table.
    pub fn find_nearest_note(&self, freq: f32) -> Option<&Note> {
        let mut closest: Option<(&Note, f32)> = None;
        for note in &self.notes {
            let diff = (note.frequency - freq).abs();
            match closest {
                Some((_, best)) if diff >= best => {}
                _ => closest = Some((note, diff)),
            }
        }
        closest.map(|(note, _)| note)
    }

    /// Classifies an estimator result.
    ///
    /// `None` (no signal) and non-positive frequencies stay `None`.
    pub fn classify(&self, frequency: Option<f32>) -> Option<Detection> {
        let frequency = frequency.filter(|f| *f > 0.0)?;
        let note = self.find_nearest_note(frequency)?;
        Some(Detection {
            note_name: note.name.clone(),
            frequency,
            reference_frequency: note.frequency,
            error_hz: frequency - note.frequency,
            cents_deviation: calculate_cents_deviation(frequency, note.frequency),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_reference_values() {
        let table = NoteTable::standard();
        assert_eq!(table.len(), 97);
        assert_eq!(table.iter().next().unwrap().name, "C0");
        assert!((table.frequency_of("A4").unwrap() - 440.0).abs() < 1e-3);
        assert!((table.frequency_of("C4").unwrap() - 261.63).abs() < 0.01);
        assert!((table.frequency_of("C0").unwrap() - 16.35).abs() < 0.01);
        assert!((table.frequency_of("C8").unwrap() - 4186.01).abs() < 0.05);
    }

    #[test]
    fn test_note_name_round_trip_spellings() {
        assert_eq!(note_name_to_midi("A4"), Some(69));
        assert_eq!(note_name_to_midi("C#4"), Some(61));
        assert_eq!(note_name_to_midi("Db4"), Some(61));
        assert_eq!(note_name_to_midi("c-1"), Some(0));
        assert_eq!(note_name_to_midi("B#3"), Some(60));
        assert_eq!(note_name_to_midi("H2"), None);
        assert_eq!(note_name_to_midi("A"), None);
        assert_eq!(canonical_note_name("bb3").as_deref(), Some("A#3"));
        assert_eq!(midi_to_note_name(0), "C-1");
    }

    #[test]
    fn test_out_of_range_names_are_unparseable() {
        assert_eq!(note_name_to_midi("C999999999"), None);
        assert_eq!(note_name_to_midi("C-999999999"), None);
        assert_eq!(note_name_to_midi("C3000000"), None);
        assert_eq!(note_name_to_midi("Cb-1"), None);
        assert_eq!(note_name_to_midi("G#9"), None);
        assert_eq!(note_name_to_midi("G9"), Some(127));
        assert_eq!(canonical_note_name("C999999999"), None);

        let mut mapping = ActionMapping::new();
        mapping.assign("C999999999", "q");
        assert_eq!(mapping.action_for("C999999999"), Some("q"));
    }

    #[test]
    fn test_covering_stays_within_midi_range() {
        let mapping: ActionMapping = [("C-1", "a"), ("G9", "b"), ("C3000000", "c")]
            .into_iter()
            .collect();
        let table = NoteTable::covering(&mapping, 440.0);
        assert_eq!(table.len(), 128);
        assert_eq!(table.iter().next().unwrap().name, "C-1");
        assert_eq!(table.iter().last().unwrap().name, "G9");
    }

    #[test]
    fn test_classify_nearest_and_signed_error() {
        let table = NoteTable::standard();
        let detection = table.classify(Some(445.0)).unwrap();
        assert_eq!(detection.note_name, "A4");
        assert!((detection.error_hz - 5.0).abs() < 1e-3);
        assert!(detection.cents_deviation > 0.0);

        let flat = table.classify(Some(215.0)).unwrap();
        assert_eq!(flat.note_name, "A3");
        assert!(flat.error_hz < 0.0);
    }

    #[test]
    fn test_classify_no_signal() {
        let table = NoteTable::standard();
        assert!(table.classify(None).is_none());
        assert!(table.classify(Some(0.0)).is_none());
        assert!(table.classify(Some(-12.0)).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_entry() {
        let table = NoteTable::from_entries([("X", 100.0), ("Y", 110.0), ("Z", 120.0)]);
        for _ in 0..10 {
            assert_eq!(table.classify(Some(105.0)).unwrap().note_name, "X");
            assert_eq!(table.classify(Some(115.0)).unwrap().note_name, "Y");
        }
        let reversed = NoteTable::from_entries([("Y", 110.0), ("X", 100.0)]);
        assert_eq!(reversed.classify(Some(105.0)).unwrap().note_name, "Y");
    }

    #[test]
    fn test_covering_spans_an_octave_each_side() {
        let mut mapping = ActionMapping::new();
        mapping.assign("A3", "up");
        mapping.assign("C5", "d");
        let table = NoteTable::covering(&mapping, 440.0);
        assert_eq!(table.iter().next().unwrap().name, "A2");
        assert_eq!(table.iter().last().unwrap().name, "C6");
        assert_eq!(table.len(), 12 + 15 + 12 + 1);
    }

    #[test]
    fn test_covering_empty_mapping_uses_default_range() {
        let table = NoteTable::covering(&ActionMapping::new(), 440.0);
        assert_eq!(&table, NoteTable::standard());
    }

    #[test]
    fn test_reference_pitch_shifts_table() {
        let table = NoteTable::chromatic(69, 69, 442.0);
        assert_eq!(table.frequency_of("A4"), Some(442.0));
    }
}
