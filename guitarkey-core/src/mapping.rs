//! Note-to-action mapping.
//!
//! An [`ActionMapping`] assigns an opaque action identifier (usually a key
//! symbol such as `"left"` or `"x"`) to note names. Missing entries and empty
//! identifiers both mean "no action for this note".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tuning::canonical_note_name;

/// Layout used by the guitar controller this crate grew out of.
const GUITAR_LAYOUT: [(&str, &str); 10] = [
    ("A3", "up"),
    ("C#4", "left"),
    ("D4", "down"),
    ("D#4", "right"),
    ("F4", "x"),
    ("F#4", "w"),
    ("G4", "c"),
    ("A#4", "a"),
    ("B4", "s"),
    ("C5", "d"),
];

/// Maps note names to action identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ActionMapping {
    entries: BTreeMap<String, String>,
}

/// An edit to the mapping, applied by the pipeline between blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingEdit {
    /// Map `note` to `action`. An empty action clears the entry.
    Assign { note: String, action: String },
    /// Remove any action from `note`.
    Clear { note: String },
    /// Swap in a whole new mapping.
    Replace(ActionMapping),
}

fn normalize_note(note: &str) -> String {
    canonical_note_name(note).unwrap_or_else(|| note.trim().to_string())
}

impl ActionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in guitar layout.
    pub fn guitar_default() -> Self {
        GUITAR_LAYOUT.iter().copied().collect()
    }

    /// Action for `note`, or `None` when the note is unmapped or mapped to
    /// an empty identifier.
    pub fn action_for(&self, note: &str) -> Option<&str> {
        self.entries
            .get(note)
            .map(String::as_str)
            .filter(|action| !action.is_empty())
    }

    /// Maps `note` to `action`, replacing any previous entry.
    ///
    /// Parseable note names are stored in table spelling. An empty action
    /// removes the entry.
    pub fn assign(&mut self, note: &str, action: &str) {
        let note = normalize_note(note);
        let action = action.trim();
        if action.is_empty() {
            self.entries.remove(&note);
        } else {
            self.entries.insert(note, action.to_string());
        }
    }

    /// Removes the entry for `note`. Returns the previous action, if any.
    pub fn clear(&mut self, note: &str) -> Option<String> {
        self.entries.remove(&normalize_note(note))
    }

    /// Mapped notes and their actions, in note-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(_, action)| !action.is_empty())
            .map(|(note, action)| (note.as_str(), action.as_str()))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<N: AsRef<str>, A: AsRef<str>> FromIterator<(N, A)> for ActionMapping {
    fn from_iter<I: IntoIterator<Item = (N, A)>>(iter: I) -> Self {
        let mut mapping = ActionMapping::new();
        for (note, action) in iter {
            mapping.assign(note.as_ref(), action.as_ref());
        }
        mapping
    }
}

impl From<BTreeMap<String, String>> for ActionMapping {
    fn from(entries: BTreeMap<String, String>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<ActionMapping> for BTreeMap<String, String> {
    fn from(mapping: ActionMapping) -> Self {
        mapping.entries
    }
}
