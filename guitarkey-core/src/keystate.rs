//! # Key State Machine
//!
//! Converts the per-block note guesses into edge-triggered key events.
//!
//! The machine holds at most one active action. A sustained note activates
//! its action once; a different mapped note releases the old action and
//! activates the new one in the same step; silence or an unmapped note
//! releases whatever is active. There is no timeout: an action stays active
//! until a block says otherwise, or until [`KeyStateMachine::release`] is
//! called on shutdown.
//!
//! Rapid alternation between two notes near a classification boundary
//! produces one release/activate pair per block. No dwell time is applied.

use std::fmt;

use serde::Serialize;

use crate::mapping::ActionMapping;
use crate::Detection;

/// A key transition for the action sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "action", rename_all = "snake_case")]
pub enum KeyEvent {
    /// Key down for the action.
    Activate(String),
    /// Key up for the action.
    Deactivate(String),
}

impl KeyEvent {
    pub fn action(&self) -> &str {
        match self {
            KeyEvent::Activate(action) | KeyEvent::Deactivate(action) => action,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEvent::Activate(action) => write!(f, "activate({})", action),
            KeyEvent::Deactivate(action) => write!(f, "deactivate({})", action),
        }
    }
}

/// Events produced by one step, release first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepEvents {
    pub deactivate: Option<String>,
    pub activate: Option<String>,
}

impl StepEvents {
    pub fn is_empty(&self) -> bool {
        self.deactivate.is_none() && self.activate.is_none()
    }

    /// The events in delivery order.
    pub fn to_events(&self) -> Vec<KeyEvent> {
        self.deactivate
            .iter()
            .map(|a| KeyEvent::Deactivate(a.clone()))
            .chain(self.activate.iter().map(|a| KeyEvent::Activate(a.clone())))
            .collect()
    }
}

/// Tracks the single currently active action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStateMachine {
    active: Option<String>,
}

impl KeyStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently active action, if any.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Advances the machine by one block.
    ///
    /// The state is already updated when the events are returned.
    pub fn step(&mut self, detection: Option<&Detection>, mapping: &ActionMapping) -> StepEvents {
        let target = detection.and_then(|d| mapping.action_for(&d.note_name));

        match target {
            None => StepEvents {
                deactivate: self.active.take(),
                activate: None,
            },
            Some(action) if self.active.as_deref() == Some(action) => StepEvents::default(),
            Some(action) => {
                let previous = self.active.replace(action.to_string());
                StepEvents {
                    deactivate: previous,
                    activate: Some(action.to_string()),
                }
            }
        }
    }

    /// Clears the state, returning the release event for the active action.
    pub fn release(&mut self) -> Option<KeyEvent> {
        self.active.take().map(KeyEvent::Deactivate)
    }
}
