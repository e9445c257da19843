//! Input events and the recorded timeline
//!
//! Events carry seconds-since-recording-start timestamps taken from the
//! monotonic clock, so replay fidelity depends only on order and `t`
//! deltas, never on wall-clock time. A timeline serializes as a flat
//! ordered JSON list, one object per event.

use serde::{Deserialize, Serialize};

use crate::keys::KeySymbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

/// A single captured event. `t` is non-decreasing within one timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub t: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Move {
        x: i32,
        y: i32,
    },
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        pressed: bool,
    },
    Scroll {
        x: i32,
        y: i32,
        dx: i32,
        dy: i32,
    },
    KeyPress {
        key: KeySymbol,
    },
    KeyRelease {
        key: KeySymbol,
    },
}

/// The ordered, timestamped record of one macro.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    events: Vec<InputEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. `t` is clamped to the previous event's
    /// timestamp so the non-decreasing invariant holds even under
    /// clock jitter.
    pub fn push(&mut self, t: f64, kind: EventKind) {
        let t = match self.events.last() {
            Some(last) if t < last.t => last.t,
            _ => t,
        };
        self.events.push(InputEvent { t, kind });
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the last event, i.e. the recorded duration.
    pub fn duration(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.t)
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a InputEvent;
    type IntoIter = std::slice::Iter<'a, InputEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
