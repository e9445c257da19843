//! Stop-signal guards
//!
//! Both the recorder (single stop key) and the player (abort chord)
//! need the same behavior: watch raw hook events for a reserved
//! pattern, fire a callback exactly once on the first match, and
//! consume the matching event so it is neither recorded nor forwarded
//! to the foreground application. The controller centralizes that so
//! the never-double-count invariant lives in one place.
//!
//! Matchers run on the hook thread; callbacks must be cheap and must
//! not re-enter the controller.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::error;

use mimeo_core::events::EventKind;
use mimeo_core::keys::KeySymbol;

use crate::hook::HookEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardId(u64);

/// Evaluated against every raw, non-synthetic hook event. Returning
/// true consumes the event and fires the guard's callback.
pub trait EventMatcher: Send {
    fn observe(&mut self, event: &HookEvent) -> bool;
}

/// Matches a key-press of one configured symbol. The recorder's stop
/// condition.
pub struct KeyPressMatcher {
    key: KeySymbol,
}

impl KeyPressMatcher {
    pub fn new(key: KeySymbol) -> Self {
        Self { key }
    }
}

impl EventMatcher for KeyPressMatcher {
    fn observe(&mut self, event: &HookEvent) -> bool {
        matches!(&event.kind, EventKind::KeyPress { key } if *key == self.key)
    }
}

/// Matches when both chord keys are held at the same time, tracked
/// across presses and releases. The player's abort condition.
pub struct ChordMatcher {
    first: KeySymbol,
    second: KeySymbol,
    first_held: bool,
    second_held: bool,
}

impl ChordMatcher {
    pub fn new(first: KeySymbol, second: KeySymbol) -> Self {
        Self {
            first,
            second,
            first_held: false,
            second_held: false,
        }
    }
}

impl EventMatcher for ChordMatcher {
    fn observe(&mut self, event: &HookEvent) -> bool {
        match &event.kind {
            EventKind::KeyPress { key } => {
                if *key == self.first {
                    self.first_held = true;
                }
                if *key == self.second {
                    self.second_held = true;
                }
                (*key == self.first || *key == self.second) && self.first_held && self.second_held
            }
            EventKind::KeyRelease { key } => {
                if *key == self.first {
                    self.first_held = false;
                }
                if *key == self.second {
                    self.second_held = false;
                }
                false
            }
            _ => false,
        }
    }
}

struct GuardEntry {
    id: GuardId,
    matcher: Box<dyn EventMatcher>,
    on_match: Option<Box<dyn FnOnce() + Send>>,
}

/// Registry of guard matchers evaluated per raw hook event.
pub struct GuardController {
    entries: Mutex<Vec<GuardEntry>>,
    next_id: AtomicU64,
}

impl GuardController {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(
        &self,
        matcher: impl EventMatcher + 'static,
        on_match: impl FnOnce() + Send + 'static,
    ) -> GuardId {
        let id = GuardId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries.lock().push(GuardEntry {
            id,
            matcher: Box::new(matcher),
            on_match: Some(Box::new(on_match)),
        });
        id
    }

    /// Safe to call with an id that was already removed.
    pub fn unregister(&self, id: GuardId) {
        self.entries.lock().retain(|entry| entry.id != id);
    }

    /// Runs the event past every live matcher. Returns true when the
    /// event matched and must be suppressed. Synthetic events (our own
    /// injections) never match. A panicking matcher is disabled and
    /// logged; the hook keeps delivering.
    pub(crate) fn observe(&self, event: &HookEvent) -> bool {
        if event.synthetic {
            return false;
        }

        let mut fired: Vec<Box<dyn FnOnce() + Send>> = Vec::new();
        let mut suppress = false;
        {
            let mut entries = self.entries.lock();
            for entry in entries.iter_mut() {
                if entry.on_match.is_none() {
                    continue;
                }
                let matched =
                    match panic::catch_unwind(AssertUnwindSafe(|| entry.matcher.observe(event))) {
                        Ok(matched) => matched,
                        Err(_) => {
                            error!("guard matcher {:?} panicked, disabling it", entry.id);
                            entry.on_match = None;
                            false
                        }
                    };
                if matched {
                    if let Some(callback) = entry.on_match.take() {
                        fired.push(callback);
                    }
                    suppress = true;
                }
            }
        }
        for callback in fired {
            callback();
        }
        suppress
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for GuardController {
    fn default() -> Self {
        Self::new()
    }
}
