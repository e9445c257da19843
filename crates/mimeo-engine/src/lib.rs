//! mimeo-engine - Macro capture and replay
//!
//! The engine owns the process-global input hook and everything built
//! on top of it: the guard controller that turns reserved keys into
//! stop signals, the recorder that captures a timestamped timeline,
//! the player that re-injects it with repeat/speed/scale controls, and
//! the store that persists named macros.
//!
//! ## Platform Support
//!
//! Capture and injection go through one rdev-backed hook thread.
//! Wayland compositors without a global input protocol are not
//! supported; X11, Windows, and macOS are.

pub mod guard;
pub mod hook;
pub mod inject;
pub mod keymap;
pub mod player;
pub mod recorder;
pub mod storage;

pub use guard::{ChordMatcher, EventMatcher, GuardController, GuardId, KeyPressMatcher};
pub use hook::{CaptureTap, Dispatcher, HookEvent, Verdict};
pub use inject::{Injector, RdevInjector};
pub use player::{PlayOptions, Player, PlayerEvent, DEFAULT_ABORT_CHORD};
pub use recorder::{Recorder, RecorderEvent, SessionId};
pub use storage::{MacroId, MacroStore};

pub mod prelude {
    pub use crate::guard::{ChordMatcher, GuardController, KeyPressMatcher};
    pub use crate::hook::Dispatcher;
    pub use crate::inject::{Injector, RdevInjector};
    pub use crate::player::{PlayOptions, Player, PlayerEvent};
    pub use crate::recorder::{Recorder, RecorderEvent};
    pub use crate::storage::MacroStore;
    pub use mimeo_core::prelude::*;
}
