//! mimeo-core - Shared types for macro capture and replay
//!
//! Normalized key symbols, timestamped input events, and the ordered
//! timeline that constitutes one recorded macro. No OS dependencies;
//! the platform boundary lives in mimeo-engine.

pub mod error;
pub mod events;
pub mod keys;

pub use error::{Error, Result};
pub use events::{EventKind, InputEvent, MouseButton, Timeline};
pub use keys::{KeySymbol, NamedKey, ParseKeyError};

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::events::{EventKind, InputEvent, MouseButton, Timeline};
    pub use crate::keys::{KeySymbol, NamedKey};
}
