//! Error taxonomy shared across the engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The OS denied the global hook, or the capture tap is already
    /// owned by another session in this process. Nothing is left
    /// installed when this is returned.
    #[error("failed to install input hook: {reason}")]
    HookInstall { reason: String },

    /// Persisted macro data could not be read back. Callers may degrade
    /// to an empty timeline instead of failing the whole operation.
    #[error("failed to load macro data: {reason}")]
    TimelineLoad { reason: String },

    /// A single synthetic event failed to apply. Replay skips the event
    /// and continues.
    #[error("failed to inject {what}: {reason}")]
    Injection { what: String, reason: String },

    /// A recording was requested while playback is running, or vice
    /// versa. The caller must retry after the current session ends.
    #[error("a {0} session is already active")]
    AlreadyActive(&'static str),

    /// A second `play` was issued while this player is mid-replay.
    #[error("playback is already in progress on this player")]
    AlreadyPlaying,

    #[error("invalid playback option: {0}")]
    InvalidOption(&'static str),

    #[error("unknown macro: {0}")]
    UnknownMacro(String),

    #[error("macro name already in use: {0}")]
    DuplicateName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
