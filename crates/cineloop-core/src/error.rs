// crates/cineloop-core/src/error.rs
//
// Error taxonomy for the player. Nothing here is fatal: every variant is
// recovered at the boundary where it occurs (inline message, notification,
// or a log line).

use thiserror::Error;

use crate::helpers::time::format_hms;

/// User-entered seek text did not match `SS`, `MM:SS` or `HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("enter a time as SS, MM:SS or HH:MM:SS")]
    Empty,
    #[error("too many parts ({parts}); the longest form is HH:MM:SS")]
    TooManyParts { parts: usize },
    #[error("'{part}' is not a whole number")]
    NotANumber { part: String },
    #[error("time value is too large")]
    Overflow,
}

/// The media engine reported a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("playback engine unavailable: {0}")]
    Init(String),
    #[error("cannot open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("{op} failed: {reason}")]
    Command { op: &'static str, reason: String },
    #[error("no media session")]
    NoSession,
    #[error("{0} is not supported for this media")]
    Unsupported(&'static str),
}

impl EngineError {
    pub fn command(op: &'static str, reason: impl ToString) -> Self {
        Self::Command { op, reason: reason.to_string() }
    }
}

/// Failure of a position-sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{} is outside 00:00:00 – {}", format_hms(*.requested_ms), format_hms(*.duration_ms))]
    Range { requested_ms: u64, duration_ms: u64 },
    #[error("this media cannot be seeked")]
    NotSeekable,
    #[error("no media loaded")]
    NoMedia,
    #[error("media duration is not known yet")]
    DurationUnknown,
    #[error("no timeline drag in progress")]
    NotDragging,
    #[error("timeline drag in progress")]
    DragInProgress,
    #[error(transparent)]
    Engine(#[from] EngineError),
}
