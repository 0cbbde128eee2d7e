// crates/cineloop-core/src/state.rs
//
// Per-session player data. Plain values owned by `PositionSync`; the UI
// only ever sees them by shared reference.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Positive rational playback speed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackRate {
    num: u32,
    den: u32,
}

impl PlaybackRate {
    pub const NORMAL: Self = Self { num: 1, den: 1 };

    /// The speeds offered by the rate selector.
    pub const PRESETS: [Self; 5] = [
        Self { num: 1, den: 4 },
        Self { num: 1, den: 2 },
        Self::NORMAL,
        Self { num: 2, den: 1 },
        Self { num: 4, den: 1 },
    ];

    /// `None` for a zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        (num > 0 && den > 0).then_some(Self { num, den })
    }

    pub fn num(self) -> u32 { self.num }
    pub fn den(self) -> u32 { self.den }

    pub fn as_f32(self) -> f32 {
        self.num as f32 / self.den as f32
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for PlaybackRate {
    fn default() -> Self { Self::NORMAL }
}

impl fmt::Display for PlaybackRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.num, self.den) {
            (1, 4) => write!(f, "¼×"),
            (1, 2) => write!(f, "½×"),
            (n, 1) => write!(f, "{n}×"),
            (n, d) => write!(f, "{n}/{d}×"),
        }
    }
}

/// Last engine-confirmed playback values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing:  bool,
    pub rate:        PlaybackRate,
}

/// User-defined loop window.
///
/// Once a duration is known `0 <= start_ms < end_ms <= duration_ms`; before
/// that both are 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopMarkers {
    pub start_ms: u64,
    pub end_ms:   u64,
    pub enabled:  bool,
}

impl LoopMarkers {
    /// Markers covering the whole media, preserving `enabled`.
    pub fn full(duration_ms: u64, enabled: bool) -> Self {
        Self { start_ms: 0, end_ms: duration_ms, enabled }
    }
}

/// Transient timeline-drag bookkeeping, emptied when the gesture ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DragState {
    pub is_dragging:            bool,
    pub pending_seek_target_ms: Option<u64>,
    /// Whether the engine was playing when the drag began.
    pub was_playing:            bool,
}

impl DragState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Per-session lifecycle. Dragging is tracked separately in `DragState`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    NoMedia,
    Loading,
    Ready,
    Playing,
    Paused,
    Closed,
}

impl SessionPhase {
    /// A session exists and the timer should be running.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Loading | Self::Ready | Self::Playing | Self::Paused)
    }

    /// Media controls are enabled.
    pub fn has_media(self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepDirection {
    Backward,
    Forward,
}
