// crates/cineloop-core/src/commands.rs
//
// Every user action in Cineloop is expressed as a PlayerCommand.
// Modules emit these; app.rs processes them after the UI pass.
// Adding a new control = add a variant here + one match arm in app.rs.

use std::path::PathBuf;

use crate::state::{PlaybackRate, StepDirection};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    // ── Media ────────────────────────────────────────────────────────────────
    /// Show the native file picker; the chosen path becomes `OpenFile`.
    OpenDialog,
    OpenFile(PathBuf),
    CloseMedia,

    // ── Transport ────────────────────────────────────────────────────────────
    TogglePlay,
    Stop,
    StepFrame(StepDirection),
    SetRate(PlaybackRate),
    /// Linear gain 0.0–1.0.
    SetVolume(f32),
    ToggleMute,

    // ── Timeline ─────────────────────────────────────────────────────────────
    /// Emitted once when the pointer goes down on the slider.
    DragStart,
    DragMove(u64),
    DragEnd(u64),
    /// Raw text from the seek field; parsed by PositionSync.
    SubmitSeekText(String),

    // ── Loop ─────────────────────────────────────────────────────────────────
    ToggleLoop,
    SetStartMarker,
    SetEndMarker,
    ResetMarkers,

    // ── Log viewer ───────────────────────────────────────────────────────────
    ToggleLogViewer,
    /// Save the buffered log as JSON lines via a save dialog.
    ExportLog,
    ClearLog,

    // ── View / UI ────────────────────────────────────────────────────────────
    DismissNotice,
}
