// crates/cineloop-ui/src/modules/mod.rs
//
// Module registry. To add a new panel:
//   1. Create modules/mypanel.rs implementing PlayerModule
//   2. Add `pub mod mypanel;` below
//   3. Add a field and one `ui` call in app.rs

pub mod log_viewer;
pub mod metadata;
pub mod monitor;
pub mod timeline;
pub mod transport;

use std::path::Path;

use cineloop_core::commands::PlayerCommand;
use cineloop_core::media_types::{MediaDescription, TrackInfo};
use cineloop_core::state::{LoopMarkers, PlaybackState, SessionPhase};
use cineloop_core::{MediaEngine, Player};
use egui::Ui;

/// Read-only snapshot of the player handed to every panel each frame.
#[derive(Clone, Copy, Default)]
pub struct PlayerView<'a> {
    pub phase:        SessionPhase,
    pub playback:     PlaybackState,
    pub markers:      LoopMarkers,
    pub displayed_ms: u64,
    pub seekable:     bool,
    pub dragging:     bool,
    pub volume:       f32,
    pub muted:        bool,
    pub path:         Option<&'a Path>,
    pub description:  Option<&'a MediaDescription>,
    pub tracks:       &'a [TrackInfo],
    /// Inline message under the seek field, while it is live.
    pub seek_message: Option<&'a str>,
    /// False when the engine failed to initialise.
    pub engine_ready: bool,
}

impl<'a> PlayerView<'a> {
    pub fn of<E: MediaEngine>(player: &'a Player<E>, tracks: &'a [TrackInfo]) -> Self {
        let sync = player.sync();
        Self {
            phase:        sync.phase(),
            playback:     *sync.playback(),
            markers:      *sync.markers(),
            displayed_ms: sync.displayed_ms(),
            seekable:     sync.is_seekable(),
            dragging:     sync.drag().is_dragging,
            volume:       player.volume(),
            muted:        player.is_muted(),
            path:         player.path(),
            description:  player.description(),
            tracks,
            seek_message: None,
            engine_ready: true,
        }
    }

    /// Every media control is gated on this.
    pub fn has_media(&self) -> bool {
        self.phase.has_media()
    }

    /// The timeline also needs a known duration and a seekable source.
    pub fn timeline_enabled(&self) -> bool {
        self.has_media() && self.seekable && self.playback.duration_ms > 0
    }
}

/// Every panel implements this trait.
/// Modules read the view and emit commands; they never touch the player.
pub trait PlayerModule {
    fn name(&self) -> &str;
    fn ui(&mut self, ui: &mut Ui, view: &PlayerView<'_>, cmd: &mut Vec<PlayerCommand>);
}
