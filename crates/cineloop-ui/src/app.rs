// src/app.rs (cineloop-ui)
use std::path::PathBuf;
use std::time::{Duration, Instant};

use cineloop_core::commands::PlayerCommand;
use cineloop_core::helpers::time::format_hms;
use cineloop_core::log_service::LogService;
use cineloop_core::media_types::TrackInfo;
use cineloop_core::observer::SyncEvent;
use cineloop_core::state::SessionPhase;
use cineloop_core::sync::DirectSeek;
use cineloop_core::{Player, PlayerConfig, SyncError};
use cineloop_media::FfmpegEngine;
use crossbeam_channel::Receiver;
use eframe::egui;
use rfd::FileDialog;

use crate::modules::{
    PlayerModule,
    PlayerView,
    log_viewer::LogViewer,
    metadata::MetadataModule,
    monitor::MonitorModule,
    timeline::TimelineModule,
    transport::TransportModule,
};
use crate::theme::{configure_style, ACCENT, NOTICE_BG};

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "mkv", "webm", "avi", "mpg", "mpeg", "ts", "m2ts",
    "flv", "wmv", "ogv", "mp3", "m4a", "aac", "flac", "wav", "ogg", "opus",
];

/// How long an engine notice stays in the top bar.
const NOTICE_LIFETIME: Duration = Duration::from_secs(6);
/// Repaint cadence while playing, so video frames are picked up between
/// position ticks.
const PLAYING_REPAINT: Duration = Duration::from_millis(16);

/// A message that clears itself at `until`, or stays until dismissed.
#[derive(Debug, PartialEq)]
struct Notice {
    text:  String,
    until: Option<Instant>,
}

impl Notice {
    fn timed(text: impl Into<String>, lifetime: Duration, now: Instant) -> Self {
        Self { text: text.into(), until: Some(now + lifetime) }
    }

    fn sticky(text: impl Into<String>) -> Self {
        Self { text: text.into(), until: None }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.until.map_or(true, |t| now < t)
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct CineloopApp {
    /// `None` when FFmpeg failed to initialise.
    player:       Option<Player<FfmpegEngine>>,
    config:       PlayerConfig,
    log_service:  LogService,
    sync_events:  Option<Receiver<SyncEvent>>,
    /// Refreshed on phase changes and when the parse lands.
    tracks:       Vec<TrackInfo>,

    monitor:      MonitorModule,
    transport:    TransportModule,
    timeline:     TimelineModule,
    metadata:     MetadataModule,
    log_viewer:   LogViewer,

    /// Commands emitted by modules each frame, processed after the UI pass
    pending_cmds: Vec<PlayerCommand>,
    notice:       Option<Notice>,
    seek_message: Option<Notice>,
}

impl CineloopApp {
    pub fn new(
        cc:          &eframe::CreationContext<'_>,
        config:      PlayerConfig,
        log_service: LogService,
        engine:      Option<FfmpegEngine>,
        initial:     Option<PathBuf>,
    ) -> Self {
        // Pin to dark mode so an OS theme change doesn't replace our visuals.
        cc.egui_ctx.options_mut(|o| {
            o.theme_preference = egui::ThemePreference::Dark;
        });
        configure_style(&cc.egui_ctx);

        let mut player = engine.map(|e| Player::new(e, config.clone()));
        let sync_events = player.as_mut().map(|p| p.sync_mut().subscribe().1);
        let notice = player.is_none()
            .then(|| Notice::sticky("Playback engine unavailable: FFmpeg failed to initialise"));

        let mut pending_cmds = Vec::new();
        if let Some(path) = initial {
            pending_cmds.push(PlayerCommand::OpenFile(path));
        }

        Self {
            player,
            config,
            log_service,
            sync_events,
            tracks:       Vec::new(),
            monitor:      MonitorModule::new(),
            transport:    TransportModule::new(),
            timeline:     TimelineModule::new(),
            metadata:     MetadataModule,
            log_viewer:   LogViewer::new(),
            pending_cmds,
            notice,
            seek_message: None,
        }
    }

    fn process_command(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::OpenDialog => {
                if let Some(path) = FileDialog::new()
                    .add_filter("Media", MEDIA_EXTENSIONS)
                    .add_filter("All files", &["*"])
                    .pick_file()
                {
                    self.open(path);
                }
            }
            PlayerCommand::OpenFile(path) => self.open(path),
            PlayerCommand::ToggleLogViewer => self.log_viewer.toggle(&mut self.log_service),
            PlayerCommand::ExportLog => self.export_log(),
            PlayerCommand::ClearLog => {
                self.log_service.clear();
                self.log_viewer.clear();
            }
            PlayerCommand::DismissNotice => self.notice = None,
            other => self.apply_to_player(other),
        }
    }

    fn apply_to_player(&mut self, cmd: PlayerCommand) {
        let now = Instant::now();
        let Some(player) = self.player.as_mut() else {
            self.notice = Some(Notice::sticky("Playback engine unavailable"));
            return;
        };

        let result: Result<(), SyncError> = match cmd {
            PlayerCommand::CloseMedia => {
                player.close();
                self.monitor.clear();
                self.seek_message = None;
                Ok(())
            }
            PlayerCommand::TogglePlay       => player.toggle_play(),
            PlayerCommand::Stop             => player.stop(),
            PlayerCommand::StepFrame(dir)   => player.step_frame(dir).map(drop),
            PlayerCommand::SetRate(rate)    => player.set_rate(rate),
            PlayerCommand::SetVolume(v)     => { player.set_volume(v); Ok(()) }
            PlayerCommand::ToggleMute       => { player.toggle_mute(); Ok(()) }
            PlayerCommand::DragStart        => player.drag_start(),
            PlayerCommand::DragMove(ms)     => player.drag_move(ms).map(drop),
            PlayerCommand::DragEnd(ms)      => player.drag_end(ms).map(drop),
            PlayerCommand::SubmitSeekText(text) => {
                // Seek-field problems are shown inline, never as a notice.
                self.seek_message = match player.submit_seek_text(&text) {
                    Ok(DirectSeek::Applied(_)) => None,
                    Ok(DirectSeek::Deferred(ms)) => Some(Notice::timed(
                        format!("seeks to {} after the drag", format_hms(ms)),
                        self.config.message_lifetime, now,
                    )),
                    Err(e) => {
                        log::debug!("seek rejected {text:?}: {e}");
                        Some(Notice::timed(e.to_string(), self.config.message_lifetime, now))
                    }
                };
                Ok(())
            }
            PlayerCommand::ToggleLoop       => { player.toggle_loop(); Ok(()) }
            PlayerCommand::SetStartMarker   => player.set_start_marker().map(drop),
            PlayerCommand::SetEndMarker     => player.set_end_marker().map(drop),
            PlayerCommand::ResetMarkers     => { player.reset_markers(); Ok(()) }
            // Handled in process_command.
            PlayerCommand::OpenDialog
            | PlayerCommand::OpenFile(_)
            | PlayerCommand::ToggleLogViewer
            | PlayerCommand::ExportLog
            | PlayerCommand::ClearLog
            | PlayerCommand::DismissNotice => Ok(()),
        };

        if let Err(e) = result {
            self.report(e, now);
        }
    }

    /// Engine failures become a notice; the rest are expected races between
    /// a click and the player state and only go to the log.
    fn report(&mut self, err: SyncError, now: Instant) {
        match err {
            SyncError::Engine(_) | SyncError::NotSeekable => {
                log::warn!("{err}");
                self.notice = Some(Notice::timed(err.to_string(), NOTICE_LIFETIME, now));
            }
            _ => log::debug!("ignored: {err}"),
        }
    }

    fn open(&mut self, path: PathBuf) {
        let Some(player) = self.player.as_mut() else {
            self.notice = Some(Notice::sticky("Playback engine unavailable"));
            return;
        };
        self.monitor.clear();
        self.seek_message = None;
        match player.open(&path) {
            Ok(()) => self.notice = None,
            Err(e) => self.notice = Some(Notice::timed(e.to_string(), NOTICE_LIFETIME, Instant::now())),
        }
        self.tracks = player.tracks();
    }

    fn export_log(&mut self) {
        let Some(dest) = FileDialog::new()
            .set_file_name("cineloop-log.jsonl")
            .add_filter("JSON lines", &["jsonl"])
            .save_file()
        else {
            return;
        };
        let written = self.log_service.export_json_lines()
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(&dest, text).map_err(|e| e.to_string()));
        match written {
            Ok(()) => log::info!("exported {} records to {}", self.log_service.len(), dest.display()),
            Err(e) => {
                log::warn!("export to {} failed: {e}", dest.display());
                self.notice = Some(Notice::timed(format!("Log export failed: {e}"), NOTICE_LIFETIME, Instant::now()));
            }
        }
    }

    /// Engine events, the position tick and the due video frame. Returns the
    /// delay until the next tick and whether observer events changed the view.
    fn poll_player(&mut self, ctx: &egui::Context, now: Instant) -> (Option<Duration>, bool) {
        let Some(player) = self.player.as_mut() else { return (None, false) };
        let next_tick = player.update(now);
        if let Some(frame) = player.session_mut().and_then(|s| s.take_frame()) {
            self.monitor.present(ctx, frame);
        }
        let playing = player.sync().phase() == SessionPhase::Playing;

        let changed = self.drain_sync_events(now);
        let next_tick = if playing {
            next_tick.map(|d| d.min(PLAYING_REPAINT))
        } else {
            next_tick
        };
        (next_tick, changed)
    }

    /// Applies queued observer events; true when any of them changed what
    /// is on screen.
    fn drain_sync_events(&mut self, now: Instant) -> bool {
        let Some(rx) = &self.sync_events else { return false };
        let mut changed = false;
        let mut tracks_dirty = false;
        for event in rx.try_iter() {
            changed = true;
            match sync_effect(event, now) {
                SyncEffect::Redraw => {}
                SyncEffect::Tracks => tracks_dirty = true,
                SyncEffect::Notice(notice) => self.notice = Some(notice),
            }
        }
        if tracks_dirty {
            self.tracks = self.player.as_ref().map(|p| p.tracks()).unwrap_or_default();
        }
        changed
    }

    fn handle_drag_and_drop(&mut self, ctx: &egui::Context) {
        let files = ctx.input(|i| i.raw.dropped_files.clone());
        // One player, one file: the first dropped path wins.
        if let Some(path) = files.into_iter().find_map(|f| f.path) {
            self.pending_cmds.push(PlayerCommand::OpenFile(path));
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (open, log) = ctx.input(|i| {
            (i.modifiers.command && i.key_pressed(egui::Key::O), i.key_pressed(egui::Key::F12))
        });
        if open {
            self.pending_cmds.push(PlayerCommand::OpenDialog);
        }
        if log {
            self.pending_cmds.push(PlayerCommand::ToggleLogViewer);
        }
    }

    /// Drop expired messages; returns when the next one expires.
    fn expire_messages(&mut self, now: Instant) -> Option<Duration> {
        for slot in [&mut self.notice, &mut self.seek_message] {
            if slot.as_ref().is_some_and(|n| !n.is_live(now)) {
                *slot = None;
            }
        }
        [&self.notice, &self.seek_message].into_iter()
            .flatten()
            .filter_map(|n| n.until)
            .map(|t| t.saturating_duration_since(now))
            .min()
    }
}

/// What an observer event does to the UI besides redrawing.
#[derive(Debug, PartialEq)]
enum SyncEffect {
    Redraw,
    Tracks,
    Notice(Notice),
}

fn sync_effect(event: SyncEvent, now: Instant) -> SyncEffect {
    match event {
        SyncEvent::Position { .. }
        | SyncEvent::Markers(_)
        | SyncEvent::Dragging(_)
        | SyncEvent::Seeked { .. }
        | SyncEvent::LoopWrapped { .. } => SyncEffect::Redraw,
        SyncEvent::Phase(_) | SyncEvent::Described => SyncEffect::Tracks,
        SyncEvent::SeekabilityLost => SyncEffect::Notice(Notice::timed(
            "This media cannot be seeked; the timeline is disabled",
            NOTICE_LIFETIME, now,
        )),
        SyncEvent::EngineFault(msg) => SyncEffect::Notice(Notice::timed(msg, NOTICE_LIFETIME, now)),
    }
}

// ── eframe::App ───────────────────────────────────────────────────────────────

impl eframe::App for CineloopApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Stops the timer and deletes the session's temp audio.
        if let Some(player) = self.player.as_mut() {
            player.close();
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.handle_drag_and_drop(ctx);
        self.handle_shortcuts(ctx);
        self.log_service.pump();
        let (next_tick, synced) = self.poll_player(ctx, now);
        let next_expiry  = self.expire_messages(now);

        let mut view = match &self.player {
            Some(player) => PlayerView::of(player, &self.tracks),
            None         => PlayerView { engine_ready: false, ..Default::default() },
        };
        view.seek_message = self.seek_message.as_ref().map(|n| n.text.as_str());

        egui::TopBottomPanel::top("top_panel")
            .exact_height(36.0)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(egui::RichText::new("🎞 Cineloop").strong().size(15.0).color(ACCENT));
                    ui.separator();
                    if ui.add_enabled(view.engine_ready, egui::Button::new("Open…")).clicked() {
                        self.pending_cmds.push(PlayerCommand::OpenDialog);
                    }
                    if ui.selectable_label(self.log_viewer.is_open(), "Log").clicked() {
                        self.pending_cmds.push(PlayerCommand::ToggleLogViewer);
                    }
                    if let Some(notice) = &self.notice {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("✕").clicked() {
                                self.pending_cmds.push(PlayerCommand::DismissNotice);
                            }
                            egui::Frame::new()
                                .fill(NOTICE_BG)
                                .corner_radius(4)
                                .inner_margin(egui::Margin::symmetric(8, 2))
                                .show(ui, |ui| {
                                    ui.label(egui::RichText::new(&notice.text).size(12.0));
                                });
                        });
                    }
                });
            });

        egui::TopBottomPanel::bottom("transport_panel")
            .resizable(false)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                self.timeline.ui(ui, &view, &mut self.pending_cmds);
                self.transport.ui(ui, &view, &mut self.pending_cmds);
            });

        egui::SidePanel::right("info_panel")
            .resizable(true)
            .default_width(240.0)
            .min_width(180.0)
            .show(ctx, |ui| {
                self.metadata.ui(ui, &view, &mut self.pending_cmds);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.monitor.ui(ui, &view, &mut self.pending_cmds);
        });

        self.log_viewer.show(ctx, &self.log_service, &mut self.pending_cmds);

        // ── Process commands emitted by modules this frame ────────────────────
        let cmds: Vec<PlayerCommand> = self.pending_cmds.drain(..).collect();
        let acted = !cmds.is_empty();
        for cmd in cmds {
            self.process_command(cmd);
        }

        if acted || synced {
            ctx.request_repaint();
        } else if let Some(delay) = [next_tick, next_expiry].into_iter().flatten().min() {
            ctx.request_repaint_after(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_notice_expires() {
        let now = Instant::now();
        let n = Notice::timed("bad time", Duration::from_secs(2), now);
        assert!(n.is_live(now));
        assert!(n.is_live(now + Duration::from_millis(1_999)));
        assert!(!n.is_live(now + Duration::from_secs(2)));
    }

    #[test]
    fn timeline_events_only_redraw() {
        let now = Instant::now();
        for event in [
            SyncEvent::Position { displayed_ms: 1_200, duration_ms: 9_000 },
            SyncEvent::Markers(Default::default()),
            SyncEvent::Dragging(true),
            SyncEvent::Seeked { target_ms: 400 },
            SyncEvent::LoopWrapped { to_ms: 0 },
        ] {
            assert_eq!(sync_effect(event, now), SyncEffect::Redraw);
        }
        assert_eq!(sync_effect(SyncEvent::Described, now), SyncEffect::Tracks);
        assert_eq!(sync_effect(SyncEvent::Phase(SessionPhase::Ready), now), SyncEffect::Tracks);
    }

    #[test]
    fn faults_raise_a_timed_notice() {
        let now = Instant::now();
        let SyncEffect::Notice(notice) = sync_effect(SyncEvent::EngineFault("decoder died".into()), now) else {
            panic!("expected a notice");
        };
        assert_eq!(notice.text, "decoder died");
        assert!(!notice.is_live(now + NOTICE_LIFETIME));
        assert!(matches!(sync_effect(SyncEvent::SeekabilityLost, now), SyncEffect::Notice(_)));
    }

    #[test]
    fn sticky_notice_never_expires() {
        let now = Instant::now();
        assert!(Notice::sticky("no engine").is_live(now + Duration::from_secs(3_600)));
    }
}
