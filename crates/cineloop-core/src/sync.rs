// crates/cineloop-core/src/sync.rs
//
// PositionSync: keeps the displayed timeline position consistent with the
// engine's actual position without fighting the user.
//
// Rules:
//   * Ticks poll the engine and overwrite the display, except while a drag
//     is in progress. Then the display belongs to the pointer.
//   * Engine state is never updated ahead of confirmation. A failed command
//     leaves PlaybackState alone and the next tick reconciles. The drag
//     preview readout is the one cosmetic exception.
//   * Loop wrap is edge-triggered: one seek per crossing of the end marker,
//     re-armed only after a tick observes the position back inside.
//   * Nothing marker-related runs while the duration is still 0.
//
// Single-threaded: every method runs on the UI thread. Asynchronous engine
// output arrives through `on_engine_event`.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::config::PlayerConfig;
use crate::engine::MediaSession;
use crate::error::{EngineError, SyncError};
use crate::helpers::time::{format_hms_millis, parse_time_spec};
use crate::media_types::{EngineEvent, MediaDescription};
use crate::observer::{Notifier, SubscriberId, SyncEvent};
use crate::state::{DragState, LoopMarkers, PlaybackState, SessionPhase, StepDirection};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No active session.
    Idle,
    /// A drag owns the display; the engine was not polled.
    Suppressed,
    Refreshed,
    /// The loop end was crossed and a seek to the start was issued.
    Wrapped { to_ms: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectSeek {
    Applied(u64),
    /// Submitted during a drag; issued right after the drag-end seek.
    Deferred(u64),
}

/// One-shot advisory check that a seek actually landed.
#[derive(Clone, Copy, Debug)]
struct PendingVerify {
    target_ms: u64,
    issued:    Instant,
    due:       Instant,
}

pub struct PositionSync {
    playback:      PlaybackState,
    markers:       LoopMarkers,
    drag:          DragState,
    phase:         SessionPhase,
    displayed_ms:  u64,
    fps:           f64,
    seekable:      bool,
    wrap_armed:    bool,
    /// Engine reported end-of-media and has not played since.
    ended:         bool,
    deferred_seek: Option<u64>,
    verify:        Option<PendingVerify>,

    default_fps:         f64,
    min_loop_span_ms:    u64,
    verify_delay:        Duration,
    verify_tolerance_ms: u64,

    events: Notifier<SyncEvent>,
}

impl PositionSync {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            playback:      PlaybackState::default(),
            markers:       LoopMarkers::default(),
            drag:          DragState::default(),
            phase:         SessionPhase::NoMedia,
            displayed_ms:  0,
            fps:           config.default_fps,
            seekable:      true,
            wrap_armed:    true,
            ended:         false,
            deferred_seek: None,
            verify:        None,

            default_fps:         config.default_fps,
            min_loop_span_ms:    config.min_loop_span_ms,
            verify_delay:        config.seek_verify_delay,
            verify_tolerance_ms: config.seek_verify_tolerance_ms,

            events: Notifier::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn playback(&self) -> &PlaybackState { &self.playback }
    pub fn markers(&self) -> &LoopMarkers { &self.markers }
    pub fn drag(&self) -> &DragState { &self.drag }
    pub fn phase(&self) -> SessionPhase { self.phase }
    pub fn displayed_ms(&self) -> u64 { self.displayed_ms }
    pub fn duration_ms(&self) -> u64 { self.playback.duration_ms }
    pub fn is_seekable(&self) -> bool { self.seekable }
    pub fn fps(&self) -> f64 { self.fps }
    pub fn deferred_seek(&self) -> Option<u64> { self.deferred_seek }

    /// Duration of one frame at the current frame-rate estimate.
    pub fn frame_ms(&self) -> u64 {
        (1000.0 / self.fps).round().max(1.0) as u64
    }

    pub fn subscribe(&mut self) -> (SubscriberId, Receiver<SyncEvent>) {
        self.events.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    // ── Session lifecycle ─────────────────────────────────────────────────────

    /// Re-initialise everything for a freshly opened file.
    pub fn begin_session(&mut self) {
        self.playback      = PlaybackState { rate: self.playback.rate, ..Default::default() };
        self.markers       = LoopMarkers::default();
        self.drag.clear();
        self.displayed_ms  = 0;
        self.fps           = self.default_fps;
        self.seekable      = true;
        self.wrap_armed    = true;
        self.ended         = false;
        self.deferred_seek = None;
        self.verify        = None;
        self.set_phase(SessionPhase::Loading);
        self.notify(SyncEvent::Markers(self.markers));
        self.notify_position();
    }

    pub fn end_session(&mut self) {
        if self.drag.is_dragging {
            self.drag.clear();
            self.notify(SyncEvent::Dragging(false));
        }
        self.deferred_seek = None;
        self.verify        = None;
        self.playback.is_playing = false;
        self.set_phase(SessionPhase::Closed);
    }

    /// Record a rate change the engine has accepted.
    pub fn confirm_rate(&mut self, rate: crate::state::PlaybackRate) {
        self.playback.rate = rate;
    }

    // ── Engine input ──────────────────────────────────────────────────────────

    pub fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Parsed(desc) => {
                self.apply_description(&desc);
                self.parse_settled();
            }
            EngineEvent::ParseTimedOut => {
                log::warn!("media parse timed out; waiting for the engine to report a duration");
                self.parse_settled();
            }
            EngineEvent::ParseFailed(msg) => {
                log::warn!("media parse failed: {msg}");
                self.notify(SyncEvent::EngineFault(format!("could not read media info: {msg}")));
                self.parse_settled();
            }
            EngineEvent::EndReached => {
                log::info!("end of media at {}", format_hms_millis(self.playback.position_ms));
                self.ended = true;
            }
            EngineEvent::Error(msg) => {
                log::warn!("engine error: {msg}");
                self.notify(SyncEvent::EngineFault(msg));
            }
        }
    }

    /// Apply parse results: duration, frame rate, seekability.
    pub fn apply_description(&mut self, desc: &MediaDescription) {
        if let Some(fps) = desc.video_fps() {
            self.set_frame_rate(fps);
        }
        self.observe_duration(desc.duration_ms);
        if !desc.seekable {
            self.mark_unseekable();
        }
        self.notify(SyncEvent::Described);
    }

    /// The parse is over one way or another. Media without a duration
    /// (raw streams) still becomes playable; only the duration-gated
    /// operations keep failing with `DurationUnknown`.
    fn parse_settled(&mut self) {
        if self.phase == SessionPhase::Loading {
            self.set_phase(SessionPhase::Ready);
        }
    }

    pub fn set_frame_rate(&mut self, fps: f64) {
        if fps.is_finite() && fps > 0.0 {
            self.fps = fps;
        }
    }

    // ── Timer ─────────────────────────────────────────────────────────────────

    /// Fixed-interval refresh. `now` drives the advisory seek check.
    pub fn on_timer_tick(&mut self, session: &mut dyn MediaSession, now: Instant) -> TickOutcome {
        if !self.phase.is_active() {
            return TickOutcome::Idle;
        }

        let old_duration = self.playback.duration_ms;
        self.observe_duration(session.length_ms());
        let duration = self.playback.duration_ms;

        // Checked before the drag gate so losing seekability also ends a
        // drag in progress.
        if duration > 0 && self.seekable && !session.is_seekable() {
            self.mark_unseekable();
        }
        if self.drag.is_dragging {
            return TickOutcome::Suppressed;
        }

        let raw = session.position_ms();
        let position = if duration > 0 { raw.min(duration) } else { raw };
        let playing = session.is_playing();
        self.playback.position_ms = position;
        self.playback.is_playing  = playing;
        if playing {
            self.ended = false;
        }
        self.reconcile_phase(playing);
        self.check_seek_convergence(position, now);

        if let Some(to_ms) = self.apply_loop_wrap(session, position, now) {
            return TickOutcome::Wrapped { to_ms };
        }

        if self.displayed_ms != position || old_duration != duration {
            self.displayed_ms = position;
            self.notify_position();
        }
        TickOutcome::Refreshed
    }

    fn reconcile_phase(&mut self, playing: bool) {
        let next = match (self.phase, playing) {
            (SessionPhase::Loading, _)     => SessionPhase::Loading,
            (_, true)                      => SessionPhase::Playing,
            (SessionPhase::Playing, false) => SessionPhase::Paused,
            (phase, false)                 => phase,
        };
        self.set_phase(next);
    }

    fn apply_loop_wrap(
        &mut self,
        session:  &mut dyn MediaSession,
        position: u64,
        now:      Instant,
    ) -> Option<u64> {
        if !self.markers.enabled || self.playback.duration_ms == 0 || !self.seekable {
            return None;
        }
        if position < self.markers.end_ms {
            self.wrap_armed = true;
            return None;
        }
        if !self.wrap_armed {
            return None;
        }

        let to_ms = self.markers.start_ms;
        match session.seek_to(to_ms) {
            Ok(()) => {
                log::debug!(
                    "loop wrap {} → {}",
                    format_hms_millis(position),
                    format_hms_millis(to_ms),
                );
                self.wrap_armed           = false;
                self.playback.position_ms = to_ms;
                self.displayed_ms         = to_ms;
                self.verify = Some(PendingVerify {
                    target_ms: to_ms,
                    issued:    now,
                    due:       now + self.verify_delay,
                });
                // The engine stops at end-of-media; a loop spanning the end
                // has to restart it.
                if self.ended {
                    self.ended = false;
                    if let Err(e) = session.play() {
                        self.engine_fault(&e);
                    }
                }
                self.notify(SyncEvent::LoopWrapped { to_ms });
                self.notify_position();
                Some(to_ms)
            }
            Err(e) => {
                // Stay armed so the next tick retries.
                self.engine_fault(&e);
                None
            }
        }
    }

    fn check_seek_convergence(&mut self, position: u64, now: Instant) {
        let Some(v) = self.verify else { return };
        if now < v.due {
            return;
        }
        self.verify = None;

        let drift = if self.playback.is_playing {
            let elapsed = now.saturating_duration_since(v.issued).as_secs_f64() * 1000.0;
            (elapsed * self.playback.rate.as_f64()) as u64
        } else {
            0
        };
        let expected = v.target_ms.saturating_add(drift);
        let off = position.abs_diff(expected);
        if off > self.verify_tolerance_ms {
            log::warn!(
                "seek to {} settled at {} ({off} ms from expected)",
                format_hms_millis(v.target_ms),
                format_hms_millis(position),
            );
        } else {
            log::debug!("seek to {} converged", format_hms_millis(v.target_ms));
        }
    }

    // ── Drag ──────────────────────────────────────────────────────────────────

    pub fn on_drag_start(&mut self) -> Result<(), SyncError> {
        self.require_seekable()?;
        if self.drag.is_dragging {
            return Ok(());
        }
        self.drag = DragState {
            is_dragging:            true,
            pending_seek_target_ms: None,
            was_playing:            self.playback.is_playing,
        };
        self.notify(SyncEvent::Dragging(true));
        Ok(())
    }

    /// Preview only: moves the readout, never the engine.
    pub fn on_drag_move(&mut self, candidate_ms: u64) -> Result<u64, SyncError> {
        if !self.drag.is_dragging {
            return Err(SyncError::NotDragging);
        }
        let ms = self.clamp_to_duration(candidate_ms);
        self.drag.pending_seek_target_ms = Some(ms);
        self.displayed_ms = ms;
        self.notify_position();
        Ok(ms)
    }

    /// Ends the gesture with exactly one seek to the clamped final position.
    /// A second call without a new `on_drag_start` is rejected with
    /// `NotDragging` and seeks nothing.
    pub fn on_drag_end(
        &mut self,
        session:  &mut dyn MediaSession,
        final_ms: u64,
    ) -> Result<u64, SyncError> {
        if !self.drag.is_dragging {
            return Err(SyncError::NotDragging);
        }
        let target = self.clamp_to_duration(final_ms);
        self.drag.clear();
        self.displayed_ms = target;
        self.notify(SyncEvent::Dragging(false));
        self.notify_position();

        let result = self.issue_seek(session, target);

        if let Some(queued) = self.deferred_seek.take() {
            log::debug!("applying direct seek to {} queued during drag", format_hms_millis(queued));
            if queued <= self.playback.duration_ms {
                // Failure is already logged and notified inside issue_seek.
                let _ = self.issue_seek(session, queued);
            }
        }

        result.map(|()| target)
    }

    // ── Direct seek ───────────────────────────────────────────────────────────

    /// Seek to user-entered `SS`, `MM:SS` or `HH:MM:SS`.
    pub fn on_direct_seek_request(
        &mut self,
        session: &mut dyn MediaSession,
        text:    &str,
    ) -> Result<DirectSeek, SyncError> {
        let requested_ms = parse_time_spec(text)?;
        self.require_seekable()?;

        let duration_ms = self.playback.duration_ms;
        if duration_ms == 0 {
            return Err(SyncError::DurationUnknown);
        }
        if requested_ms > duration_ms {
            return Err(SyncError::Range { requested_ms, duration_ms });
        }

        if self.drag.is_dragging {
            self.deferred_seek = Some(requested_ms);
            return Ok(DirectSeek::Deferred(requested_ms));
        }
        self.issue_seek(session, requested_ms)?;
        Ok(DirectSeek::Applied(requested_ms))
    }

    // ── Loop markers ──────────────────────────────────────────────────────────

    /// Capture the engine position as the loop start. A start at or past the
    /// end marker becomes `max(0, end - min_span)`.
    pub fn set_start_marker(&mut self, session: &dyn MediaSession) -> Result<LoopMarkers, SyncError> {
        let duration = self.require_duration()?;
        let pos = session.position_ms().min(duration);
        self.markers.start_ms = if pos >= self.markers.end_ms {
            self.markers.end_ms.saturating_sub(self.min_loop_span_ms)
        } else {
            pos
        };
        self.markers_changed();
        Ok(self.markers)
    }

    /// Capture the engine position as the loop end. An end at or before the
    /// start marker becomes `min(duration, start + min_span)`.
    pub fn set_end_marker(&mut self, session: &dyn MediaSession) -> Result<LoopMarkers, SyncError> {
        let duration = self.require_duration()?;
        let pos = session.position_ms().min(duration);
        self.markers.end_ms = if pos <= self.markers.start_ms {
            self.markers.start_ms.saturating_add(self.min_loop_span_ms).min(duration)
        } else {
            pos
        };
        self.markers_changed();
        Ok(self.markers)
    }

    pub fn reset_markers(&mut self) -> LoopMarkers {
        self.markers = LoopMarkers::full(self.playback.duration_ms, self.markers.enabled);
        self.markers_changed();
        self.markers
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        if self.markers.enabled != enabled {
            self.markers.enabled = enabled;
            self.markers_changed();
        }
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.set_loop_enabled(!self.markers.enabled);
        self.markers.enabled
    }

    fn markers_changed(&mut self) {
        self.wrap_armed = true;
        self.notify(SyncEvent::Markers(self.markers));
    }

    // ── Programmatic seeks ────────────────────────────────────────────────────

    /// Seek on behalf of a transport control (stop, restart at end).
    pub fn seek_to(&mut self, session: &mut dyn MediaSession, ms: u64) -> Result<u64, SyncError> {
        self.require_seekable()?;
        if self.drag.is_dragging {
            return Err(SyncError::DragInProgress);
        }
        let target = self.clamp_to_duration(ms);
        self.issue_seek(session, target)?;
        Ok(target)
    }

    /// The engine reported end-of-media and has not played since.
    pub fn has_ended(&self) -> bool { self.ended }

    // ── Frame stepping ────────────────────────────────────────────────────────

    pub fn step_frame(
        &mut self,
        session:   &mut dyn MediaSession,
        direction: StepDirection,
    ) -> Result<u64, SyncError> {
        self.require_seekable()?;
        if self.drag.is_dragging {
            return Err(SyncError::DragInProgress);
        }
        let frame = self.frame_ms();
        let pos = session.position_ms();
        let target = match direction {
            StepDirection::Forward  => pos.saturating_add(frame),
            StepDirection::Backward => pos.saturating_sub(frame),
        };
        self.seek_to(session, target)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn observe_duration(&mut self, duration_ms: u64) {
        if duration_ms == 0 || duration_ms == self.playback.duration_ms {
            return;
        }
        let first = self.playback.duration_ms == 0;
        self.playback.duration_ms = duration_ms;

        if first || self.markers.end_ms == 0 {
            self.markers = LoopMarkers::full(duration_ms, self.markers.enabled);
        } else {
            self.markers.end_ms = self.markers.end_ms.min(duration_ms);
            if self.markers.start_ms >= self.markers.end_ms {
                self.markers.start_ms = self.markers.end_ms.saturating_sub(self.min_loop_span_ms);
            }
        }
        log::debug!("duration {}", format_hms_millis(duration_ms));
        self.markers_changed();

        if self.phase == SessionPhase::Loading {
            self.set_phase(SessionPhase::Ready);
        }
    }

    fn mark_unseekable(&mut self) {
        if !self.seekable {
            return;
        }
        self.seekable = false;
        self.deferred_seek = None;
        if self.drag.is_dragging {
            self.drag.clear();
            self.notify(SyncEvent::Dragging(false));
        }
        log::warn!("media is not seekable; timeline disabled for this session");
        self.notify(SyncEvent::SeekabilityLost);
    }

    fn issue_seek(&mut self, session: &mut dyn MediaSession, target_ms: u64) -> Result<(), SyncError> {
        match session.seek_to(target_ms) {
            Ok(()) => {
                let now = Instant::now();
                self.wrap_armed = true;
                self.ended      = false;
                self.verify = Some(PendingVerify {
                    target_ms,
                    issued: now,
                    due:    now + self.verify_delay,
                });
                self.notify(SyncEvent::Seeked { target_ms });
                Ok(())
            }
            Err(e) => {
                self.engine_fault(&e);
                Err(e.into())
            }
        }
    }

    fn engine_fault(&mut self, e: &EngineError) {
        log::warn!("{e}");
        self.notify(SyncEvent::EngineFault(e.to_string()));
    }

    fn clamp_to_duration(&self, ms: u64) -> u64 {
        ms.min(self.playback.duration_ms)
    }

    fn require_media(&self) -> Result<(), SyncError> {
        if self.phase.has_media() { Ok(()) } else { Err(SyncError::NoMedia) }
    }

    fn require_seekable(&self) -> Result<(), SyncError> {
        self.require_media()?;
        if self.seekable { Ok(()) } else { Err(SyncError::NotSeekable) }
    }

    fn require_duration(&self) -> Result<u64, SyncError> {
        self.require_media()?;
        match self.playback.duration_ms {
            0 => Err(SyncError::DurationUnknown),
            d => Ok(d),
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            log::debug!("phase {:?} → {:?}", self.phase, phase);
            self.phase = phase;
            self.notify(SyncEvent::Phase(phase));
        }
    }

    fn notify_position(&mut self) {
        self.notify(SyncEvent::Position {
            displayed_ms: self.displayed_ms,
            duration_ms:  self.playback.duration_ms,
        });
    }

    fn notify(&mut self, event: SyncEvent) {
        self.events.notify(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeSession;
    use crate::error::ParseError;
    use crate::media_types::{TrackInfo, TrackKind};

    /// Controller + engine with a loaded, Ready session of `duration` ms.
    fn loaded(duration: u64) -> (PositionSync, FakeSession) {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        let mut session = FakeSession::loaded(duration);
        sync.begin_session();
        sync.on_timer_tick(&mut session, Instant::now());
        assert_eq!(sync.phase(), SessionPhase::Ready);
        (sync, session)
    }

    fn tick(sync: &mut PositionSync, session: &mut FakeSession) -> TickOutcome {
        sync.on_timer_tick(session, Instant::now())
    }

    // ── Ticks ─────────────────────────────────────────────────────────────────

    #[test]
    fn tick_without_session_is_idle() {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        let mut session = FakeSession::loaded(10_000);
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Idle);
    }

    #[test]
    fn tick_mirrors_engine_position() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 12_345;
        session.playing  = true;
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Refreshed);
        assert_eq!(sync.displayed_ms(), 12_345);
        assert_eq!(sync.playback().position_ms, 12_345);
        assert!(sync.playback().is_playing);
        assert_eq!(sync.phase(), SessionPhase::Playing);
    }

    #[test]
    fn ticks_during_drag_never_overwrite_preview() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 1_000;
        session.playing  = true;
        tick(&mut sync, &mut session);

        sync.on_drag_start().unwrap();
        sync.on_drag_move(30_000).unwrap();
        for step in 0..10 {
            session.position = 1_000 + step * 33;
            assert_eq!(tick(&mut sync, &mut session), TickOutcome::Suppressed);
            assert_eq!(sync.displayed_ms(), 30_000);
        }
        sync.on_drag_move(31_500).unwrap();
        tick(&mut sync, &mut session);
        assert_eq!(sync.displayed_ms(), 31_500);
        assert!(session.seeks.is_empty(), "drag moves must not seek");
    }

    #[test]
    fn phase_follows_engine_play_state() {
        let (mut sync, mut session) = loaded(60_000);
        session.playing = true;
        tick(&mut sync, &mut session);
        assert_eq!(sync.phase(), SessionPhase::Playing);
        session.playing = false;
        tick(&mut sync, &mut session);
        assert_eq!(sync.phase(), SessionPhase::Paused);
    }

    #[test]
    fn zero_duration_keeps_loading_and_skips_markers() {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        let mut session = FakeSession::loaded(0);
        sync.begin_session();
        sync.set_loop_enabled(true);
        session.position = 4_000;
        session.playing  = true;
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Refreshed);
        assert_eq!(sync.phase(), SessionPhase::Loading);
        assert!(session.seeks.is_empty());
        assert_eq!(sync.set_start_marker(&session), Err(SyncError::NoMedia));
    }

    #[test]
    fn first_duration_resets_markers_and_readies() {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        let mut session = FakeSession::loaded(0);
        sync.begin_session();
        tick(&mut sync, &mut session);
        session.length = 90_000;
        tick(&mut sync, &mut session);
        assert_eq!(sync.phase(), SessionPhase::Ready);
        assert_eq!((sync.markers().start_ms, sync.markers().end_ms), (0, 90_000));
    }

    #[test]
    fn parse_without_duration_still_readies() {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        let mut session = FakeSession::loaded(0);
        sync.begin_session();
        sync.on_engine_event(EngineEvent::Parsed(MediaDescription {
            duration_ms: 0,
            seekable:    true,
            container:   Some("h264".into()),
            tracks:      Vec::new(),
        }));
        assert_eq!(sync.phase(), SessionPhase::Ready);
        assert_eq!(sync.set_start_marker(&session), Err(SyncError::DurationUnknown));
        assert_eq!(sync.on_direct_seek_request(&mut session, "5"), Err(SyncError::DurationUnknown));

        session.playing = true;
        tick(&mut sync, &mut session);
        assert_eq!(sync.phase(), SessionPhase::Playing);
    }

    #[test]
    fn parse_timeout_readies_the_session() {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        sync.begin_session();
        sync.on_engine_event(EngineEvent::ParseTimedOut);
        assert_eq!(sync.phase(), SessionPhase::Ready);
    }

    #[test]
    fn position_past_reported_length_is_clamped() {
        let (mut sync, mut session) = loaded(10_000);
        session.position = 10_040;
        tick(&mut sync, &mut session);
        assert_eq!(sync.displayed_ms(), 10_000);
    }

    // ── Drag ──────────────────────────────────────────────────────────────────

    #[test]
    fn drag_end_issues_one_clamped_seek() {
        let (mut sync, mut session) = loaded(60_000);
        sync.on_drag_start().unwrap();
        sync.on_drag_move(70_000).unwrap();
        assert_eq!(sync.displayed_ms(), 60_000);
        assert_eq!(sync.on_drag_end(&mut session, 75_000), Ok(60_000));
        assert_eq!(session.seeks, [60_000]);
        assert!(!sync.drag().is_dragging);
        assert_eq!(sync.drag().pending_seek_target_ms, None);
    }

    #[test]
    fn second_drag_end_is_rejected_without_seeking() {
        let (mut sync, mut session) = loaded(60_000);
        sync.on_drag_start().unwrap();
        sync.on_drag_end(&mut session, 5_000).unwrap();
        assert_eq!(sync.on_drag_end(&mut session, 5_000), Err(SyncError::NotDragging));
        assert_eq!(session.seeks, [5_000]);
    }

    #[test]
    fn drag_move_needs_drag_start() {
        let (mut sync, _) = loaded(60_000);
        assert_eq!(sync.on_drag_move(1_000), Err(SyncError::NotDragging));
    }

    #[test]
    fn drag_records_prior_play_state() {
        let (mut sync, mut session) = loaded(60_000);
        session.playing = true;
        tick(&mut sync, &mut session);
        sync.on_drag_start().unwrap();
        assert!(sync.drag().was_playing);
    }

    #[test]
    fn drag_needs_media() {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        assert_eq!(sync.on_drag_start(), Err(SyncError::NoMedia));
    }

    #[test]
    fn failed_drag_seek_leaves_playback_state_alone() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 2_000;
        tick(&mut sync, &mut session);
        session.fail_commands = true;
        sync.on_drag_start().unwrap();
        let err = sync.on_drag_end(&mut session, 40_000).unwrap_err();
        assert!(matches!(err, SyncError::Engine(_)));
        assert_eq!(sync.playback().position_ms, 2_000);
        // The next tick reconciles the cosmetic readout with the engine.
        tick(&mut sync, &mut session);
        assert_eq!(sync.displayed_ms(), 2_000);
    }

    // ── Direct seek ───────────────────────────────────────────────────────────

    #[test]
    fn direct_seek_accepts_all_three_shapes() {
        let (mut sync, mut session) = loaded(4 * 3_600_000);
        assert_eq!(sync.on_direct_seek_request(&mut session, "90"), Ok(DirectSeek::Applied(90_000)));
        assert_eq!(sync.on_direct_seek_request(&mut session, "2:05"), Ok(DirectSeek::Applied(125_000)));
        assert_eq!(sync.on_direct_seek_request(&mut session, "1:02:03"), Ok(DirectSeek::Applied(3_723_000)));
        assert_eq!(session.seeks, [90_000, 125_000, 3_723_000]);
    }

    #[test]
    fn malformed_direct_seek_issues_no_seek() {
        let (mut sync, mut session) = loaded(60_000);
        for bad in ["", "1:2:3:4", "ab", "1:3x", "0.5"] {
            let err = sync.on_direct_seek_request(&mut session, bad).unwrap_err();
            assert!(matches!(err, SyncError::Parse(_)), "{bad:?} → {err:?}");
        }
        assert!(session.seeks.is_empty());
    }

    #[test]
    fn out_of_range_direct_seek_is_rejected() {
        let (mut sync, mut session) = loaded(120_000);
        session.position = 3_000;
        assert_eq!(
            sync.on_direct_seek_request(&mut session, "2:01"),
            Err(SyncError::Range { requested_ms: 121_000, duration_ms: 120_000 })
        );
        assert!(session.seeks.is_empty());
        assert_eq!(session.position, 3_000);
        // The boundary itself is in range.
        assert_eq!(sync.on_direct_seek_request(&mut session, "2:00"), Ok(DirectSeek::Applied(120_000)));
    }

    #[test]
    fn parse_errors_win_over_missing_media() {
        let mut sync = PositionSync::new(&PlayerConfig::default());
        let mut session = FakeSession::default();
        assert_eq!(
            sync.on_direct_seek_request(&mut session, ""),
            Err(SyncError::Parse(ParseError::Empty))
        );
        assert_eq!(sync.on_direct_seek_request(&mut session, "5"), Err(SyncError::NoMedia));
    }

    #[test]
    fn direct_seek_during_drag_runs_after_drag_end() {
        let (mut sync, mut session) = loaded(60_000);
        sync.on_drag_start().unwrap();
        sync.on_drag_move(10_000).unwrap();
        assert_eq!(sync.on_direct_seek_request(&mut session, "45"), Ok(DirectSeek::Deferred(45_000)));
        assert!(session.seeks.is_empty());
        assert_eq!(sync.deferred_seek(), Some(45_000));

        sync.on_drag_end(&mut session, 10_000).unwrap();
        assert_eq!(session.seeks, [10_000, 45_000]);
        assert_eq!(sync.deferred_seek(), None);
    }

    // ── Markers ───────────────────────────────────────────────────────────────

    #[test]
    fn start_marker_at_or_past_end_is_pulled_back() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 20_000;
        sync.set_end_marker(&session).unwrap();
        session.position = 25_000;
        let m = sync.set_start_marker(&session).unwrap();
        assert_eq!((m.start_ms, m.end_ms), (19_000, 20_000));

        session.position = 20_000;
        let m = sync.set_start_marker(&session).unwrap();
        assert_eq!(m.start_ms, 19_000);
    }

    #[test]
    fn start_marker_near_zero_saturates() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 400;
        sync.set_end_marker(&session).unwrap();
        session.position = 900;
        let m = sync.set_start_marker(&session).unwrap();
        assert_eq!((m.start_ms, m.end_ms), (0, 400));
    }

    #[test]
    fn end_marker_at_or_before_start_is_pushed_forward() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 30_000;
        sync.set_start_marker(&session).unwrap();
        session.position = 10_000;
        let m = sync.set_end_marker(&session).unwrap();
        assert_eq!((m.start_ms, m.end_ms), (30_000, 31_000));
    }

    #[test]
    fn end_marker_push_is_capped_at_duration() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 59_500;
        sync.set_start_marker(&session).unwrap();
        session.position = 59_500;
        let m = sync.set_end_marker(&session).unwrap();
        assert_eq!((m.start_ms, m.end_ms), (59_500, 60_000));
        assert!(m.start_ms < m.end_ms);
    }

    #[test]
    fn reset_markers_spans_whole_media() {
        let (mut sync, mut session) = loaded(120_000);
        session.position = 50_000;
        sync.set_start_marker(&session).unwrap();
        let m = sync.reset_markers();
        assert_eq!((m.start_ms, m.end_ms), (0, 120_000));
    }

    #[test]
    fn markers_default_to_zero_before_load() {
        let sync = PositionSync::new(&PlayerConfig::default());
        assert_eq!(*sync.markers(), LoopMarkers::default());
    }

    // ── Loop wrap ─────────────────────────────────────────────────────────────

    fn looping(start: u64, end: u64) -> (PositionSync, FakeSession) {
        let (mut sync, mut session) = loaded(60_000);
        session.position = end;
        sync.set_end_marker(&session).unwrap();
        session.position = start;
        sync.set_start_marker(&session).unwrap();
        sync.set_loop_enabled(true);
        session.seeks.clear();
        (sync, session)
    }

    #[test]
    fn crossing_end_marker_wraps_exactly_once() {
        let (mut sync, mut session) = looping(1_000, 5_000);
        session.playing  = true;
        session.position = 5_000;
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Wrapped { to_ms: 1_000 });
        assert_eq!(session.seeks, [1_000]);
        assert_eq!(sync.displayed_ms(), 1_000);

        session.position = 1_033;
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Refreshed);
        assert_eq!(session.seeks, [1_000]);
    }

    #[test]
    fn lagging_engine_does_not_double_seek() {
        let (mut sync, mut session) = looping(1_000, 5_000);
        session.position = 5_100;
        tick(&mut sync, &mut session);
        // Engine has not converged yet and still reports past the end.
        session.position = 5_130;
        tick(&mut sync, &mut session);
        session.position = 5_160;
        tick(&mut sync, &mut session);
        assert_eq!(session.seeks, [1_000]);

        // Back inside re-arms; the next crossing wraps again.
        session.position = 1_200;
        tick(&mut sync, &mut session);
        session.position = 5_000;
        tick(&mut sync, &mut session);
        assert_eq!(session.seeks, [1_000, 1_000]);
    }

    #[test]
    fn failed_wrap_seek_is_retried() {
        let (mut sync, mut session) = looping(1_000, 5_000);
        session.fail_commands = true;
        session.position = 5_000;
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Refreshed);
        session.fail_commands = false;
        session.position = 5_033;
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Wrapped { to_ms: 1_000 });
    }

    #[test]
    fn disabled_loop_never_wraps() {
        let (mut sync, mut session) = looping(1_000, 5_000);
        sync.set_loop_enabled(false);
        session.position = 9_000;
        tick(&mut sync, &mut session);
        assert!(session.seeks.is_empty());
    }

    #[test]
    fn wrap_after_end_of_media_restarts_playback() {
        let (mut sync, mut session) = loaded(10_000);
        sync.set_loop_enabled(true);
        session.position = 10_000;
        session.playing  = false;
        sync.on_engine_event(EngineEvent::EndReached);
        assert_eq!(tick(&mut sync, &mut session), TickOutcome::Wrapped { to_ms: 0 });
        assert!(session.playing);
    }

    // ── Frame stepping ────────────────────────────────────────────────────────

    #[test]
    fn frame_step_uses_default_fps_until_metadata() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 1_000;
        assert_eq!(sync.step_frame(&mut session, StepDirection::Forward), Ok(1_040));

        sync.on_engine_event(EngineEvent::Parsed(MediaDescription {
            duration_ms: 60_000,
            seekable:    true,
            tracks:      vec![TrackInfo {
                kind:       TrackKind::Video,
                frame_rate: Some((50, 1)),
                ..Default::default()
            }],
            ..Default::default()
        }));
        assert_eq!(sync.frame_ms(), 20);
        assert_eq!(sync.step_frame(&mut session, StepDirection::Backward), Ok(1_020));
    }

    #[test]
    fn frame_step_clamps_to_media() {
        let (mut sync, mut session) = loaded(60_000);
        session.position = 10;
        assert_eq!(sync.step_frame(&mut session, StepDirection::Backward), Ok(0));
        session.position = 59_990;
        assert_eq!(sync.step_frame(&mut session, StepDirection::Forward), Ok(60_000));
    }

    // ── Seekability ───────────────────────────────────────────────────────────

    #[test]
    fn unseekable_media_disables_timeline_for_the_session() {
        let (mut sync, mut session) = loaded(60_000);
        let (_, rx) = sync.subscribe();
        session.seekable = false;
        tick(&mut sync, &mut session);
        assert!(rx.try_iter().any(|e| e == SyncEvent::SeekabilityLost));
        assert_eq!(sync.on_drag_start(), Err(SyncError::NotSeekable));
        assert_eq!(sync.on_direct_seek_request(&mut session, "5"), Err(SyncError::NotSeekable));
        // Does not come back if the engine changes its mind.
        session.seekable = true;
        tick(&mut sync, &mut session);
        assert!(!sync.is_seekable());
    }

    #[test]
    fn losing_seekability_mid_drag_cancels_drag_and_queued_seek() {
        let (mut sync, mut session) = loaded(60_000);
        let (_, rx) = sync.subscribe();
        sync.on_drag_start().unwrap();
        sync.on_drag_move(20_000).unwrap();
        assert_eq!(sync.on_direct_seek_request(&mut session, "45"), Ok(DirectSeek::Deferred(45_000)));

        session.seekable = false;
        tick(&mut sync, &mut session);

        assert!(!sync.drag().is_dragging);
        assert_eq!(sync.deferred_seek(), None);
        let events: Vec<SyncEvent> = rx.try_iter().collect();
        assert!(events.contains(&SyncEvent::Dragging(false)));
        assert!(events.contains(&SyncEvent::SeekabilityLost));
        assert_eq!(sync.on_drag_end(&mut session, 20_000), Err(SyncError::NotDragging));
        assert!(session.seeks.is_empty());
    }

    #[test]
    fn unseekable_parse_result_cancels_drag() {
        let (mut sync, mut session) = loaded(60_000);
        sync.on_drag_start().unwrap();
        sync.on_engine_event(EngineEvent::Parsed(MediaDescription {
            duration_ms: 60_000,
            seekable:    false,
            container:   None,
            tracks:      Vec::new(),
        }));
        assert!(!sync.drag().is_dragging);
        assert!(!sync.is_seekable());
        assert_eq!(sync.on_drag_end(&mut session, 1_000), Err(SyncError::NotDragging));
        assert!(session.seeks.is_empty());
    }

    // ── Observers ─────────────────────────────────────────────────────────────

    #[test]
    fn observers_hear_position_and_wrap() {
        let (mut sync, mut session) = looping(1_000, 5_000);
        let (id, rx) = sync.subscribe();
        session.position = 5_000;
        tick(&mut sync, &mut session);
        let events: Vec<SyncEvent> = rx.try_iter().collect();
        assert!(events.contains(&SyncEvent::LoopWrapped { to_ms: 1_000 }));
        assert!(events.contains(&SyncEvent::Position { displayed_ms: 1_000, duration_ms: 60_000 }));
        assert!(sync.unsubscribe(id));
    }

    #[test]
    fn convergence_check_is_advisory() {
        let (mut sync, mut session) = loaded(60_000);
        sync.on_drag_start().unwrap();
        sync.on_drag_end(&mut session, 10_000).unwrap();
        // Engine lands somewhere else entirely.
        session.position = 20_000;
        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(sync.on_timer_tick(&mut session, later), TickOutcome::Refreshed);
        assert_eq!(sync.playback().position_ms, 20_000);
        assert_eq!(session.seeks, [10_000]);
    }
}
