// crates/cineloop-core/src/player.rs
//
// Player: owns the engine, the (at most one) open session, the position
// controller and the refresh timer. The UI calls `update` once per frame and
// routes PlayerCommands into the methods below.
//
// Session lifecycle:
//   open   → previous session closed first, then engine.open, parse
//            requested, controller reset, timer started
//   update → engine events drained, controller ticked when the timer is due
//   close  → timer stopped BEFORE the session is released, so no tick can
//            observe a half-closed session

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::PlayerConfig;
use crate::engine::{MediaEngine, MediaSession};
use crate::error::{EngineError, SyncError};
use crate::media_types::{EngineEvent, MediaDescription, TrackInfo};
use crate::state::{LoopMarkers, PlaybackRate, StepDirection};
use crate::sync::{DirectSeek, PositionSync, TickOutcome};

/// Fixed-interval schedule polled from the frame loop.
#[derive(Debug)]
struct TickTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl TickTimer {
    fn new(interval: Duration) -> Self {
        Self { interval, next_due: None }
    }

    fn start(&mut self, now: Instant) { self.next_due = Some(now); }
    fn stop(&mut self) { self.next_due = None; }

    /// True once per elapsed interval. A stalled frame loop skips missed
    /// ticks rather than bursting them.
    fn fire(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                let mut next = due + self.interval;
                if next <= now {
                    next = now + self.interval;
                }
                self.next_due = Some(next);
                true
            }
            _ => false,
        }
    }

    fn until_next(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}

pub struct Player<E: MediaEngine> {
    engine:      E,
    session:     Option<E::Session>,
    sync:        PositionSync,
    config:      PlayerConfig,
    timer:       TickTimer,
    path:        Option<PathBuf>,
    description: Option<MediaDescription>,
    volume:      f32,
    muted:       bool,
}

impl<E: MediaEngine> Player<E> {
    pub fn new(engine: E, config: PlayerConfig) -> Self {
        Self {
            engine,
            session:     None,
            sync:        PositionSync::new(&config),
            timer:       TickTimer::new(config.tick_interval),
            config,
            path:        None,
            description: None,
            volume:      1.0,
            muted:       false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn sync(&self) -> &PositionSync { &self.sync }
    pub fn sync_mut(&mut self) -> &mut PositionSync { &mut self.sync }
    pub fn config(&self) -> &PlayerConfig { &self.config }
    pub fn engine(&self) -> &E { &self.engine }
    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }
    pub fn description(&self) -> Option<&MediaDescription> { self.description.as_ref() }
    pub fn volume(&self) -> f32 { self.volume }
    pub fn is_muted(&self) -> bool { self.muted }
    pub fn has_session(&self) -> bool { self.session.is_some() }
    pub fn session(&self) -> Option<&E::Session> { self.session.as_ref() }
    pub fn session_mut(&mut self) -> Option<&mut E::Session> { self.session.as_mut() }

    /// Track list from the parse result, or straight from the session while
    /// the parse is still pending.
    pub fn tracks(&self) -> Vec<TrackInfo> {
        match (&self.description, &self.session) {
            (Some(desc), _)    => desc.tracks.clone(),
            (None, Some(s))    => s.tracks(),
            (None, None)       => Vec::new(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    pub fn open(&mut self, path: &Path) -> Result<(), EngineError> {
        self.close();

        let mut session = match self.engine.open(path) {
            Ok(s) => s,
            Err(e) => {
                log::error!("{e}");
                return Err(e);
            }
        };
        session.set_volume(self.volume);
        session.set_muted(self.muted);
        session.request_parse(self.config.parse_timeout);

        log::info!("opened {}", path.display());
        self.session = Some(session);
        self.path    = Some(path.to_path_buf());
        self.sync.begin_session();
        self.timer.start(Instant::now());
        Ok(())
    }

    pub fn close(&mut self) {
        self.timer.stop();
        if let Some(mut session) = self.session.take() {
            session.close();
            self.sync.end_session();
            if let Some(path) = self.path.take() {
                log::info!("closed {}", path.display());
            }
        }
        self.description = None;
    }

    // ── Frame loop ────────────────────────────────────────────────────────────

    /// Drain engine events and tick the controller if the timer is due.
    /// Returns how long until the next tick, for `request_repaint_after`.
    pub fn update(&mut self, now: Instant) -> Option<Duration> {
        if self.session.is_none() {
            return None;
        }
        self.pump_events();
        if self.timer.fire(now) {
            self.tick(now);
        }
        self.timer.until_next(now)
    }

    /// Drain events and tick immediately, regardless of the timer.
    pub fn refresh(&mut self, now: Instant) -> TickOutcome {
        self.pump_events();
        self.tick(now)
    }

    fn pump_events(&mut self) {
        let Some(session) = self.session.as_mut() else { return };
        while let Some(event) = session.poll_event() {
            if let EngineEvent::Parsed(desc) = &event {
                self.description = Some(desc.clone());
            }
            self.sync.on_engine_event(event);
        }
    }

    fn tick(&mut self, now: Instant) -> TickOutcome {
        match self.session.as_mut() {
            Some(session) => self.sync.on_timer_tick(session, now),
            None          => TickOutcome::Idle,
        }
    }

    // ── Transport ─────────────────────────────────────────────────────────────

    /// Pause if playing, otherwise play. Playing from the very end restarts
    /// at zero.
    pub fn toggle_play(&mut self) -> Result<(), SyncError> {
        if !self.sync.phase().has_media() {
            return Err(SyncError::NoMedia);
        }
        let session = self.session.as_mut().ok_or(SyncError::NoMedia)?;
        if session.is_playing() {
            session.pause()?;
            return Ok(());
        }
        let duration = self.sync.duration_ms();
        let at_end = self.sync.has_ended()
            || (duration > 0 && session.position_ms() >= duration);
        if at_end && self.sync.is_seekable() {
            self.sync.seek_to(&mut *session, 0)?;
        }
        session.play()?;
        Ok(())
    }

    /// Pause and rewind to zero.
    pub fn stop(&mut self) -> Result<(), SyncError> {
        if !self.sync.phase().has_media() {
            return Err(SyncError::NoMedia);
        }
        let session = self.session.as_mut().ok_or(SyncError::NoMedia)?;
        session.pause()?;
        if self.sync.is_seekable() {
            self.sync.seek_to(&mut *session, 0)?;
        }
        Ok(())
    }

    pub fn set_rate(&mut self, rate: PlaybackRate) -> Result<(), SyncError> {
        let session = self.session.as_mut().ok_or(SyncError::NoMedia)?;
        session.set_rate(rate)?;
        self.sync.confirm_rate(rate);
        log::debug!("rate {rate}");
        Ok(())
    }

    /// Clamped to 0.0–1.0; remembered across sessions.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(session) = self.session.as_mut() {
            session.set_volume(self.volume);
        }
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        if let Some(session) = self.session.as_mut() {
            session.set_muted(self.muted);
        }
        self.muted
    }

    pub fn step_frame(&mut self, direction: StepDirection) -> Result<u64, SyncError> {
        let session = self.session.as_mut().ok_or(SyncError::NoMedia)?;
        self.sync.step_frame(session, direction)
    }

    // ── Timeline ──────────────────────────────────────────────────────────────

    pub fn drag_start(&mut self) -> Result<(), SyncError> {
        self.sync.on_drag_start()
    }

    pub fn drag_move(&mut self, ms: u64) -> Result<u64, SyncError> {
        self.sync.on_drag_move(ms)
    }

    pub fn drag_end(&mut self, ms: u64) -> Result<u64, SyncError> {
        let session = self.session.as_mut().ok_or(SyncError::NoMedia)?;
        self.sync.on_drag_end(session, ms)
    }

    pub fn submit_seek_text(&mut self, text: &str) -> Result<DirectSeek, SyncError> {
        match self.session.as_mut() {
            Some(session) => self.sync.on_direct_seek_request(session, text),
            None => {
                // Still report malformed input before the missing media.
                crate::helpers::time::parse_time_spec(text)?;
                Err(SyncError::NoMedia)
            }
        }
    }

    // ── Loop ──────────────────────────────────────────────────────────────────

    pub fn set_start_marker(&mut self) -> Result<LoopMarkers, SyncError> {
        let session = self.session.as_ref().ok_or(SyncError::NoMedia)?;
        self.sync.set_start_marker(session)
    }

    pub fn set_end_marker(&mut self) -> Result<LoopMarkers, SyncError> {
        let session = self.session.as_ref().ok_or(SyncError::NoMedia)?;
        self.sync.set_end_marker(session)
    }

    pub fn reset_markers(&mut self) -> LoopMarkers {
        self.sync.reset_markers()
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.sync.toggle_loop()
    }
}

impl<E: MediaEngine> Drop for Player<E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeEngine, FakeSession};
    use crate::state::SessionPhase;

    fn opened(length: u64) -> Player<FakeEngine> {
        let mut p = Player::new(FakeEngine::new(length), PlayerConfig::default());
        p.open(Path::new("clip.mp4")).unwrap();
        p.refresh(Instant::now());
        p
    }

    fn session(p: &mut Player<FakeEngine>) -> &mut FakeSession {
        p.session_mut().unwrap()
    }

    #[test]
    fn open_requests_parse_and_readies() {
        let mut p = opened(30_000);
        assert_eq!(session(&mut p).parse_requested, Some(PlayerConfig::default().parse_timeout));
        assert_eq!(p.sync().phase(), SessionPhase::Ready);
        assert_eq!(p.path(), Some(Path::new("clip.mp4")));
    }

    #[test]
    fn failed_open_leaves_no_session() {
        let mut engine = FakeEngine::new(30_000);
        engine.fail_open = true;
        let mut p = Player::new(engine, PlayerConfig::default());
        assert!(matches!(p.open(Path::new("bad.mkv")), Err(EngineError::Open { .. })));
        assert!(!p.has_session());
        assert_eq!(p.sync().phase(), SessionPhase::NoMedia);
        assert_eq!(p.update(Instant::now()), None);
    }

    #[test]
    fn reopening_replaces_the_session() {
        let mut p = opened(30_000);
        session(&mut p).position = 12_000;
        p.open(Path::new("other.mp4")).unwrap();
        assert_eq!(p.engine().opened, ["clip.mp4", "other.mp4"]);
        assert_eq!(p.sync().phase(), SessionPhase::Loading);
        assert_eq!(session(&mut p).position, 0);
        assert_eq!(p.sync().displayed_ms(), 0);
    }

    #[test]
    fn close_stops_ticking() {
        let mut p = opened(30_000);
        p.close();
        assert!(!p.has_session());
        assert_eq!(p.sync().phase(), SessionPhase::Closed);
        assert_eq!(p.update(Instant::now()), None);
        assert_eq!(p.refresh(Instant::now()), TickOutcome::Idle);
    }

    #[test]
    fn timer_fires_once_per_interval() {
        let interval = Duration::from_millis(33);
        let t0 = Instant::now();
        let mut timer = TickTimer::new(interval);
        assert!(!timer.fire(t0));
        timer.start(t0);
        assert!(timer.fire(t0));
        assert!(!timer.fire(t0 + Duration::from_millis(10)));
        assert_eq!(timer.until_next(t0 + Duration::from_millis(10)), Some(Duration::from_millis(23)));
        assert!(timer.fire(t0 + interval));
        // A long stall yields one tick, not a burst.
        assert!(timer.fire(t0 + Duration::from_secs(5)));
        assert!(!timer.fire(t0 + Duration::from_secs(5)));
        timer.stop();
        assert_eq!(timer.until_next(t0), None);
    }

    #[test]
    fn update_ticks_when_due() {
        let mut p = opened(30_000);
        session(&mut p).position = 500;
        p.update(Instant::now() + Duration::from_secs(1));
        assert_eq!(p.sync().displayed_ms(), 500);
    }

    #[test]
    fn toggle_play_restarts_from_the_end() {
        let mut p = opened(30_000);
        session(&mut p).position = 30_000;
        p.toggle_play().unwrap();
        assert_eq!(session(&mut p).seeks, [0]);
        assert!(session(&mut p).playing);

        p.toggle_play().unwrap();
        assert!(!session(&mut p).playing);
    }

    #[test]
    fn stop_pauses_and_rewinds() {
        let mut p = opened(30_000);
        session(&mut p).playing  = true;
        session(&mut p).position = 8_000;
        p.stop().unwrap();
        assert!(!session(&mut p).playing);
        assert_eq!(session(&mut p).seeks, [0]);
    }

    #[test]
    fn transport_needs_media() {
        let mut p = Player::new(FakeEngine::new(1_000), PlayerConfig::default());
        assert_eq!(p.toggle_play(), Err(SyncError::NoMedia));
        assert_eq!(p.stop(), Err(SyncError::NoMedia));
        assert_eq!(p.set_start_marker(), Err(SyncError::NoMedia));
        assert_eq!(p.drag_end(10), Err(SyncError::NoMedia));
        assert!(matches!(p.submit_seek_text("x"), Err(SyncError::Parse(_))));
        assert_eq!(p.submit_seek_text("10"), Err(SyncError::NoMedia));
    }

    #[test]
    fn rejected_rate_is_not_recorded() {
        let mut p = opened(30_000);
        let double = PlaybackRate::new(2, 1).unwrap();
        session(&mut p).fail_commands = true;
        assert!(p.set_rate(double).is_err());
        assert_eq!(p.sync().playback().rate, PlaybackRate::NORMAL);

        session(&mut p).fail_commands = false;
        p.set_rate(double).unwrap();
        assert_eq!(p.sync().playback().rate, double);
        assert_eq!(session(&mut p).rate, double);
    }

    #[test]
    fn volume_and_mute_carry_into_new_sessions() {
        let mut p = opened(30_000);
        p.set_volume(1.7);
        assert_eq!(p.volume(), 1.0);
        p.set_volume(0.25);
        assert!(p.toggle_mute());
        p.open(Path::new("next.mp4")).unwrap();
        assert_eq!(session(&mut p).volume, 0.25);
        assert!(session(&mut p).muted);
    }

    #[test]
    fn parse_results_are_kept() {
        let mut p = opened(30_000);
        let desc = MediaDescription {
            duration_ms: 30_000,
            seekable:    true,
            container:   Some("mp4".into()),
            tracks:      Vec::new(),
        };
        session(&mut p).events.push_back(EngineEvent::Parsed(desc.clone()));
        p.update(Instant::now());
        assert_eq!(p.description(), Some(&desc));
        p.close();
        assert_eq!(p.description(), None);
    }

    #[test]
    fn stream_without_duration_is_playable_after_parse() {
        let mut p = opened(0);
        assert_eq!(p.sync().phase(), SessionPhase::Loading);
        assert_eq!(p.toggle_play(), Err(SyncError::NoMedia));

        session(&mut p).events.push_back(EngineEvent::Parsed(MediaDescription {
            duration_ms: 0,
            seekable:    true,
            container:   Some("h264".into()),
            tracks:      Vec::new(),
        }));
        for _ in 0..10 {
            p.update(Instant::now());
        }
        assert_eq!(p.sync().phase(), SessionPhase::Ready);
        p.toggle_play().unwrap();
        assert!(session(&mut p).playing);
        assert!(session(&mut p).seeks.is_empty());
        assert_eq!(p.set_start_marker(), Err(SyncError::DurationUnknown));
    }

    #[test]
    fn drag_round_trip_through_player() {
        let mut p = opened(30_000);
        p.drag_start().unwrap();
        assert_eq!(p.drag_move(12_000), Ok(12_000));
        assert_eq!(p.drag_end(12_500), Ok(12_500));
        assert_eq!(session(&mut p).seeks, [12_500]);
    }
}
