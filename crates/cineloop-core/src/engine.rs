// crates/cineloop-core/src/engine.rs
//
// The capability surface the player needs from a media engine.
//
// cineloop-media implements these over ffmpeg + rodio. The controller never
// reaches past them: commands go in, positions are polled out, and anything
// asynchronous (parse results, end-of-media, faults) comes back through
// `poll_event` on the caller's thread.

use std::path::Path;
use std::time::Duration;

use crate::error::EngineError;
use crate::media_types::{EngineEvent, TrackInfo};
use crate::state::PlaybackRate;

pub trait MediaEngine {
    type Session: MediaSession;

    fn open(&mut self, path: &Path) -> Result<Self::Session, EngineError>;
}

/// One opened media file.
pub trait MediaSession {
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn set_rate(&mut self, rate: PlaybackRate) -> Result<(), EngineError>;
    fn seek_to(&mut self, ms: u64) -> Result<(), EngineError>;

    fn position_ms(&self) -> u64;
    /// 0 until the engine knows the duration.
    fn length_ms(&self) -> u64;
    fn is_playing(&self) -> bool;
    fn is_seekable(&self) -> bool;
    fn tracks(&self) -> Vec<TrackInfo>;

    fn set_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);

    /// Start the asynchronous parse. The outcome arrives later as
    /// `EngineEvent::Parsed` or `EngineEvent::ParseTimedOut`.
    fn request_parse(&mut self, timeout: Duration);
    fn poll_event(&mut self) -> Option<EngineEvent>;

    /// Best-effort disposal; must not block on in-flight work.
    fn close(&mut self);
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory engine for controller tests. Seeks converge instantly unless
    //! `fail_commands` is set; tests move `position` by hand to simulate
    //! playback.

    use std::collections::VecDeque;
    use std::path::Path;
    use std::time::Duration;

    use super::{MediaEngine, MediaSession};
    use crate::error::EngineError;
    use crate::media_types::{EngineEvent, TrackInfo};
    use crate::state::PlaybackRate;

    #[derive(Default)]
    pub struct FakeSession {
        pub position:      u64,
        pub length:        u64,
        pub playing:       bool,
        pub seekable:      bool,
        pub fail_commands: bool,
        pub seeks:         Vec<u64>,
        pub rate:          PlaybackRate,
        pub volume:        f32,
        pub muted:         bool,
        pub parse_requested: Option<Duration>,
        pub events:        VecDeque<EngineEvent>,
        pub closed:        bool,
    }

    impl FakeSession {
        pub fn loaded(length: u64) -> Self {
            Self { length, seekable: true, volume: 1.0, ..Default::default() }
        }

        fn check(&self, op: &'static str) -> Result<(), EngineError> {
            if self.fail_commands {
                Err(EngineError::command(op, "fake failure"))
            } else {
                Ok(())
            }
        }
    }

    impl MediaSession for FakeSession {
        fn play(&mut self) -> Result<(), EngineError> {
            self.check("play")?;
            self.playing = true;
            Ok(())
        }
        fn pause(&mut self) -> Result<(), EngineError> {
            self.check("pause")?;
            self.playing = false;
            Ok(())
        }
        fn set_rate(&mut self, rate: PlaybackRate) -> Result<(), EngineError> {
            self.check("set_rate")?;
            self.rate = rate;
            Ok(())
        }
        fn seek_to(&mut self, ms: u64) -> Result<(), EngineError> {
            self.check("seek")?;
            self.seeks.push(ms);
            self.position = ms;
            Ok(())
        }
        fn position_ms(&self) -> u64 { self.position }
        fn length_ms(&self) -> u64 { self.length }
        fn is_playing(&self) -> bool { self.playing }
        fn is_seekable(&self) -> bool { self.seekable }
        fn tracks(&self) -> Vec<TrackInfo> { Vec::new() }
        fn set_volume(&mut self, volume: f32) { self.volume = volume; }
        fn set_muted(&mut self, muted: bool) { self.muted = muted; }
        fn request_parse(&mut self, timeout: Duration) { self.parse_requested = Some(timeout); }
        fn poll_event(&mut self) -> Option<EngineEvent> { self.events.pop_front() }
        fn close(&mut self) { self.closed = true; }
    }

    /// Hands out `FakeSession::loaded(length)` on every open.
    pub struct FakeEngine {
        pub length:    u64,
        pub fail_open: bool,
        pub opened:    Vec<String>,
    }

    impl FakeEngine {
        pub fn new(length: u64) -> Self {
            Self { length, fail_open: false, opened: Vec::new() }
        }
    }

    impl MediaEngine for FakeEngine {
        type Session = FakeSession;

        fn open(&mut self, path: &Path) -> Result<FakeSession, EngineError> {
            if self.fail_open {
                return Err(EngineError::Open {
                    path:   path.display().to_string(),
                    reason: "fake failure".into(),
                });
            }
            self.opened.push(path.display().to_string());
            Ok(FakeSession::loaded(self.length))
        }
    }
}
