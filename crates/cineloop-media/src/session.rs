// crates/cineloop-media/src/session.rs
//
// FfmpegSession: one opened file. Implements `MediaSession` on top of the
// playback clock, the video decode pipeline and the rodio audio output.
//
// Threads per session:
//   scrub + playback decode (VideoPipeline, only when the file has video)
//   parse    — full probe, then audio extraction
//   watcher  — waits on the parse result with the requested timeout
// Results come back over `msg_rx` and are folded in by `poll_event` on the
// UI thread. None of these threads is joined on close.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::Level;
use uuid::Uuid;

use cineloop_core::engine::MediaSession;
use cineloop_core::error::EngineError;
use cineloop_core::log_service::LogSink;
use cineloop_core::media_types::{EngineEvent, MediaDescription, TrackInfo};
use cineloop_core::state::PlaybackRate;

use crate::audio::{cleanup_audio_temp, extract_to_wav, temp_wav_path, AudioOutput};
use crate::clock::PlaybackClock;
use crate::decode::VideoFrame;
use crate::probe;
use crate::worker::VideoPipeline;

/// A pending frame this far behind the clock is replaced by a newer one.
const OVERDUE_FRAME_MS: u64 = 33;
/// How early a frame may be shown relative to its PTS.
const EARLY_FRAME_MS: u64 = 16;

enum SessionMsg {
    Event(EngineEvent),
    AudioReady(PathBuf),
    AudioFailed(String),
}

pub struct FfmpegSession {
    id:        Uuid,
    path:      PathBuf,
    log:       LogSink,
    clock:     PlaybackClock,
    seekable:  bool,
    has_audio: bool,
    tracks:    Vec<TrackInfo>,

    video:         Option<VideoPipeline>,
    pending_frame: Option<VideoFrame>,
    ready_frame:   Option<VideoFrame>,

    audio:      Option<AudioOutput>,
    audio_path: Option<PathBuf>,
    volume:     f32,
    muted:      bool,

    msg_tx:       Sender<SessionMsg>,
    msg_rx:       Receiver<SessionMsg>,
    events:       VecDeque<EngineEvent>,
    parse_started: bool,
    end_reported: bool,
    cancelled:    Arc<AtomicBool>,
    closed:       bool,
}

impl FfmpegSession {
    pub(crate) fn open(path: &Path, log: LogSink) -> Result<Self, EngineError> {
        let summary = probe::summary(path).map_err(|e| EngineError::Open {
            path:   path.display().to_string(),
            reason: format!("{e:#}"),
        })?;

        let id = Uuid::new_v4();
        log.engine(
            Level::Info,
            "probe",
            format!(
                "{} → {} ms, seekable={}, video={}, audio={}",
                path.display(), summary.duration_ms, summary.seekable,
                summary.has_video, summary.has_audio,
            ),
        );

        let mut video = summary.has_video.then(|| VideoPipeline::new(path.to_path_buf(), log.clone()));
        // Paused open: show the first frame.
        if let Some(v) = video.as_mut() {
            v.request_frame(0);
        }

        let (msg_tx, msg_rx) = unbounded();
        Ok(Self {
            id,
            path:      path.to_path_buf(),
            log,
            clock:     PlaybackClock::new(summary.duration_ms),
            seekable:  summary.seekable,
            has_audio: summary.has_audio,
            tracks:    Vec::new(),

            video,
            pending_frame: None,
            ready_frame:   None,

            audio:      None,
            audio_path: None,
            volume:     1.0,
            muted:      false,

            msg_tx,
            msg_rx,
            events:        VecDeque::new(),
            parse_started: false,
            end_reported:  false,
            cancelled:     Arc::new(AtomicBool::new(false)),
            closed:        false,
        })
    }

    pub fn path(&self) -> &Path { &self.path }

    /// The frame to display for the current clock position, if it changed
    /// since the last call.
    ///
    /// Scrub frames (seek, step, paused open) win over playback frames.
    /// Playback frames are PTS-gated against the clock: a one-slot pending
    /// buffer holds the next frame until the clock reaches it, so the decode
    /// thread running ahead never makes video race ahead of audio.
    pub fn take_frame(&mut self) -> Option<VideoFrame> {
        let video = self.video.as_ref()?;
        if let Some(f) = video.latest_scrub_frame() {
            self.ready_frame = Some(f);
        }
        if self.clock.is_running() {
            let now_ms = self.clock.position(Instant::now());
            if let Some(f) = due_frame(&mut self.pending_frame, now_ms, || video.try_next_playback_frame()) {
                self.ready_frame = Some(f);
            }
        }
        self.ready_frame.take()
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn ensure_open(&self, op: &'static str) -> Result<(), EngineError> {
        if self.closed {
            Err(EngineError::command(op, "session closed"))
        } else {
            Ok(())
        }
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.msg_rx.try_recv() {
            match msg {
                SessionMsg::Event(event) => {
                    if let EngineEvent::Parsed(desc) = &event {
                        self.apply_description(desc);
                    }
                    self.events.push_back(event);
                }
                SessionMsg::AudioReady(wav) => self.attach_audio(wav),
                SessionMsg::AudioFailed(reason) => {
                    self.log.engine(Level::Warn, "audio", format!("no audio: {reason}"));
                }
            }
        }
    }

    fn apply_description(&mut self, desc: &MediaDescription) {
        self.tracks = desc.tracks.clone();
        if desc.duration_ms > 0 {
            self.clock.set_duration(desc.duration_ms);
        }
        self.seekable &= desc.seekable;
    }

    fn attach_audio(&mut self, wav: PathBuf) {
        let now = Instant::now();
        let at_ms = self.clock.position(now);
        match AudioOutput::open(&wav, at_ms, self.clock.rate() as f32, self.effective_volume()) {
            Ok(out) => {
                if self.clock.is_running() {
                    out.play();
                }
                self.log.engine(Level::Info, "audio", format!("audio ready at {at_ms} ms"));
                self.audio = Some(out);
            }
            Err(e) => {
                self.log.engine(Level::Warn, "audio", format!("audio output: {e:#}"));
            }
        }
        self.audio_path = Some(wav);
    }

    fn check_end(&mut self) {
        let now = Instant::now();
        if self.end_reported || !self.clock.reached_end(now) {
            return;
        }
        self.clock.pause(now);
        if let Some(v) = self.video.as_mut() {
            v.stop_playback();
        }
        self.pending_frame = None;
        if let Some(a) = &self.audio {
            a.pause();
        }
        self.end_reported = true;
        self.log.engine(Level::Debug, "clock", "end of media");
        self.events.push_back(EngineEvent::EndReached);
    }
}

/// Advance the one-slot `pending` buffer against the clock and return the
/// playback frame due at `now_ms`, if any. Frames the clock has already
/// passed are skipped in favour of newer ones; a frame ahead of the clock
/// stays pending.
fn due_frame(
    pending:  &mut Option<VideoFrame>,
    now_ms:   u64,
    mut next: impl FnMut() -> Option<VideoFrame>,
) -> Option<VideoFrame> {
    if pending.is_none() {
        *pending = next();
    }
    while pending.as_ref().is_some_and(|f| f.pts_ms + OVERDUE_FRAME_MS < now_ms) {
        match next() {
            Some(newer) => *pending = Some(newer),
            None        => break,
        }
    }
    let due = pending.as_ref().is_some_and(|f| f.pts_ms <= now_ms + EARLY_FRAME_MS);
    if due { pending.take() } else { None }
}

/// Wait for the parser thread's result for at most `timeout`.
fn await_parse(
    result_rx: &Receiver<Result<MediaDescription, String>>,
    timeout:   Duration,
) -> EngineEvent {
    match result_rx.recv_timeout(timeout) {
        Ok(Ok(desc))  => EngineEvent::Parsed(desc),
        Ok(Err(msg))  => EngineEvent::ParseFailed(msg),
        Err(RecvTimeoutError::Timeout) => EngineEvent::ParseTimedOut,
        Err(RecvTimeoutError::Disconnected) => {
            EngineEvent::ParseFailed("parser thread exited".into())
        }
    }
}

impl MediaSession for FfmpegSession {
    fn play(&mut self) -> Result<(), EngineError> {
        self.ensure_open("play")?;
        if self.clock.is_running() {
            return Ok(());
        }
        let now = Instant::now();
        self.clock.play(now);
        self.end_reported = false;
        let from_ms = self.clock.position(now);
        if let Some(v) = self.video.as_mut() {
            v.start_playback(from_ms);
        }
        self.pending_frame = None;
        if let Some(a) = &self.audio {
            a.seek(from_ms);
            a.play();
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.ensure_open("pause")?;
        if !self.clock.is_running() {
            return Ok(());
        }
        let now = Instant::now();
        self.clock.pause(now);
        let at_ms = self.clock.position(now);
        if let Some(v) = self.video.as_mut() {
            v.stop_playback();
            // Show exactly the paused frame, not the last one decoded ahead.
            v.request_frame(at_ms);
        }
        self.pending_frame = None;
        if let Some(a) = &self.audio {
            a.pause();
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: PlaybackRate) -> Result<(), EngineError> {
        self.ensure_open("set_rate")?;
        self.clock.set_rate(rate.as_f64(), Instant::now());
        if let Some(a) = &self.audio {
            a.set_speed(rate.as_f32());
        }
        Ok(())
    }

    fn seek_to(&mut self, ms: u64) -> Result<(), EngineError> {
        self.ensure_open("seek")?;
        if !self.seekable {
            return Err(EngineError::Unsupported("seeking"));
        }
        let now = Instant::now();
        self.clock.seek(ms, now);
        let target = self.clock.position(now);
        self.end_reported = false;
        self.pending_frame = None;
        if let Some(v) = self.video.as_mut() {
            v.request_frame(target);
            if self.clock.is_running() {
                v.start_playback(target);
            }
        }
        if let Some(a) = &self.audio {
            a.seek(target);
        }
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        self.clock.position(Instant::now())
    }

    fn length_ms(&self) -> u64 {
        self.clock.duration_ms()
    }

    fn is_playing(&self) -> bool {
        self.clock.is_running()
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks.clone()
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(a) = &self.audio {
            a.set_volume(self.effective_volume());
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(a) = &self.audio {
            a.set_volume(self.effective_volume());
        }
    }

    fn request_parse(&mut self, timeout: Duration) {
        if self.closed || self.parse_started {
            return;
        }
        self.parse_started = true;

        let (result_tx, result_rx) = bounded::<Result<MediaDescription, String>>(1);
        let path      = self.path.clone();
        let msg_tx    = self.msg_tx.clone();
        let log       = self.log.clone();
        let cancelled = Arc::clone(&self.cancelled);
        let has_audio = self.has_audio;
        let wav       = temp_wav_path(self.id);

        thread::spawn(move || {
            let started = Instant::now();
            let result = probe::describe(&path).map_err(|e| format!("{e:#}"));
            log.engine(
                Level::Debug,
                "probe",
                format!("parse finished in {} ms", started.elapsed().as_millis()),
            );
            let _ = result_tx.send(result);

            if !has_audio || cancelled.load(Ordering::Relaxed) {
                return;
            }
            match extract_to_wav(&path, &wav) {
                Ok(bytes) => {
                    log.engine(Level::Debug, "audio", format!("wrote {bytes} bytes to {}", wav.display()));
                    if !cancelled.load(Ordering::Relaxed) {
                        let _ = msg_tx.send(SessionMsg::AudioReady(wav.clone()));
                    }
                    // The session may have closed while this was in flight.
                    if cancelled.load(Ordering::Relaxed) && wav.exists() {
                        cleanup_audio_temp(&wav);
                    }
                }
                Err(e) => {
                    let _ = msg_tx.send(SessionMsg::AudioFailed(format!("{e:#}")));
                }
            }
        });

        let msg_tx = self.msg_tx.clone();
        thread::spawn(move || {
            let event = await_parse(&result_rx, timeout);
            let _ = msg_tx.send(SessionMsg::Event(event));
        });
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        if self.closed {
            return None;
        }
        self.drain_messages();
        self.check_end();
        if self.clock.is_running() {
            if let Some(a) = &self.audio {
                a.resync(self.clock.position(Instant::now()));
            }
        }
        self.events.pop_front()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancelled.store(true, Ordering::Relaxed);
        self.clock.pause(Instant::now());
        self.video = None;
        self.pending_frame = None;
        self.ready_frame = None;
        if let Some(a) = self.audio.take() {
            a.pause();
        }
        if let Some(wav) = self.audio_path.take() {
            cleanup_audio_temp(&wav);
        }
        // An extraction finished but not yet attached.
        while let Ok(msg) = self.msg_rx.try_recv() {
            if let SessionMsg::AudioReady(wav) = msg {
                cleanup_audio_temp(&wav);
            }
        }
        self.events.clear();
        self.log.engine(Level::Info, "session", format!("closed {}", self.path.display()));
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn frame(pts_ms: u64) -> VideoFrame {
        VideoFrame { pts_ms, width: 2, height: 2, rgba: vec![0; 16], generation: 1 }
    }

    fn feed(pts: &[u64]) -> VecDeque<VideoFrame> {
        pts.iter().map(|&p| frame(p)).collect()
    }

    #[test]
    fn frame_ahead_of_clock_stays_pending() {
        let mut queue = feed(&[1_000]);
        let mut pending = None;
        assert!(due_frame(&mut pending, 500, || queue.pop_front()).is_none());
        assert_eq!(pending.as_ref().map(|f| f.pts_ms), Some(1_000));

        let shown = due_frame(&mut pending, 990, || queue.pop_front()).unwrap();
        assert_eq!(shown.pts_ms, 1_000);
        assert!(pending.is_none());
    }

    #[test]
    fn overdue_frames_are_skipped() {
        let mut queue = feed(&[0, 40, 80, 120, 160]);
        let mut pending = None;
        let shown = due_frame(&mut pending, 130, || queue.pop_front()).unwrap();
        assert_eq!(shown.pts_ms, 120);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn last_overdue_frame_is_shown_when_nothing_newer_arrived() {
        let mut queue = feed(&[0]);
        let mut pending = None;
        let shown = due_frame(&mut pending, 2_000, || queue.pop_front()).unwrap();
        assert_eq!(shown.pts_ms, 0);
    }

    #[test]
    fn empty_pipeline_shows_nothing() {
        let mut pending = None;
        assert!(due_frame(&mut pending, 100, || None).is_none());
    }

    #[test]
    fn silent_parser_times_out() {
        let (_tx, rx) = bounded::<Result<MediaDescription, String>>(1);
        assert_eq!(await_parse(&rx, Duration::from_millis(20)), EngineEvent::ParseTimedOut);
    }

    #[test]
    fn parser_results_map_to_events() {
        let (tx, rx) = bounded(1);
        tx.send(Err("bad header".to_string())).unwrap();
        assert_eq!(
            await_parse(&rx, Duration::from_secs(1)),
            EngineEvent::ParseFailed("bad header".into()),
        );

        let desc = MediaDescription {
            duration_ms: 4_000,
            seekable:    true,
            container:   Some("matroska".into()),
            tracks:      Vec::new(),
        };
        tx.send(Ok(desc.clone())).unwrap();
        assert_eq!(await_parse(&rx, Duration::from_secs(1)), EngineEvent::Parsed(desc));

        drop(tx);
        assert!(matches!(await_parse(&rx, Duration::from_secs(1)), EngineEvent::ParseFailed(_)));
    }
}
