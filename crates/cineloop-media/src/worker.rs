// crates/cineloop-media/src/worker.rs
//
// VideoPipeline: the two decode threads behind one session.
//
//   scrub thread    — blocks on a latest-wins slot; decodes exactly one frame
//                     at the requested position (seek, frame step, paused
//                     open). Reuses its decoder for short forward moves.
//   playback thread — decodes continuously from a start position into a
//                     bounded channel. `send` blocking on a full channel IS
//                     the rate limiter; the session gates frames by PTS.
//
// Both threads take their orders from a latest-wins mailbox, so a burst of
// seeks collapses into the newest one instead of queueing behind stale work.
//
// Every frame carries the generation of the request that produced it, so the
// session can drop frames from before the latest seek without flushing races.
// Dropping the pipeline stops both threads without joining them.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::Level;
use parking_lot::{Condvar, Mutex};

use cineloop_core::log_service::LogSink;

use crate::decode::{FrameDecoder, VideoFrame};

/// Forward distance the scrub decoder will read through instead of
/// re-opening and seeking.
const SCRUB_REUSE_WINDOW_MS: u64 = 2_000;

#[derive(Debug, PartialEq)]
enum ScrubRequest {
    Frame { at_ms: u64, generation: u64 },
    Shutdown,
}

#[derive(Debug, PartialEq)]
enum PlaybackCmd {
    Start { from_ms: u64, generation: u64 },
    Stop,
    Shutdown,
}

/// Single-slot mailbox: a new message replaces one not yet taken.
struct Mailbox<T> {
    slot:  Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Mailbox<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self { slot: Mutex::new(None), ready: Condvar::new() })
    }

    fn post(&self, msg: T) {
        *self.slot.lock() = Some(msg);
        self.ready.notify_one();
    }

    fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    fn wait(&self) -> T {
        let mut guard = self.slot.lock();
        loop {
            if let Some(msg) = guard.take() {
                return msg;
            }
            self.ready.wait(&mut guard);
        }
    }
}

pub(crate) struct VideoPipeline {
    scrub:      Arc<Mailbox<ScrubRequest>>,
    scrub_rx:   Receiver<VideoFrame>,
    playback:   Arc<Mailbox<PlaybackCmd>>,
    pb_rx:      Receiver<VideoFrame>,
    generation: u64,
}

impl VideoPipeline {
    pub fn new(path: PathBuf, log: LogSink) -> Self {
        let scrub = Mailbox::new();
        let (scrub_tx, scrub_rx) = bounded::<VideoFrame>(8);
        {
            let inbox = Arc::clone(&scrub);
            let path  = path.clone();
            let log   = log.clone();
            thread::spawn(move || scrub_loop(path, inbox, scrub_tx, log));
        }

        // 32 frames ≈ 1 s of lookahead at 30 fps.
        let playback = Mailbox::new();
        let (pb_frame_tx, pb_rx) = bounded::<VideoFrame>(32);
        {
            let inbox = Arc::clone(&playback);
            thread::spawn(move || playback_loop(path, inbox, pb_frame_tx, log));
        }

        Self { scrub, scrub_rx, playback, pb_rx, generation: 0 }
    }

    /// Invalidate every frame in flight and show the frame at `at_ms`.
    pub fn request_frame(&mut self, at_ms: u64) {
        self.generation += 1;
        self.scrub.post(ScrubRequest::Frame { at_ms, generation: self.generation });
    }

    pub fn start_playback(&mut self, from_ms: u64) {
        self.generation += 1;
        self.playback.post(PlaybackCmd::Start { from_ms, generation: self.generation });
        // Unblocks a decode thread parked on a full frame channel so it
        // reaches the new command.
        while self.pb_rx.try_recv().is_ok() {}
    }

    pub fn stop_playback(&mut self) {
        self.generation += 1;
        self.playback.post(PlaybackCmd::Stop);
    }

    /// Newest scrub frame of the current generation, if one arrived.
    pub fn latest_scrub_frame(&self) -> Option<VideoFrame> {
        self.scrub_rx.try_iter()
            .filter(|f| f.generation == self.generation)
            .last()
    }

    pub fn try_next_playback_frame(&self) -> Option<VideoFrame> {
        loop {
            match self.pb_rx.try_recv() {
                Ok(f) if f.generation == self.generation => return Some(f),
                Ok(_stale) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for VideoPipeline {
    fn drop(&mut self) {
        // A thread blocked in `send` exits when the frame receiver goes; one
        // parked on its mailbox needs the pill.
        self.scrub.post(ScrubRequest::Shutdown);
        self.playback.post(PlaybackCmd::Shutdown);
    }
}

fn scrub_loop(path: PathBuf, inbox: Arc<Mailbox<ScrubRequest>>, tx: Sender<VideoFrame>, log: LogSink) {
    let mut live: Option<FrameDecoder> = None;
    loop {
        let ScrubRequest::Frame { at_ms, generation } = inbox.wait() else { return };

        // Re-open on any backward move or a long forward jump; frame_at can
        // only read forward, and reading far forward is slower than a seek.
        let reuse = live.as_ref().is_some_and(|d| {
            let last = d.last_ms();
            at_ms > last && at_ms - last <= SCRUB_REUSE_WINDOW_MS
        });
        if !reuse {
            live = match FrameDecoder::open(&path, at_ms) {
                Ok(d)  => Some(d),
                Err(e) => {
                    log.engine(Level::Warn, "decode", format!("scrub open at {at_ms} ms: {e:#}"));
                    None
                }
            };
        }
        let Some(decoder) = live.as_mut() else { continue };
        match decoder.frame_at(at_ms) {
            Some(mut frame) => {
                frame.generation = generation;
                if tx.send(frame).is_err() {
                    return;
                }
            }
            None => {
                log.engine(Level::Debug, "decode", format!("no frame at {at_ms} ms"));
                live = None;
            }
        }
    }
}

fn playback_loop(
    path:  PathBuf,
    inbox: Arc<Mailbox<PlaybackCmd>>,
    tx:    Sender<VideoFrame>,
    log:   LogSink,
) {
    let mut active: Option<(u64, FrameDecoder)> = None;
    loop {
        let cmd = if active.is_some() { inbox.take() } else { Some(inbox.wait()) };

        match cmd {
            Some(PlaybackCmd::Start { from_ms, generation }) => {
                // Burn to the exact start before the first send so the first
                // frame delivered is already at the right position.
                active = match FrameDecoder::open(&path, from_ms) {
                    Ok(mut d) => {
                        if let Some(mut first) = d.frame_at(from_ms) {
                            first.generation = generation;
                            if tx.send(first).is_err() {
                                return;
                            }
                        }
                        Some((generation, d))
                    }
                    Err(e) => {
                        log.engine(Level::Warn, "decode", format!("playback open at {from_ms} ms: {e:#}"));
                        None
                    }
                };
                continue;
            }
            Some(PlaybackCmd::Stop) => {
                active = None;
                continue;
            }
            Some(PlaybackCmd::Shutdown) => return,
            None => {}
        }

        let Some((generation, decoder)) = active.as_mut() else { continue };
        match decoder.next_frame() {
            Some(mut frame) => {
                frame.generation = *generation;
                if tx.send(frame).is_err() {
                    return;
                }
            }
            None => {
                log.engine(Level::Debug, "decode", "end of video stream");
                active = None;
            }
        }
    }
}
