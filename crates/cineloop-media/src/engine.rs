// crates/cineloop-media/src/engine.rs
//
// FfmpegEngine: the `MediaEngine` the UI runs against. Construction performs
// the one-time FFmpeg initialisation; a failure there is the only engine
// fault that leaves the app without playback.

use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use log::Level;

use cineloop_core::engine::MediaEngine;
use cineloop_core::error::EngineError;
use cineloop_core::log_service::LogSink;

use crate::session::FfmpegSession;

pub struct FfmpegEngine {
    log: LogSink,
}

impl FfmpegEngine {
    pub fn new(log: LogSink) -> Result<Self, EngineError> {
        ffmpeg::init().map_err(|e| EngineError::Init(e.to_string()))?;
        // FFmpeg's own chatter goes to stderr; keep it to real errors.
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        log.engine(Level::Info, "ffmpeg", "FFmpeg initialised");
        Ok(Self { log })
    }
}

impl MediaEngine for FfmpegEngine {
    type Session = FfmpegSession;

    fn open(&mut self, path: &Path) -> Result<FfmpegSession, EngineError> {
        FfmpegSession::open(path, self.log.clone())
    }
}

#[cfg(test)]
pub(crate) fn init_for_tests() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        ffmpeg::init().expect("ffmpeg init");
    });
}
