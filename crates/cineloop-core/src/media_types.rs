// crates/cineloop-core/src/media_types.rs
//
// Types that flow from the engine to the player and the metadata panel.
// Plain data only: no egui, no ffmpeg.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
    #[default]
    Other,
}

/// One elementary stream as described by the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub index:       usize,
    pub kind:        TrackKind,
    /// Engine codec id, e.g. `"h264"`.
    pub codec:       String,
    /// Container codec tag, e.g. `"avc1"`, when the container carries one.
    pub fourcc:      Option<String>,
    pub dimensions:  Option<(u32, u32)>,
    /// Frame rate as `num/den`.
    pub frame_rate:  Option<(u32, u32)>,
    pub sample_rate: Option<u32>,
    pub channels:    Option<u16>,
    pub bitrate:     Option<u64>,
    pub language:    Option<String>,
}

impl TrackInfo {
    pub fn fps(&self) -> Option<f64> {
        match self.frame_rate {
            Some((num, den)) if num > 0 && den > 0 => Some(num as f64 / den as f64),
            _ => None,
        }
    }
}

/// Result of the engine's asynchronous parse.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaDescription {
    pub duration_ms: u64,
    pub seekable:    bool,
    pub container:   Option<String>,
    pub tracks:      Vec<TrackInfo>,
}

impl MediaDescription {
    /// Frame rate of the first video track that reports one.
    pub fn video_fps(&self) -> Option<f64> {
        self.tracks.iter()
            .filter(|t| t.kind == TrackKind::Video)
            .find_map(TrackInfo::fps)
    }
}

/// Asynchronous notifications from an engine session, drained on the UI
/// thread via `MediaSession::poll_event`.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Parsed(MediaDescription),
    ParseTimedOut,
    ParseFailed(String),
    EndReached,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(rate: Option<(u32, u32)>) -> TrackInfo {
        TrackInfo { kind: TrackKind::Video, frame_rate: rate, ..Default::default() }
    }

    #[test]
    fn fps_skips_tracks_without_rate() {
        let desc = MediaDescription {
            tracks: vec![
                TrackInfo { kind: TrackKind::Audio, ..Default::default() },
                video(None),
                video(Some((30_000, 1_001))),
            ],
            ..Default::default()
        };
        let fps = desc.video_fps().unwrap();
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn zero_denominator_has_no_fps() {
        assert_eq!(video(Some((25, 0))).fps(), None);
    }
}
