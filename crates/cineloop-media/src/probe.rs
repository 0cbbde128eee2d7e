// crates/cineloop-media/src/probe.rs
//
// In-process FFmpeg probing: duration, seekability, per-track metadata.
//
// `summary` runs synchronously inside `open` (one avformat_open_input, no
// decoding). `describe` is the full parse that request_parse runs on a
// background thread.

use std::path::Path;

use anyhow::{Context as _, Result};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::context::Input;
use ffmpeg::media::Type;

use cineloop_core::codec::fourcc_from_tag;
use cineloop_core::media_types::{MediaDescription, TrackInfo, TrackKind};

/// What `open` needs before the full parse has run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Summary {
    pub duration_ms: u64,
    pub seekable:    bool,
    pub has_video:   bool,
    pub has_audio:   bool,
}

pub(crate) fn summary(path: &Path) -> Result<Summary> {
    let ictx = ffmpeg::format::input(path)
        .with_context(|| format!("open {}", path.display()))?;
    let has_video = ictx.streams().best(Type::Video).is_some();
    let has_audio = ictx.streams().best(Type::Audio).is_some();
    if !has_video && !has_audio {
        anyhow::bail!("no audio or video stream");
    }
    Ok(Summary {
        duration_ms: duration_ms(&ictx),
        seekable:    is_seekable(&ictx),
        has_video,
        has_audio,
    })
}

pub(crate) fn describe(path: &Path) -> Result<MediaDescription> {
    let ictx = ffmpeg::format::input(path)
        .with_context(|| format!("open {}", path.display()))?;

    let tracks = ictx.streams().map(|stream| track_info(&stream)).collect();

    Ok(MediaDescription {
        duration_ms: duration_ms(&ictx),
        seekable:    is_seekable(&ictx),
        container:   Some(ictx.format().name().to_string()),
        tracks,
    })
}

fn track_info(stream: &ffmpeg::format::stream::Stream) -> TrackInfo {
    let params = stream.parameters();
    let kind = match params.medium() {
        Type::Video    => TrackKind::Video,
        Type::Audio    => TrackKind::Audio,
        Type::Subtitle => TrackKind::Subtitle,
        _              => TrackKind::Other,
    };

    let (tag, width, height, sample_rate, channels, bit_rate) = unsafe {
        let p = params.as_ptr();
        (
            (*p).codec_tag,
            (*p).width,
            (*p).height,
            (*p).sample_rate,
            (*p).ch_layout.nb_channels,
            (*p).bit_rate,
        )
    };

    let rate = stream.avg_frame_rate();
    let frame_rate = match (rate.numerator(), rate.denominator()) {
        (n, d) if n > 0 && d > 0 => Some((n as u32, d as u32)),
        _ => None,
    };

    let video = kind == TrackKind::Video;
    let audio = kind == TrackKind::Audio;
    TrackInfo {
        index:       stream.index(),
        kind,
        codec:       params.id().name().to_string(),
        fourcc:      fourcc_from_tag(tag),
        dimensions:  (video && width > 0 && height > 0).then_some((width as u32, height as u32)),
        frame_rate:  if video { frame_rate } else { None },
        sample_rate: (audio && sample_rate > 0).then_some(sample_rate as u32),
        channels:    (audio && channels > 0).then_some(channels as u16),
        bitrate:     (bit_rate > 0).then_some(bit_rate as u64),
        language:    stream.metadata().get("language").map(str::to_string),
    }
}

/// Container duration, falling back to the best stream's own duration.
fn duration_ms(ictx: &Input) -> u64 {
    let container = ictx.duration();
    if container > 0 {
        return micros_to_ms(container);
    }
    ictx.streams().best(Type::Video)
        .or_else(|| ictx.streams().best(Type::Audio))
        .map(|stream| {
            let tb = stream.time_base();
            pts_to_ms(stream.duration(), tb.numerator(), tb.denominator())
        })
        .unwrap_or(0)
}

fn is_seekable(ictx: &Input) -> bool {
    // Live and piped inputs have no seekable AVIOContext.
    unsafe {
        let ctx = ictx.as_ptr();
        let pb = (*ctx).pb;
        !pb.is_null() && (*pb).seekable != 0
    }
}

/// AV_TIME_BASE (µs) → ms.
pub(crate) fn micros_to_ms(us: i64) -> u64 {
    if us <= 0 { 0 } else { (us / 1_000) as u64 }
}

/// Stream timestamp in `num/den` seconds → ms. Negative or unknown → 0.
pub(crate) fn pts_to_ms(pts: i64, num: i32, den: i32) -> u64 {
    if pts <= 0 || num <= 0 || den <= 0 {
        return 0;
    }
    (pts as i128 * num as i128 * 1_000 / den as i128) as u64
}

/// ms → stream timestamp in `num/den` seconds.
pub(crate) fn ms_to_pts(ms: u64, num: i32, den: i32) -> i64 {
    if num <= 0 || den <= 0 {
        return 0;
    }
    (ms as i128 * den as i128 / (num as i128 * 1_000)) as i64
}
