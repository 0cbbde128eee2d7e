// crates/cineloop-media/src/helpers/seek.rs
//
// Seek helper wrapping avformat seek with a uniform soft-fail policy. Every
// demuxer seek in this crate routes through here.

use ffmpeg_the_third as ffmpeg;

/// Seek `ictx` to `target_ms` from the start of the file.
///
/// Backward seek (`..=ts`): lands on the keyframe at or before the target so
/// the caller's PTS filter can burn forward to the exact frame. A forward
/// seek would land on the next keyframe, possibly seconds late.
///
/// A target of 0 skips the seek: a freshly opened demuxer is already there,
/// and `avformat_seek_file(max_ts = 0)` fails with EPERM on some platforms.
///
/// Returns `false` on failure; decoding then continues from wherever the
/// demuxer is, which is still correct, only slower.
pub fn seek_to_ms(
    ictx:      &mut ffmpeg::format::context::Input,
    target_ms: u64,
    label:     &str,
) -> bool {
    if target_ms == 0 {
        return true;
    }
    let ts = (target_ms as i64).saturating_mul(ffmpeg::ffi::AV_TIME_BASE as i64 / 1_000);
    match ictx.seek(ts, ..=ts) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{label}: seek to {target_ms} ms failed ({e}); decoding from current position");
            false
        }
    }
}
