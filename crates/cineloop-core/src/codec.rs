// crates/cineloop-core/src/codec.rs
//
// FourCC / codec-id → display name lookup for the metadata panel.

use crate::media_types::TrackInfo;

/// (FourCC, display name). FourCCs compare case-sensitively, as containers
/// store them.
const FOURCC_NAMES: &[(&str, &str)] = &[
    ("avc1", "H.264 / AVC"),
    ("avc3", "H.264 / AVC"),
    ("H264", "H.264 / AVC"),
    ("h264", "H.264 / AVC"),
    ("hvc1", "H.265 / HEVC"),
    ("hev1", "H.265 / HEVC"),
    ("dvh1", "Dolby Vision (HEVC)"),
    ("av01", "AV1"),
    ("vp08", "VP8"),
    ("VP80", "VP8"),
    ("vp09", "VP9"),
    ("VP90", "VP9"),
    ("mp4v", "MPEG-4 Part 2"),
    ("XVID", "MPEG-4 Part 2 (Xvid)"),
    ("DIVX", "MPEG-4 Part 2 (DivX)"),
    ("MJPG", "Motion JPEG"),
    ("apcn", "Apple ProRes 422"),
    ("apch", "Apple ProRes 422 HQ"),
    ("ap4h", "Apple ProRes 4444"),
    ("theo", "Theora"),
    ("mp4a", "AAC"),
    ("ac-3", "Dolby Digital (AC-3)"),
    ("ec-3", "Dolby Digital Plus (E-AC-3)"),
    ("Opus", "Opus"),
    ("fLaC", "FLAC"),
    (".mp3", "MP3"),
    ("alac", "Apple Lossless"),
    ("sowt", "PCM (little-endian)"),
    ("twos", "PCM (big-endian)"),
    ("tx3g", "3GPP Timed Text"),
    ("wvtt", "WebVTT"),
    ("c608", "CEA-608 Captions"),
];

/// (engine codec id, display name), the fallback when no FourCC is present.
const CODEC_ID_NAMES: &[(&str, &str)] = &[
    ("h264",       "H.264 / AVC"),
    ("hevc",       "H.265 / HEVC"),
    ("av1",        "AV1"),
    ("vp8",        "VP8"),
    ("vp9",        "VP9"),
    ("mpeg4",      "MPEG-4 Part 2"),
    ("mpeg2video", "MPEG-2 Video"),
    ("mjpeg",      "Motion JPEG"),
    ("prores",     "Apple ProRes"),
    ("theora",     "Theora"),
    ("aac",        "AAC"),
    ("ac3",        "Dolby Digital (AC-3)"),
    ("eac3",       "Dolby Digital Plus (E-AC-3)"),
    ("opus",       "Opus"),
    ("vorbis",     "Vorbis"),
    ("flac",       "FLAC"),
    ("mp3",        "MP3"),
    ("alac",       "Apple Lossless"),
    ("pcm_s16le",  "PCM 16-bit"),
    ("pcm_s24le",  "PCM 24-bit"),
    ("subrip",     "SubRip"),
    ("ass",        "Advanced SubStation Alpha"),
    ("mov_text",   "3GPP Timed Text"),
    ("webvtt",     "WebVTT"),
    ("dvd_subtitle",      "DVD Subtitles"),
    ("hdmv_pgs_subtitle", "Blu-ray PGS Subtitles"),
];

/// Render a little-endian codec tag as four printable characters.
/// Returns `None` for a zero tag or one with non-printable bytes (ffmpeg
/// reports raw ids there for formats that have no FourCC).
pub fn fourcc_from_tag(tag: u32) -> Option<String> {
    if tag == 0 {
        return None;
    }
    let bytes = tag.to_le_bytes();
    bytes.iter()
        .all(|b| b.is_ascii_graphic() || *b == b' ')
        .then(|| bytes.iter().map(|&b| b as char).collect())
}

pub fn name_for_fourcc(fourcc: &str) -> Option<&'static str> {
    FOURCC_NAMES.iter().find(|(cc, _)| *cc == fourcc).map(|(_, name)| *name)
}

pub fn name_for_codec_id(id: &str) -> Option<&'static str> {
    CODEC_ID_NAMES.iter().find(|(c, _)| *c == id).map(|(_, name)| *name)
}

/// Best available human-readable codec name for a track.
pub fn display_name(track: &TrackInfo) -> String {
    track.fourcc.as_deref()
        .and_then(name_for_fourcc)
        .or_else(|| name_for_codec_id(&track.codec))
        .map(str::to_string)
        .unwrap_or_else(|| match &track.fourcc {
            Some(cc) => format!("{} ({cc})", track.codec),
            None     => track.codec.clone(),
        })
}
