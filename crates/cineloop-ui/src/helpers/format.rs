// crates/cineloop-ui/src/helpers/format.rs
//
// UI-layer string utilities that don't belong in cineloop-core.
//
// Time formatting lives in cineloop_core::helpers::time. This module holds
// labels that only mean something on screen: truncation and the unit
// strings of the metadata panel.

use cineloop_core::media_types::TrackKind;

/// Truncates `text` to fit within `max_px` using a per-character width
/// heuristic (11px proportional ≈ 6.5 px/char average). Appends "…" when
/// truncated. Avoids egui font measurement, which requires `&mut Fonts`.
pub fn fit_label(text: &str, max_px: f32) -> String {
    const AVG_CHAR_PX: f32 = 6.5;
    const ELLIPSIS: &str = "…";
    let max_chars = (max_px / AVG_CHAR_PX).max(0.0) as usize;
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    // Reserve one slot for the ellipsis character itself.
    let keep = max_chars.saturating_sub(1);
    text.chars().take(keep).collect::<String>() + ELLIPSIS
}

/// `5_000_000` → `"5.0 Mb/s"`, `128_000` → `"128 kb/s"`.
pub fn bitrate(bits_per_sec: u64) -> String {
    if bits_per_sec >= 1_000_000 {
        format!("{:.1} Mb/s", bits_per_sec as f64 / 1_000_000.0)
    } else {
        format!("{} kb/s", (bits_per_sec + 500) / 1_000)
    }
}

/// Whole rates print without decimals; NTSC-style rates keep two.
pub fn frame_rate(fps: f64) -> String {
    if (fps - fps.round()).abs() < 0.005 {
        format!("{:.0} fps", fps)
    } else {
        format!("{:.2} fps", fps)
    }
}

pub fn channels(count: u16) -> String {
    match count {
        1 => "mono".to_string(),
        2 => "stereo".to_string(),
        6 => "5.1".to_string(),
        8 => "7.1".to_string(),
        n => format!("{n} ch"),
    }
}

pub fn track_kind(kind: TrackKind) -> &'static str {
    match kind {
        TrackKind::Video    => "Video",
        TrackKind::Audio    => "Audio",
        TrackKind::Subtitle => "Subtitle",
        TrackKind::Other    => "Data",
    }
}


#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn bitrates() {
        assert_eq!(bitrate(5_000_000), "5.0 Mb/s");
        assert_eq!(bitrate(128_000), "128 kb/s");
        assert_eq!(bitrate(96_400), "96 kb/s");
    }

    #[test]
    fn frame_rates() {
        assert_eq!(frame_rate(25.0), "25 fps");
        assert_eq!(frame_rate(30_000.0 / 1_001.0), "29.97 fps");
    }

    #[test]
    fn channel_layouts() {
        assert_eq!(channels(1), "mono");
        assert_eq!(channels(6), "5.1");
        assert_eq!(channels(3), "3 ch");
    }
}
