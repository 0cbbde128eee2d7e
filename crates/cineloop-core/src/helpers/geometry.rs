// crates/cineloop-core/src/helpers/geometry.rs
//
// Timeline geometry shared between the slider and the marker glyphs.
//
// Kept here (not in cineloop-ui) so the pointer→time mapping and the marker
// placement rule can be tested without an egui context.

/// Fraction of the media a time represents, clamped to `[0, 1]`.
/// Returns 0 while the duration is unknown.
pub fn time_fraction(time_ms: u64, duration_ms: u64) -> f32 {
    if duration_ms == 0 {
        return 0.0;
    }
    (time_ms.min(duration_ms) as f64 / duration_ms as f64) as f32
}

/// Left offset (relative to the track's left edge) at which to draw a marker
/// glyph of `glyph_width` so that the glyph's centre, not its left edge,
/// sits on `time_ms`.
///
/// ```
/// use cineloop_core::helpers::geometry::marker_offset;
/// // Halfway along a 200px track, a 10px glyph starts at 95px.
/// assert_eq!(marker_offset(30_000, 60_000, 200.0, 10.0), 95.0);
/// ```
pub fn marker_offset(time_ms: u64, duration_ms: u64, track_width: f32, glyph_width: f32) -> f32 {
    time_fraction(time_ms, duration_ms) * track_width - glyph_width / 2.0
}

/// Inverse mapping for pointer interaction: `x` pixels from the track's left
/// edge → milliseconds, clamped to `[0, duration_ms]`.
pub fn time_at_offset(x: f32, track_width: f32, duration_ms: u64) -> u64 {
    if track_width <= 0.0 || duration_ms == 0 {
        return 0;
    }
    let frac = (x / track_width).clamp(0.0, 1.0) as f64;
    ((frac * duration_ms as f64).round() as u64).min(duration_ms)
}
