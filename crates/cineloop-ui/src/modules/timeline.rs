// crates/cineloop-ui/src/modules/timeline.rs
//
// The position slider with the loop window and its two marker glyphs.
//
// Pointer gestures map straight onto the drag commands:
//   press   → DragStart + DragMove(pointer time)
//   move    → DragMove(pointer time)   (readout only, no engine seek)
//   release → DragEnd(pointer time)    (the single seek)
// A plain click is a press and release in the same gesture, so it also
// lands as exactly one seek.

use super::{PlayerModule, PlayerView};
use cineloop_core::commands::PlayerCommand;
use cineloop_core::helpers::geometry::{marker_offset, time_at_offset, time_fraction};
use cineloop_core::helpers::time::format_hms_millis;
use crate::theme::{ACCENT, DARK_BG_0, DARK_BG_4, DARK_BORDER, DARK_TEXT_DIM, LOOP_FILL, MARKER_END, MARKER_START};
use egui::{Align2, Color32, FontId, Id, Pos2, Rect, Sense, Stroke, Ui, Vec2};

const TRACK_H:   f32 = 8.0;
const ROW_H:     f32 = 40.0;
const THUMB_R:   f32 = 7.0;
const GLYPH_W:   f32 = 10.0;
const GLYPH_H:   f32 = 9.0;
/// Horizontal inset so the thumb and glyphs never clip at the ends.
const INSET:     f32 = 10.0;

pub struct TimelineModule {
    /// A press on the slider is in progress (DragStart has been emitted).
    pressed:         bool,
    /// Last time emitted as DragMove, to skip redundant commands while the
    /// pointer stays on the same millisecond.
    last_emitted_ms: Option<u64>,
}

impl TimelineModule {
    pub fn new() -> Self {
        Self { pressed: false, last_emitted_ms: None }
    }
}

impl PlayerModule for TimelineModule {
    fn name(&self) -> &str { "Timeline" }

    fn ui(&mut self, ui: &mut Ui, view: &PlayerView<'_>, cmd: &mut Vec<PlayerCommand>) {
        let enabled  = view.timeline_enabled();
        let duration = view.playback.duration_ms;

        let (row, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), ROW_H), Sense::hover());
        let track = Rect::from_min_max(
            Pos2::new(row.left() + INSET, row.center().y - TRACK_H / 2.0 + 4.0),
            Pos2::new(row.right() - INSET, row.center().y + TRACK_H / 2.0 + 4.0),
        );
        let track_w = track.width();

        let sense = if enabled { Sense::click_and_drag() } else { Sense::hover() };
        let resp  = ui.interact(track.expand2(Vec2::new(INSET, 8.0)), Id::new("position_slider"), sense);

        // ── Pointer → commands ───────────────────────────────────────────────
        if enabled {
            let down     = resp.is_pointer_button_down_on();
            let released = resp.drag_stopped() || resp.clicked();
            let pointer_ms = resp.interact_pointer_pos()
                .or_else(|| ui.ctx().pointer_latest_pos())
                .map(|p| time_at_offset(p.x - track.left(), track_w, duration));

            if let Some(ms) = pointer_ms {
                if (down || released) && !self.pressed {
                    cmd.push(PlayerCommand::DragStart);
                    self.pressed = true;
                }
                if self.pressed && self.last_emitted_ms != Some(ms) {
                    cmd.push(PlayerCommand::DragMove(ms));
                    self.last_emitted_ms = Some(ms);
                }
                if self.pressed && released {
                    cmd.push(PlayerCommand::DragEnd(ms));
                    self.pressed = false;
                    self.last_emitted_ms = None;
                }
            }
            // Button released somewhere egui didn't report to us: finish at
            // the last previewed time so the drag never stays open.
            if self.pressed && !down && !released {
                cmd.push(PlayerCommand::DragEnd(self.last_emitted_ms.unwrap_or(view.displayed_ms)));
                self.pressed = false;
                self.last_emitted_ms = None;
            }
        } else {
            // Media closed or became unseekable mid-gesture; the controller
            // already dropped its drag.
            self.pressed = false;
            self.last_emitted_ms = None;
        }

        // ── Paint ────────────────────────────────────────────────────────────
        let painter = ui.painter();
        painter.rect_filled(track, 3.0, DARK_BG_0);
        painter.rect_stroke(track, 3.0, Stroke::new(1.0, DARK_BORDER), egui::StrokeKind::Outside);

        if !view.has_media() || duration == 0 {
            return;
        }

        let x_at = |ms: u64| track.left() + time_fraction(ms, duration) * track_w;
        let markers = view.markers;

        // Loop window.
        let window = Rect::from_min_max(
            Pos2::new(x_at(markers.start_ms), track.top()),
            Pos2::new(x_at(markers.end_ms), track.bottom()),
        );
        let fill = if markers.enabled { LOOP_FILL } else { LOOP_FILL.gamma_multiply(0.35) };
        painter.rect_filled(window, 2.0, fill);

        // Elapsed portion.
        let head_x = x_at(view.displayed_ms);
        let elapsed = Rect::from_min_max(track.min, Pos2::new(head_x, track.bottom()));
        let played = if enabled { ACCENT.gamma_multiply(0.6) } else { DARK_BG_4 };
        painter.rect_filled(elapsed, 3.0, played);

        // Marker glyphs: downward triangles above the track, centred on
        // their times.
        for (ms, color) in [(markers.start_ms, MARKER_START), (markers.end_ms, MARKER_END)] {
            let left = track.left() + marker_offset(ms, duration, track_w, GLYPH_W);
            let top  = track.top() - GLYPH_H - 2.0;
            let col  = if markers.enabled { color } else { color.gamma_multiply(0.45) };
            painter.add(egui::Shape::convex_polygon(vec![
                Pos2::new(left, top),
                Pos2::new(left + GLYPH_W, top),
                Pos2::new(left + GLYPH_W / 2.0, top + GLYPH_H),
            ], col, Stroke::NONE));
        }

        // Thumb.
        let thumb_col = match (enabled, view.dragging) {
            (false, _)    => Color32::from_gray(90),
            (true, true)  => Color32::WHITE,
            (true, false) => ACCENT,
        };
        painter.circle_filled(Pos2::new(head_x, track.center().y), THUMB_R, thumb_col);

        if resp.hovered() && enabled {
            if let Some(hover) = resp.hover_pos() {
                let ms = time_at_offset(hover.x - track.left(), track_w, duration);
                painter.text(Pos2::new(hover.x, track.bottom() + 2.0), Align2::CENTER_TOP,
                    format_hms_millis(ms), FontId::monospace(10.0), DARK_TEXT_DIM);
            }
        } else if !view.seekable {
            painter.text(row.right_top() + Vec2::new(-INSET, 0.0), Align2::RIGHT_TOP,
                "not seekable", FontId::proportional(10.0), DARK_TEXT_DIM);
        }
    }
}
