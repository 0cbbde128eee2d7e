// crates/cineloop-ui/src/modules/transport.rs
use super::{PlayerModule, PlayerView};
use cineloop_core::commands::PlayerCommand;
use cineloop_core::helpers::time::{format_hms, format_hms_millis};
use cineloop_core::state::{PlaybackRate, SessionPhase, StepDirection};
use crate::theme::{ACCENT, DARK_BG_2, DARK_BG_3, DARK_BORDER, DARK_TEXT_DIM, ERROR_TEXT, MARKER_END, MARKER_START};
use egui::{Ui, Color32, Sense, Rect, Pos2, Stroke, Vec2};

// ── Transport bar layout constants ───────────────────────────────────────────
const BAR_H:      f32 = 48.0;
const BTN_SIZE:   f32 = 30.0;   // every button is this exact square
const BTN_R:      f32 = 4.0;    // button corner radius
const ICON_SZ:    f32 = 9.0;    // half-size of painted icon geometry
const GAP:        f32 = 4.0;    // gap between buttons in the same group
const SEP:        f32 = 18.0;   // gap between groups
const TIMECODE_W: f32 = 170.0;
const RATE_W:     f32 = 64.0;
const VOL_W:      f32 = 80.0;
const SEEK_W:     f32 = 96.0;
const MSG_H:      f32 = 16.0;
// CONTENT_W = stop+prev+play+next (4×30 + 3×4)   = 132
//           + sep + timecode(170)                 = 188
//           + sep + loop+in+out+reset (4×30+3×4)  = 150
//           + sep + rate(64)                      =  82
//           + sep + mute(30)+gap+vol(80)          = 132
//           + sep + seek(96)                      = 114
//           ─────────────────────────────────────── 798
const CONTENT_W: f32 = 798.0;

pub struct TransportModule {
    /// Text in the direct-seek field. Kept after submit so a typo can be
    /// corrected in place.
    seek_text: String,
}

impl TransportModule {
    pub fn new() -> Self {
        Self { seek_text: String::new() }
    }

    fn shortcuts(&self, ui: &Ui, view: &PlayerView<'_>, cmd: &mut Vec<PlayerCommand>) {
        if ui.ctx().wants_keyboard_input() || !view.has_media() {
            return;
        }
        ui.input(|i| {
            if i.key_pressed(egui::Key::Space) {
                cmd.push(PlayerCommand::TogglePlay);
            }
            if i.key_pressed(egui::Key::ArrowLeft) {
                cmd.push(PlayerCommand::StepFrame(StepDirection::Backward));
            }
            if i.key_pressed(egui::Key::ArrowRight) {
                cmd.push(PlayerCommand::StepFrame(StepDirection::Forward));
            }
            if i.key_pressed(egui::Key::L) {
                cmd.push(PlayerCommand::ToggleLoop);
            }
            if i.key_pressed(egui::Key::I) {
                cmd.push(PlayerCommand::SetStartMarker);
            }
            if i.key_pressed(egui::Key::O) && !i.modifiers.command {
                cmd.push(PlayerCommand::SetEndMarker);
            }
        });
    }
}

impl PlayerModule for TransportModule {
    fn name(&self) -> &str { "Transport" }

    fn ui(&mut self, ui: &mut Ui, view: &PlayerView<'_>, cmd: &mut Vec<PlayerCommand>) {
        self.shortcuts(ui, view, cmd);

        let media   = view.has_media();
        let seekable = view.timeline_enabled();

        // Allocate the full-width bar, then position every element with
        // coordinate math from bar_rect. No layout pass for the controls, so
        // buttons are always the same pixel size.
        let bar_w = ui.available_width();
        let (bar_rect, _) = ui.allocate_exact_size(Vec2::new(bar_w, BAR_H), Sense::hover());

        let painter = ui.painter().clone();
        painter.rect_filled(bar_rect, BTN_R, DARK_BG_3);
        painter.rect_stroke(bar_rect, BTN_R,
            Stroke::new(1.0, DARK_BORDER), egui::StrokeKind::Outside);

        let cy = bar_rect.center().y;
        // Centre the content; on a narrow window pin it to the left edge.
        let mut x = (bar_rect.center().x - CONTENT_W / 2.0).max(bar_rect.left() + 8.0);

        // ── Helper: one fixed-size transport button ───────────────────────
        // Paints bg + border, calls draw_icon, returns clicked. Disabled
        // buttons are drawn dim and do not sense clicks.
        macro_rules! tbtn {
            ($id:expr, $active:expr, $enabled:expr, $draw_icon:expr) => {{
                let r = Rect::from_min_size(
                    Pos2::new(x, cy - BTN_SIZE / 2.0),
                    Vec2::splat(BTN_SIZE));
                let sense = if $enabled { Sense::click() } else { Sense::hover() };
                let resp = ui.interact(r, ui.id().with($id), sense);
                let (bg, icol) = if !$enabled {
                    (DARK_BG_3, Color32::from_gray(70))
                } else if resp.is_pointer_button_down_on() {
                    (DARK_BG_2.gamma_multiply(0.6), Color32::WHITE)
                } else if resp.hovered() {
                    (DARK_BG_2, ACCENT.linear_multiply(1.2))
                } else if $active {
                    (DARK_BG_3, ACCENT)
                } else {
                    (DARK_BG_3, Color32::from_gray(175))
                };
                painter.rect_filled(r, BTN_R, bg);
                if $enabled && (resp.hovered() || $active) {
                    painter.rect_stroke(r, BTN_R,
                        Stroke::new(1.0, ACCENT.gamma_multiply(0.35)),
                        egui::StrokeKind::Outside);
                }
                $draw_icon(r.center(), icol);
                x += BTN_SIZE;
                $enabled && resp.clicked()
            }};
        }

        // ── Stop ──────────────────────────────────────────────────────────
        if tbtn!("stop", false, media, |c: Pos2, col: Color32| {
            painter.rect_filled(Rect::from_center_size(c, Vec2::splat(ICON_SZ * 1.5)), 1.5, col);
        }) {
            cmd.push(PlayerCommand::Stop);
        }
        x += GAP;

        // ── Previous frame ────────────────────────────────────────────────
        if tbtn!("prev_frame", false, seekable, |c: Pos2, col: Color32| {
            painter.rect_filled(
                Rect::from_center_size(Pos2::new(c.x - ICON_SZ + 0.5, c.y), Vec2::new(2.5, ICON_SZ * 2.0)),
                0.5, col);
            painter.add(egui::Shape::convex_polygon(vec![
                Pos2::new(c.x - ICON_SZ + 4.0, c.y),
                Pos2::new(c.x + ICON_SZ - 1.0, c.y - ICON_SZ + 1.0),
                Pos2::new(c.x + ICON_SZ - 1.0, c.y + ICON_SZ - 1.0),
            ], col, Stroke::NONE));
        }) {
            cmd.push(PlayerCommand::StepFrame(StepDirection::Backward));
        }
        x += GAP;

        // ── Play / Pause ──────────────────────────────────────────────────
        let playing = view.phase == SessionPhase::Playing;
        if tbtn!("play_pause", playing, media, |c: Pos2, col: Color32| {
            if playing {
                for ox in [-ICON_SZ * 0.45, ICON_SZ * 0.45] {
                    painter.rect_filled(
                        Rect::from_center_size(Pos2::new(c.x + ox, c.y), Vec2::new(3.0, ICON_SZ * 1.8)),
                        1.0, col);
                }
            } else {
                painter.add(egui::Shape::convex_polygon(vec![
                    Pos2::new(c.x - ICON_SZ * 0.5, c.y - ICON_SZ),
                    Pos2::new(c.x - ICON_SZ * 0.5, c.y + ICON_SZ),
                    Pos2::new(c.x + ICON_SZ,       c.y),
                ], col, Stroke::NONE));
            }
        }) {
            cmd.push(PlayerCommand::TogglePlay);
        }
        x += GAP;

        // ── Next frame ────────────────────────────────────────────────────
        if tbtn!("next_frame", false, seekable, |c: Pos2, col: Color32| {
            painter.add(egui::Shape::convex_polygon(vec![
                Pos2::new(c.x - ICON_SZ + 1.0, c.y - ICON_SZ + 1.0),
                Pos2::new(c.x - ICON_SZ + 1.0, c.y + ICON_SZ - 1.0),
                Pos2::new(c.x + ICON_SZ - 4.0, c.y),
            ], col, Stroke::NONE));
            painter.rect_filled(
                Rect::from_center_size(Pos2::new(c.x + ICON_SZ - 0.5, c.y), Vec2::new(2.5, ICON_SZ * 2.0)),
                0.5, col);
        }) {
            cmd.push(PlayerCommand::StepFrame(StepDirection::Forward));
        }
        x += SEP;

        // ── Timecode ──────────────────────────────────────────────────────
        let timecode = if media {
            format!("{} / {}", format_hms_millis(view.displayed_ms), format_hms(view.playback.duration_ms))
        } else {
            "--:--:--.--- / --:--:--".to_string()
        };
        painter.text(Pos2::new(x, cy), egui::Align2::LEFT_CENTER, timecode,
            egui::FontId::monospace(12.0),
            if view.dragging { Color32::WHITE } else { ACCENT });
        x += TIMECODE_W + SEP;

        // ── Loop toggle ───────────────────────────────────────────────────
        let looping = view.markers.enabled;
        if tbtn!("loop", looping, media, |c: Pos2, col: Color32| {
            painter.circle_stroke(c, ICON_SZ * 0.8, Stroke::new(1.8, col));
            painter.add(egui::Shape::convex_polygon(vec![
                Pos2::new(c.x + ICON_SZ * 0.8 - 3.5, c.y - 1.0),
                Pos2::new(c.x + ICON_SZ * 0.8 + 3.5, c.y - 1.0),
                Pos2::new(c.x + ICON_SZ * 0.8,       c.y + 3.5),
            ], col, Stroke::NONE));
        }) {
            cmd.push(PlayerCommand::ToggleLoop);
        }
        x += GAP;

        // ── Loop start / end markers ──────────────────────────────────────
        // A flag on a pole; the start flag points right, the end flag left.
        let flag = |c: Pos2, col: Color32, dir: f32, tint: Color32| {
            let pole_x = c.x - dir * ICON_SZ * 0.5;
            painter.line_segment(
                [Pos2::new(pole_x, c.y - ICON_SZ), Pos2::new(pole_x, c.y + ICON_SZ)],
                Stroke::new(2.0, col));
            painter.add(egui::Shape::convex_polygon(vec![
                Pos2::new(pole_x,                        c.y - ICON_SZ),
                Pos2::new(pole_x + dir * ICON_SZ * 1.2,  c.y - ICON_SZ * 0.5),
                Pos2::new(pole_x,                        c.y),
            ], tint, Stroke::NONE));
        };
        if tbtn!("mark_in", false, media, |c: Pos2, col: Color32| flag(c, col, 1.0, if media { MARKER_START } else { col })) {
            cmd.push(PlayerCommand::SetStartMarker);
        }
        x += GAP;
        if tbtn!("mark_out", false, media, |c: Pos2, col: Color32| flag(c, col, -1.0, if media { MARKER_END } else { col })) {
            cmd.push(PlayerCommand::SetEndMarker);
        }
        x += GAP;

        // ── Reset markers ─────────────────────────────────────────────────
        if tbtn!("reset_markers", false, media, |c: Pos2, col: Color32| {
            for ox in [-ICON_SZ, ICON_SZ] {
                painter.line_segment(
                    [Pos2::new(c.x + ox, c.y - ICON_SZ * 0.6), Pos2::new(c.x + ox, c.y + ICON_SZ * 0.6)],
                    Stroke::new(2.0, col));
            }
            painter.line_segment(
                [Pos2::new(c.x - ICON_SZ, c.y), Pos2::new(c.x + ICON_SZ, c.y)],
                Stroke::new(1.2, col));
        }) {
            cmd.push(PlayerCommand::ResetMarkers);
        }
        x += SEP;

        // ── Playback rate ─────────────────────────────────────────────────
        let rate_rect = Rect::from_min_size(Pos2::new(x, cy - BTN_SIZE / 2.0 + 3.0), Vec2::new(RATE_W, BTN_SIZE));
        ui.scope_builder(egui::UiBuilder::new().max_rect(rate_rect), |ui| {
            ui.add_enabled_ui(media, |ui| {
                let current = view.playback.rate;
                egui::ComboBox::from_id_salt("playback_rate")
                    .selected_text(current.to_string())
                    .width(RATE_W)
                    .show_ui(ui, |ui| {
                        for rate in PlaybackRate::PRESETS {
                            if ui.selectable_label(rate == current, rate.to_string()).clicked()
                                && rate != current
                            {
                                cmd.push(PlayerCommand::SetRate(rate));
                            }
                        }
                    });
            });
        });
        x += RATE_W + SEP;

        // ── Mute ──────────────────────────────────────────────────────────
        let muted   = view.muted;
        let vol_val = view.volume;
        if tbtn!("mute", muted, view.engine_ready, |c: Pos2, col: Color32| {
            painter.add(egui::Shape::convex_polygon(vec![
                Pos2::new(c.x - ICON_SZ + 1.0, c.y - ICON_SZ * 0.4),
                Pos2::new(c.x - ICON_SZ + 1.0, c.y + ICON_SZ * 0.4),
                Pos2::new(c.x + 1.0,           c.y + ICON_SZ * 0.9),
                Pos2::new(c.x + 1.0,           c.y - ICON_SZ * 0.9),
            ], col, Stroke::NONE));
            if !muted && vol_val > 0.0 {
                painter.circle_stroke(Pos2::new(c.x + 2.0, c.y), ICON_SZ * 0.85,
                    Stroke::new(1.5, col.gamma_multiply(0.65)));
            }
            if !muted && vol_val > 0.5 {
                painter.circle_stroke(Pos2::new(c.x + 2.0, c.y), ICON_SZ * 1.45,
                    Stroke::new(1.5, col.gamma_multiply(0.35)));
            }
            if muted {
                let ox = c.x + ICON_SZ * 0.35;
                let mute_col = Color32::from_rgb(200, 60, 60);
                painter.line_segment(
                    [Pos2::new(ox - 4.0, c.y - 4.0), Pos2::new(ox + 4.0, c.y + 4.0)],
                    Stroke::new(1.5, mute_col));
                painter.line_segment(
                    [Pos2::new(ox + 4.0, c.y - 4.0), Pos2::new(ox - 4.0, c.y + 4.0)],
                    Stroke::new(1.5, mute_col));
            }
        }) {
            cmd.push(PlayerCommand::ToggleMute);
        }
        x += GAP;

        // ── Volume ────────────────────────────────────────────────────────
        // ui.put() places the widget at an exact rect, aligned with the
        // painted buttons.
        let vol_rect = Rect::from_min_size(Pos2::new(x, cy - BTN_SIZE / 2.0), Vec2::new(VOL_W, BTN_SIZE));
        let mut vol = view.volume;
        if ui.put(vol_rect,
            egui::Slider::new(&mut vol, 0.0_f32..=1.0_f32)
                .show_value(false)
                .trailing_fill(true)
        ).changed() {
            cmd.push(PlayerCommand::SetVolume(vol));
        }
        x += VOL_W + SEP;

        // ── Direct seek ───────────────────────────────────────────────────
        let seek_rect = Rect::from_min_size(Pos2::new(x, cy - 11.0), Vec2::new(SEEK_W, 22.0));
        let seek_resp = ui.put(seek_rect,
            egui::TextEdit::singleline(&mut self.seek_text)
                .hint_text("hh:mm:ss")
                .font(egui::TextStyle::Monospace)
                .interactive(seekable));
        if seek_resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            cmd.push(PlayerCommand::SubmitSeekText(self.seek_text.trim().to_string()));
            seek_resp.request_focus();
        }
        // Consume Enter so the key doesn't also reach the shortcuts.
        if seek_resp.has_focus() {
            ui.input_mut(|i| i.events.retain(|e| {
                !matches!(e, egui::Event::Key { key: egui::Key::Enter, pressed: true, .. })
            }));
        }

        // ── Inline seek message ───────────────────────────────────────────
        // Always allocated so the layout below doesn't jump when it appears.
        let (msg_rect, _) = ui.allocate_exact_size(Vec2::new(bar_w, MSG_H), Sense::hover());
        match view.seek_message {
            Some(msg) => {
                ui.painter().text(Pos2::new(seek_rect.right(), msg_rect.center().y),
                    egui::Align2::RIGHT_CENTER, msg, egui::FontId::proportional(11.0), ERROR_TEXT);
            }
            None if !view.engine_ready => {
                ui.painter().text(msg_rect.left_center() + Vec2::new(8.0, 0.0),
                    egui::Align2::LEFT_CENTER, "Playback engine unavailable",
                    egui::FontId::proportional(11.0), DARK_TEXT_DIM);
            }
            None => {}
        }
    }
}
