// crates/cineloop-ui/src/modules/monitor.rs
use super::{PlayerModule, PlayerView};
use cineloop_core::commands::PlayerCommand;
use cineloop_core::state::SessionPhase;
use cineloop_media::VideoFrame;
use crate::helpers::format::fit_label;
use crate::theme::{ACCENT, DARK_BORDER, DARK_TEXT_DIM};
use egui::{Color32, Pos2, Rect, Sense, Stroke, Ui, Vec2};

/// Aspect ratio used before the first frame arrives.
const DEFAULT_RATIO: f32 = 16.0 / 9.0;

pub struct MonitorModule {
    /// Last uploaded frame. Held until a newer one arrives so scrub latency
    /// never flashes an empty canvas.
    held_frame: Option<egui::TextureHandle>,
    ratio:      f32,
}

impl MonitorModule {
    pub fn new() -> Self {
        Self { held_frame: None, ratio: DEFAULT_RATIO }
    }

    /// Upload a decoded frame, reusing the texture allocation when the size
    /// is unchanged.
    pub fn present(&mut self, ctx: &egui::Context, frame: VideoFrame) {
        let size  = [frame.width as usize, frame.height as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, &frame.rgba);
        match self.held_frame.as_mut() {
            Some(tex) if tex.size() == size => tex.set(image, egui::TextureOptions::LINEAR),
            _ => {
                self.held_frame = Some(ctx.load_texture("monitor-frame", image, egui::TextureOptions::LINEAR));
            }
        }
        if frame.height > 0 {
            self.ratio = frame.width as f32 / frame.height as f32;
        }
    }

    /// Drop the held frame (media closed or replaced).
    pub fn clear(&mut self) {
        self.held_frame = None;
        self.ratio      = DEFAULT_RATIO;
    }
}

impl PlayerModule for MonitorModule {
    fn name(&self) -> &str { "Monitor" }

    fn ui(&mut self, ui: &mut Ui, view: &PlayerView<'_>, cmd: &mut Vec<PlayerCommand>) {
        let panel_w = ui.available_width();
        let panel_h = ui.available_height().max(80.0);
        let (canvas_w, canvas_h) = {
            let h = panel_w / self.ratio;
            if h <= panel_h { (panel_w, h) } else { (panel_h * self.ratio, panel_h) }
        };

        let (outer_rect, resp) = ui.allocate_exact_size(Vec2::new(panel_w, panel_h), Sense::click());
        let canvas  = Rect::from_center_size(outer_rect.center(), Vec2::new(canvas_w, canvas_h));
        let painter = ui.painter();

        let stroke = if view.phase == SessionPhase::Playing {
            Stroke::new(1.5, ACCENT.gamma_multiply(0.55))
        } else {
            Stroke::new(1.0, DARK_BORDER)
        };
        painter.rect_stroke(canvas.expand(1.0), 4.0, stroke, egui::StrokeKind::Outside);
        painter.rect_filled(canvas, 3.0, Color32::BLACK);

        match (&self.held_frame, view.path) {
            (Some(tex), Some(_)) => {
                painter.image(tex.id(), canvas,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE);
            }
            (_, Some(path)) => {
                // Audio-only media, or the first frame is still decoding.
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                painter.text(canvas.center(), egui::Align2::CENTER_CENTER,
                    fit_label(&name, canvas.width() - 24.0),
                    egui::FontId::proportional(14.0), DARK_TEXT_DIM);
            }
            (_, None) => {
                let hint = if view.engine_ready {
                    "Drop a video here or press Open"
                } else {
                    "NO PLAYBACK ENGINE"
                };
                painter.text(canvas.center(), egui::Align2::CENTER_CENTER,
                    hint, egui::FontId::monospace(14.0), Color32::from_gray(60));
                let mut y = canvas.min.y;
                while y < canvas.max.y {
                    painter.line_segment(
                        [Pos2::new(canvas.min.x, y), Pos2::new(canvas.max.x, y)],
                        Stroke::new(0.5, Color32::from_rgba_unmultiplied(255, 255, 255, 3)));
                    y += 4.0;
                }
            }
        }

        // Click the picture to play or pause; double-click the empty canvas
        // to open a file.
        if resp.double_clicked() && view.path.is_none() && view.engine_ready {
            cmd.push(PlayerCommand::OpenDialog);
        } else if resp.clicked() && view.has_media() {
            cmd.push(PlayerCommand::TogglePlay);
        }
    }
}
