// src/theme.rs
use egui::{Context, Color32, Stroke, Visuals, Style};

use cineloop_core::log_service::LogOrigin;
use log::Level;

// ── Palette ──────────────────────────────────────────────────────────────────
pub const ACCENT:        Color32 = Color32::from_rgb( 90, 190, 230);
pub const ACCENT_DIM:    Color32 = Color32::from_rgb( 40, 110, 150);
pub const ACCENT_HOVER:  Color32 = Color32::from_rgb(140, 215, 245);

pub const DARK_BG_0:     Color32 = Color32::from_rgb( 12,  13,  16);
pub const DARK_BG_1:     Color32 = Color32::from_rgb( 19,  20,  24);
pub const DARK_BG_2:     Color32 = Color32::from_rgb( 27,  28,  34);
pub const DARK_BG_3:     Color32 = Color32::from_rgb( 37,  38,  46);
pub const DARK_BG_4:     Color32 = Color32::from_rgb( 49,  50,  60);

pub const DARK_TEXT:     Color32 = Color32::from_rgb(220, 222, 230);
pub const DARK_TEXT_DIM: Color32 = Color32::from_rgb(120, 122, 138);
pub const DARK_BORDER:   Color32 = Color32::from_rgb( 55,  57,  68);

/// Loop window fill on the timeline, and the marker glyphs.
pub const LOOP_FILL:     Color32 = Color32::from_rgba_premultiplied(60, 140, 90, 70);
pub const MARKER_START:  Color32 = Color32::from_rgb( 90, 200, 120);
pub const MARKER_END:    Color32 = Color32::from_rgb(230, 120,  80);

pub const NOTICE_BG:     Color32 = Color32::from_rgb( 90,  40,  40);
pub const ERROR_TEXT:    Color32 = Color32::from_rgb(235, 110, 110);

pub fn level_color(level: Level) -> Color32 {
    match level {
        Level::Error => ERROR_TEXT,
        Level::Warn  => Color32::from_rgb(230, 190,  90),
        Level::Info  => DARK_TEXT,
        Level::Debug => DARK_TEXT_DIM,
        Level::Trace => Color32::from_gray(90),
    }
}

pub fn origin_color(origin: LogOrigin) -> Color32 {
    match origin {
        LogOrigin::App    => ACCENT,
        LogOrigin::Engine => Color32::from_rgb(190, 150, 230),
    }
}

pub fn configure_style(ctx: &Context) {
    let mut style = Style::default();

    style.spacing.item_spacing     = egui::vec2(6.0, 5.0);
    style.spacing.window_margin    = egui::Margin::same(10);
    style.spacing.button_padding   = egui::vec2(10.0, 5.0);
    style.spacing.scroll.bar_width = 8.0;
    style.spacing.indent           = 12.0;

    let cr = egui::CornerRadius::same(4);

    let mut v = Visuals::dark();
    v.panel_fill             = DARK_BG_1;
    v.window_fill            = DARK_BG_2;
    v.faint_bg_color         = DARK_BG_0;
    v.extreme_bg_color       = DARK_BG_0;
    v.window_stroke          = Stroke::new(1.0, DARK_BORDER);

    v.selection.bg_fill      = ACCENT_DIM;
    v.selection.stroke       = Stroke::new(1.0, Color32::WHITE);
    v.hyperlink_color        = ACCENT_HOVER;

    for (w, bg, stroke, fg) in [
        (&mut v.widgets.noninteractive, DARK_BG_2, Stroke::new(1.0, DARK_BORDER), Stroke::new(1.0, DARK_TEXT_DIM)),
        (&mut v.widgets.inactive,       DARK_BG_3, Stroke::new(1.0, DARK_BORDER), Stroke::new(1.0, DARK_TEXT)),
        (&mut v.widgets.hovered,        DARK_BG_4, Stroke::new(1.0, ACCENT_DIM),  Stroke::new(1.5, ACCENT_HOVER)),
        (&mut v.widgets.active,         ACCENT_DIM, Stroke::new(1.0, ACCENT),     Stroke::new(2.0, Color32::WHITE)),
        (&mut v.widgets.open,           DARK_BG_4, Stroke::new(1.0, ACCENT_DIM),  Stroke::new(1.5, ACCENT_HOVER)),
    ] {
        w.bg_fill       = bg;
        w.weak_bg_fill  = bg;
        w.bg_stroke     = stroke;
        w.fg_stroke     = fg;
        w.corner_radius = cr;
    }

    v.override_text_color = Some(DARK_TEXT);
    v.window_corner_radius = cr;
    v.menu_corner_radius   = cr;

    style.visuals = v;
    ctx.set_style(style);
}
