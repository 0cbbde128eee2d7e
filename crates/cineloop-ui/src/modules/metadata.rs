// crates/cineloop-ui/src/modules/metadata.rs
use super::{PlayerModule, PlayerView};
use cineloop_core::codec::display_name;
use cineloop_core::commands::PlayerCommand;
use cineloop_core::helpers::time::format_hms_millis;
use cineloop_core::media_types::TrackInfo;
use cineloop_core::state::SessionPhase;
use crate::helpers::format::{bitrate, channels, fit_label, frame_rate, track_kind};
use crate::theme::{DARK_BG_2, DARK_TEXT_DIM};
use egui::{RichText, Ui};

pub struct MetadataModule;

impl PlayerModule for MetadataModule {
    fn name(&self) -> &str { "Media Info" }

    fn ui(&mut self, ui: &mut Ui, view: &PlayerView<'_>, cmd: &mut Vec<PlayerCommand>) {
        egui::Frame::new()
            .fill(DARK_BG_2)
            .inner_margin(egui::Margin { left: 8, right: 8, top: 5, bottom: 5 })
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(format!("ℹ {}", self.name())).size(12.0).strong());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.add_enabled(view.path.is_some(), egui::Button::new("Close")).clicked() {
                            cmd.push(PlayerCommand::CloseMedia);
                        }
                    });
                });
            });
        ui.add_space(6.0);

        let Some(path) = view.path else {
            ui.label(RichText::new("No media loaded").size(11.0).color(DARK_TEXT_DIM));
            return;
        };

        let name = path.file_name().unwrap_or_default().to_string_lossy();
        ui.label(RichText::new(fit_label(&name, ui.available_width())).strong())
            .on_hover_text(path.display().to_string());
        ui.add_space(4.0);

        egui::Grid::new("media_summary")
            .num_columns(2)
            .spacing([10.0, 3.0])
            .show(ui, |ui| {
                row(ui, "Status", phase_label(view.phase));
                let duration = if view.playback.duration_ms > 0 {
                    format_hms_millis(view.playback.duration_ms)
                } else {
                    "unknown".to_string()
                };
                row(ui, "Duration", &duration);
                if let Some(container) = view.description.and_then(|d| d.container.as_deref()) {
                    row(ui, "Container", container);
                }
                row(ui, "Seekable", if view.seekable { "yes" } else { "no" });
            });

        ui.add_space(8.0);
        ui.separator();

        if view.tracks.is_empty() {
            let msg = if view.description.is_none() { "Reading tracks…" } else { "No tracks reported" };
            ui.label(RichText::new(msg).size(11.0).color(DARK_TEXT_DIM));
            return;
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            for track in view.tracks {
                track_section(ui, track);
                ui.add_space(6.0);
            }
        });
    }
}

fn track_section(ui: &mut Ui, track: &TrackInfo) {
    ui.label(RichText::new(format!("#{}  {}", track.index, track_kind(track.kind))).strong().size(12.0));
    egui::Grid::new(("track", track.index))
        .num_columns(2)
        .spacing([10.0, 2.0])
        .show(ui, |ui| {
            row(ui, "Codec", &display_name(track));
            if let Some((w, h)) = track.dimensions {
                row(ui, "Resolution", &format!("{w} × {h}"));
            }
            if let Some(fps) = track.fps() {
                row(ui, "Frame rate", &frame_rate(fps));
            }
            if let Some(rate) = track.sample_rate {
                row(ui, "Sample rate", &format!("{rate} Hz"));
            }
            if let Some(n) = track.channels {
                row(ui, "Channels", &channels(n));
            }
            if let Some(bps) = track.bitrate {
                row(ui, "Bitrate", &bitrate(bps));
            }
            if let Some(lang) = &track.language {
                row(ui, "Language", lang);
            }
        });
}

fn row(ui: &mut Ui, key: &str, value: &str) {
    ui.label(RichText::new(key).size(11.0).color(DARK_TEXT_DIM));
    ui.label(RichText::new(value).size(11.0));
    ui.end_row();
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::NoMedia => "no media",
        SessionPhase::Loading => "loading…",
        SessionPhase::Ready   => "ready",
        SessionPhase::Playing => "playing",
        SessionPhase::Paused  => "paused",
        SessionPhase::Closed  => "closed",
    }
}
