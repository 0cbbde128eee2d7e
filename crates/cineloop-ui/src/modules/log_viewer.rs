// crates/cineloop-ui/src/modules/log_viewer.rs
//
// Developer log window. While open it holds a live subscription to the
// LogService; closing it unsubscribes. Records are copied into a local
// buffer of the service's capacity so filtering never touches the service.

use std::collections::VecDeque;
use std::time::UNIX_EPOCH;

use cineloop_core::commands::PlayerCommand;
use cineloop_core::helpers::time::format_hms_millis;
use cineloop_core::log_service::{LogOrigin, LogRecord, LogService};
use cineloop_core::observer::SubscriberId;
use crossbeam_channel::Receiver;
use egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};
use log::Level;

use crate::theme::{level_color, origin_color, DARK_TEXT_DIM};

const ROW_H: f32 = 16.0;
const MS_PER_DAY: u64 = 86_400_000;

/// Which records the viewer shows.
#[derive(Clone, Debug, PartialEq)]
pub struct LogFilter {
    /// Least severe level shown.
    pub min_level:   Level,
    pub show_app:    bool,
    pub show_engine: bool,
    /// Case-insensitive substring of tag or text. Empty matches everything.
    pub search:      String,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self { min_level: Level::Debug, show_app: true, show_engine: true, search: String::new() }
    }
}

impl LogFilter {
    pub fn matches(&self, record: &LogRecord) -> bool {
        if record.level > self.min_level {
            return false;
        }
        let origin_ok = match record.origin {
            LogOrigin::App    => self.show_app,
            LogOrigin::Engine => self.show_engine,
        };
        if !origin_ok {
            return false;
        }
        let needle = self.search.trim();
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        record.text.to_lowercase().contains(&needle) || record.tag.to_lowercase().contains(&needle)
    }
}

pub struct LogViewer {
    feed:        Option<(SubscriberId, Receiver<LogRecord>)>,
    records:     VecDeque<LogRecord>,
    capacity:    usize,
    filter:      LogFilter,
    auto_scroll: bool,
}

impl LogViewer {
    pub fn new() -> Self {
        Self {
            feed:        None,
            records:     VecDeque::new(),
            capacity:    0,
            filter:      LogFilter::default(),
            auto_scroll: true,
        }
    }

    pub fn is_open(&self) -> bool { self.feed.is_some() }

    pub fn toggle(&mut self, service: &mut LogService) {
        match self.feed.take() {
            Some((id, _)) => {
                service.unsubscribe(id);
                self.records.clear();
            }
            None => {
                self.capacity = service.capacity();
                self.records  = service.records().cloned().collect();
                self.feed     = Some(service.subscribe());
            }
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn drain_feed(&mut self) {
        let Some((_, rx)) = &self.feed else { return };
        for record in rx.try_iter() {
            if self.records.len() >= self.capacity.max(1) {
                self.records.pop_front();
            }
            self.records.push_back(record);
        }
    }

    pub fn show(&mut self, ctx: &egui::Context, service: &LogService, cmd: &mut Vec<PlayerCommand>) {
        if !self.is_open() {
            return;
        }
        self.drain_feed();

        let mut open = true;
        egui::Window::new("Log")
            .open(&mut open)
            .default_size([760.0, 360.0])
            .resizable(true)
            .show(ctx, |ui| {
                self.toolbar(ui, cmd);
                ui.separator();
                self.table(ui);
                ui.separator();
                ui.label(RichText::new(format!(
                    "{} of {} records · {} evicted since start",
                    self.records.iter().filter(|r| self.filter.matches(r)).count(),
                    self.records.len(),
                    service.evicted(),
                )).size(10.0).color(DARK_TEXT_DIM));
            });
        if !open {
            cmd.push(PlayerCommand::ToggleLogViewer);
        }
    }

    fn toolbar(&mut self, ui: &mut Ui, cmd: &mut Vec<PlayerCommand>) {
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("log_level")
                .selected_text(self.filter.min_level.as_str())
                .width(70.0)
                .show_ui(ui, |ui| {
                    for level in [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace] {
                        ui.selectable_value(&mut self.filter.min_level, level, level.as_str());
                    }
                });
            ui.checkbox(&mut self.filter.show_app, "App");
            ui.checkbox(&mut self.filter.show_engine, "Engine");
            ui.add(egui::TextEdit::singleline(&mut self.filter.search)
                .hint_text("search…")
                .desired_width(160.0));
            ui.checkbox(&mut self.auto_scroll, "Auto-scroll");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Export…").clicked() {
                    cmd.push(PlayerCommand::ExportLog);
                }
                if ui.button("Clear").clicked() {
                    cmd.push(PlayerCommand::ClearLog);
                }
            });
        });
    }

    fn table(&self, ui: &mut Ui) {
        let rows: Vec<&LogRecord> = self.records.iter().filter(|r| self.filter.matches(r)).collect();
        let height = (ui.available_height() - 24.0).max(80.0);

        TableBuilder::new(ui)
            .striped(true)
            .stick_to_bottom(self.auto_scroll)
            .max_scroll_height(height)
            .column(Column::exact(92.0))
            .column(Column::exact(46.0))
            .column(Column::exact(54.0))
            .column(Column::exact(58.0))
            .column(Column::remainder().clip(true))
            .header(ROW_H + 2.0, |mut header| {
                for title in ["Time (UTC)", "Level", "Origin", "Tag", "Message"] {
                    header.col(|ui| { ui.strong(title); });
                }
            })
            .body(|body| {
                body.rows(ROW_H, rows.len(), |mut row| {
                    let record = rows[row.index()];
                    row.col(|ui| {
                        ui.monospace(time_of_day(record));
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(record.level.as_str()).color(level_color(record.level)));
                    });
                    row.col(|ui| {
                        let origin = match record.origin {
                            LogOrigin::App    => "app",
                            LogOrigin::Engine => "engine",
                        };
                        ui.label(RichText::new(origin).color(origin_color(record.origin)));
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(&record.tag).color(DARK_TEXT_DIM));
                    });
                    row.col(|ui| {
                        ui.label(&record.text);
                    });
                });
            });
    }
}

fn time_of_day(record: &LogRecord) -> String {
    let ms = record.at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    format_hms_millis(ms % MS_PER_DAY)
}
