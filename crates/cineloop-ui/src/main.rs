#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod helpers;
mod modules;
mod theme;

use std::path::PathBuf;

use cineloop_core::log_service::{LogBridge, LogService};
use cineloop_core::PlayerConfig;
use cineloop_media::FfmpegEngine;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// The logger goes in before the config is read, so a warning about a bad
/// `CINELOOP_*` value lands in the log; the ring buffer is resized after.
fn init_logging() -> (PlayerConfig, LogService) {
    let mut log_service = LogService::new(PlayerConfig::default().log_capacity);
    if let Err(e) = LogBridge::new(log_service.sink()).install() {
        eprintln!("[log] could not install logger: {e}");
    }
    let config = PlayerConfig::from_env();
    log_service.set_capacity(config.log_capacity);
    (config, log_service)
}

fn main() -> eframe::Result {
    let (config, log_service) = init_logging();

    // A failed FFmpeg init is not fatal: the window still opens, without
    // playback.
    let engine = match FfmpegEngine::new(log_service.sink()) {
        Ok(engine) => Some(engine),
        Err(e) => {
            log::error!("{e}");
            None
        }
    };

    let initial = std::env::args_os().nth(1).map(PathBuf::from);

    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title("Cineloop")
            .with_inner_size([1180.0, 760.0])
            .with_min_inner_size([720.0, 480.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Cineloop",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(app::CineloopApp::new(cc, config, log_service, engine, initial)))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_config_values_are_logged() {
        std::env::set_var("CINELOOP_TICK_MS", "fast");
        let (config, mut log_service) = init_logging();
        std::env::remove_var("CINELOOP_TICK_MS");

        assert_eq!(config.tick_interval, PlayerConfig::default().tick_interval);
        log_service.pump();
        assert!(log_service.records().any(|r| {
            r.level == log::Level::Warn && r.tag == "config" && r.text.contains("CINELOOP_TICK_MS")
        }));
    }
}
