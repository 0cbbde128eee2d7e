// crates/cineloop-core/src/config.rs
//
// Runtime tunables. Defaults cover normal use; `from_env` lets a developer
// override a few of them without a rebuild. Nothing is persisted.

use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    /// Position-refresh timer period (≈30 Hz).
    pub tick_interval:         Duration,
    /// Ring-buffer capacity of the log service.
    pub log_capacity:          usize,
    /// Timeout handed to the engine's asynchronous parse.
    pub parse_timeout:         Duration,
    /// Delay before the advisory post-seek position check.
    pub seek_verify_delay:     Duration,
    /// Distance from the target beyond which that check logs a warning.
    pub seek_verify_tolerance_ms: u64,
    /// Frame rate assumed for frame stepping until metadata reports one.
    pub default_fps:           f64,
    /// Smallest loop window the marker setters will produce.
    pub min_loop_span_ms:      u64,
    /// Lifetime of inline seek-field messages.
    pub message_lifetime:      Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_interval:            Duration::from_millis(33),
            log_capacity:             2_000,
            parse_timeout:            Duration::from_secs(5),
            seek_verify_delay:        Duration::from_millis(100),
            seek_verify_tolerance_ms: 250,
            default_fps:              25.0,
            min_loop_span_ms:         1_000,
            message_lifetime:         Duration::from_secs(2),
        }
    }
}

impl PlayerConfig {
    /// Defaults overridden by `CINELOOP_TICK_MS`, `CINELOOP_LOG_CAPACITY`,
    /// `CINELOOP_PARSE_TIMEOUT_MS` and `CINELOOP_DEFAULT_FPS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(ms) = read::<u64>(&lookup, "CINELOOP_TICK_MS").filter(|ms| *ms > 0) {
            cfg.tick_interval = Duration::from_millis(ms);
        }
        if let Some(cap) = read::<usize>(&lookup, "CINELOOP_LOG_CAPACITY").filter(|c| *c > 0) {
            cfg.log_capacity = cap;
        }
        if let Some(ms) = read::<u64>(&lookup, "CINELOOP_PARSE_TIMEOUT_MS") {
            cfg.parse_timeout = Duration::from_millis(ms);
        }
        if let Some(fps) = read::<f64>(&lookup, "CINELOOP_DEFAULT_FPS").filter(|f| *f > 0.0) {
            cfg.default_fps = fps;
        }
        cfg
    }
}

fn read<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v)  => Some(v),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
