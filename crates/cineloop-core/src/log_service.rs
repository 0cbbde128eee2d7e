// crates/cineloop-core/src/log_service.rs
//
// LogService: the explicitly owned log store behind the developer log viewer.
//
//   producers ──LogSink (bounded crossbeam queue)──▶ LogService::pump()
//                                                     ├── ring buffer (oldest evicted)
//                                                     └── live viewers (Notifier)
//
// Producers are the `log` facade (via LogBridge) and the engine's worker
// threads, which push structured {level, tag, text} records. Neither touches
// the ring buffer: only the owner thread does, inside `pump()`.

use std::collections::VecDeque;
use std::time::SystemTime;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::{Deserialize, Serialize};

use crate::observer::{Notifier, SubscriberId};

/// Queue depth between producers and `pump()`. Records beyond this are
/// dropped rather than blocking an engine thread.
const QUEUE_DEPTH: usize = 4_096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOrigin {
    App,
    Engine,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Monotonic sequence number assigned by `pump()`.
    pub seq:    u64,
    pub at:     SystemTime,
    pub level:  Level,
    pub origin: LogOrigin,
    /// Subsystem, e.g. `sync`, `decode`, `audio`.
    pub tag:    String,
    pub text:   String,
}

/// Cloneable, thread-safe producer handle.
#[derive(Clone)]
pub struct LogSink {
    tx: Sender<LogRecord>,
}

impl LogSink {
    pub fn push(&self, level: Level, origin: LogOrigin, tag: &str, text: impl Into<String>) {
        let record = LogRecord {
            seq: 0,
            at: SystemTime::now(),
            level,
            origin,
            tag: tag.to_string(),
            text: text.into(),
        };
        // Full queue: drop. Disconnected: the service is gone, nothing to do.
        if let Err(TrySendError::Full(_)) = self.tx.try_send(record) {
            eprintln!("[log] queue full, dropping record");
        }
    }

    /// Shorthand for engine worker threads.
    pub fn engine(&self, level: Level, tag: &str, text: impl Into<String>) {
        self.push(level, LogOrigin::Engine, tag, text);
    }
}

pub struct LogService {
    capacity: usize,
    records:  VecDeque<LogRecord>,
    next_seq: u64,
    evicted:  u64,
    tx:       Sender<LogRecord>,
    rx:       Receiver<LogRecord>,
    viewers:  Notifier<LogRecord>,
}

impl LogService {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(QUEUE_DEPTH);
        Self {
            capacity,
            records:  VecDeque::with_capacity(capacity),
            next_seq: 0,
            evicted:  0,
            tx,
            rx,
            viewers:  Notifier::new(),
        }
    }

    pub fn sink(&self) -> LogSink {
        LogSink { tx: self.tx.clone() }
    }

    /// Drain queued records into the ring buffer and fan them out to live
    /// viewers. Call once per frame on the owning thread. Returns the number
    /// of records ingested.
    pub fn pump(&mut self) -> usize {
        let mut n = 0;
        while let Ok(mut record) = self.rx.try_recv() {
            record.seq = self.next_seq;
            self.next_seq += 1;
            self.viewers.notify(&record);
            if self.records.len() == self.capacity {
                self.records.pop_front();
                self.evicted += 1;
            }
            self.records.push_back(record);
            n += 1;
        }
        n
    }

    pub fn records(&self) -> impl DoubleEndedIterator<Item = &LogRecord> + ExactSizeIterator {
        self.records.iter()
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn capacity(&self) -> usize { self.capacity }

    /// Resize the ring buffer. Shrinking evicts the oldest records; queued
    /// records not yet pumped are untouched.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.records.len() > self.capacity {
            self.records.pop_front();
            self.evicted += 1;
        }
    }

    /// Records dropped from the front since start-up.
    pub fn evicted(&self) -> u64 { self.evicted }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Live feed of every record ingested after this call.
    pub fn subscribe(&mut self) -> (SubscriberId, Receiver<LogRecord>) {
        self.viewers.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.viewers.unsubscribe(id)
    }

    /// Buffered records as JSON lines.
    pub fn export_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for r in &self.records {
            out.push_str(&serde_json::to_string(r)?);
            out.push('\n');
        }
        Ok(out)
    }
}

// ── log facade bridge ─────────────────────────────────────────────────────────

/// `log::Log` implementation that feeds the LogService and mirrors to stderr
/// through env_logger (honouring `RUST_LOG`, default `info`).
pub struct LogBridge {
    sink:   LogSink,
    stderr: env_logger::Logger,
}

impl LogBridge {
    pub fn new(sink: LogSink) -> Self {
        let stderr = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        ).build();
        Self { sink, stderr }
    }

    /// Install as the global logger. Debug records from this workspace always
    /// reach the viewer, whatever `RUST_LOG` says.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let max = self.stderr.filter().max(LevelFilter::Debug);
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max);
        Ok(())
    }

    fn is_ours(target: &str) -> bool {
        target.starts_with("cineloop")
    }
}

/// `cineloop_core::sync` → `sync`.
fn tag_for_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata)
            || (Self::is_ours(metadata.target()) && metadata.level() <= Level::Debug)
            || metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.stderr.matches(record) {
            self.stderr.log(record);
        }
        let to_viewer = record.level() <= Level::Info
            || (Self::is_ours(record.target()) && record.level() <= Level::Debug);
        if to_viewer {
            self.sink.push(
                record.level(),
                LogOrigin::App,
                tag_for_target(record.target()),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {
        self.stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_n(sink: &LogSink, n: usize) {
        for i in 0..n {
            sink.engine(Level::Info, "decode", format!("frame {i}"));
        }
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut svc = LogService::new(3);
        push_n(&svc.sink(), 5);
        assert_eq!(svc.pump(), 5);
        let texts: Vec<&str> = svc.records().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["frame 2", "frame 3", "frame 4"]);
        assert_eq!(svc.evicted(), 2);
        assert_eq!(svc.len(), 3);
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let mut svc = LogService::new(10);
        push_n(&svc.sink(), 2);
        svc.pump();
        push_n(&svc.sink(), 2);
        svc.pump();
        let seqs: Vec<u64> = svc.records().map(|r| r.seq).collect();
        assert_eq!(seqs, [0, 1, 2, 3]);
    }

    #[test]
    fn sink_works_across_threads() {
        let mut svc = LogService::new(10);
        let sink = svc.sink();
        std::thread::spawn(move || sink.engine(Level::Warn, "probe", "slow parse"))
            .join()
            .unwrap();
        svc.pump();
        let r = svc.records().next().unwrap();
        assert_eq!((r.origin, r.level, r.tag.as_str()), (LogOrigin::Engine, Level::Warn, "probe"));
    }

    #[test]
    fn viewers_see_only_records_after_subscribing() {
        let mut svc = LogService::new(10);
        push_n(&svc.sink(), 1);
        svc.pump();
        let (id, rx) = svc.subscribe();
        push_n(&svc.sink(), 2);
        svc.pump();
        assert_eq!(rx.try_iter().count(), 2);
        assert!(svc.unsubscribe(id));
        push_n(&svc.sink(), 1);
        svc.pump();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn clear_keeps_sequence_running() {
        let mut svc = LogService::new(4);
        push_n(&svc.sink(), 2);
        svc.pump();
        svc.clear();
        assert!(svc.is_empty());
        push_n(&svc.sink(), 1);
        svc.pump();
        assert_eq!(svc.records().next().map(|r| r.seq), Some(2));
    }

    #[test]
    fn export_is_one_json_object_per_line() {
        let mut svc = LogService::new(4);
        push_n(&svc.sink(), 2);
        svc.pump();
        let out = svc.export_json_lines().unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LogRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.text, "frame 0");
    }

    #[test]
    fn resizing_keeps_queued_records_and_trims_oldest() {
        let mut svc = LogService::new(2_000);
        push_n(&svc.sink(), 3);
        svc.pump();
        // Queued before the resize, pumped after.
        push_n(&svc.sink(), 2);
        svc.set_capacity(4);
        assert_eq!(svc.capacity(), 4);
        assert_eq!(svc.len(), 3);
        svc.pump();
        let texts: Vec<_> = svc.records().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["frame 1", "frame 2", "frame 0", "frame 1"]);
        assert_eq!(svc.evicted(), 1);

        svc.set_capacity(1);
        assert_eq!(svc.len(), 1);
        assert_eq!(svc.evicted(), 4);
    }

    #[test]
    fn tags_come_from_module_path() {
        assert_eq!(tag_for_target("cineloop_core::sync"), "sync");
        assert_eq!(tag_for_target("eframe"), "eframe");
    }
}
