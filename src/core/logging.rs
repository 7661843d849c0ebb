use std::sync::atomic::{AtomicU64, Ordering};

use log::Level;

use super::timestamp::utc_ns_now;

// Process-wide sequence number for correlating lines across components.
static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    pub stream: Option<String>,
    pub sequence: u64,
    pub timestamp_ns: u64,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            stream: None,
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp_ns: utc_ns_now(),
        }
    }

    pub fn with_stream(mut self, stream: &str) -> Self {
        self.stream = Some(stream.to_string());
        self
    }

    pub fn format(&self, level: &str, message: &str) -> String {
        let stream_info = match &self.stream {
            Some(stream) => format!(" stream={}", stream),
            None => String::new(),
        };

        format!(
            "[{}][seq={:06}][{}:{}{}] {}",
            level, self.sequence, self.component, self.instance_id, stream_info, message
        )
    }
}

/// Destination for component log lines.
///
/// Components take this as a constructor argument instead of writing to a
/// global logger, so tests can capture or silence output per instance.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, line: &str);
}

/// Forwards to the `log` facade (and whatever backend the binary installed).
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeSink;

impl LogSink for FacadeSink {
    fn log(&self, level: Level, line: &str) {
        log::log!(level, "{}", line);
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _line: &str) {}
}

// Helper trait for uniform component logging
pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;
    fn log_sink(&self) -> &dyn LogSink;

    fn emit(&self, level: Level, message: &str) {
        let ctx = self.log_context();
        self.log_sink().log(level, &ctx.format(level.as_str(), message));
    }

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
}
