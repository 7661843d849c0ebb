use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::Level;

use crate::core::{ComponentLogger, LogContext, LogSink, StoreError, StoreResult};

use super::RetentionPolicy;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a retention policy on a dedicated thread: once at start, then every
/// `interval` until stopped. One thread per policy keeps passes over the
/// same directory from overlapping.
pub struct RetentionWorker {
    name: String,
    log: Arc<dyn LogSink>,
    running: Arc<AtomicBool>,
    passes: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionWorker {
    pub fn spawn(
        mut policy: Box<dyn RetentionPolicy>,
        interval: Duration,
        log: Arc<dyn LogSink>,
    ) -> StoreResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let passes = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));

        let thread_running = running.clone();
        let thread_passes = passes.clone();
        let thread_failures = failures.clone();
        let name = policy.name().to_string();
        let thread_name = name.clone();
        let thread_log = log.clone();

        let handle = std::thread::Builder::new()
            .name("retention".into())
            .spawn(move || {
                let mut last_run: Option<Instant> = None;

                while thread_running.load(Ordering::Relaxed) {
                    if last_run.is_none_or(|t| t.elapsed() >= interval) {
                        if let Err(err) = policy.run() {
                            thread_failures.fetch_add(1, Ordering::Relaxed);
                            let ctx = LogContext::new("RetentionWorker", &thread_name);
                            thread_log.log(
                                Level::Error,
                                &ctx.format("ERROR", &format!("retention pass failed: {}", err)),
                            );
                        }
                        thread_passes.fetch_add(1, Ordering::Relaxed);
                        last_run = Some(Instant::now());
                    }
                    std::thread::sleep(POLL_INTERVAL.min(interval));
                }
            })
            .map_err(|e| StoreError::io("spawn retention worker", e))?;

        Ok(Self {
            name,
            log,
            running,
            passes,
            failures,
            handle: Some(handle),
        })
    }

    /// Completed passes, successful or not.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signals the thread and waits for the current pass to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.error("worker thread panicked");
            }
        }
    }
}

impl ComponentLogger for RetentionWorker {
    fn log_context(&self) -> LogContext {
        LogContext::new("RetentionWorker", &self.name)
    }

    fn log_sink(&self) -> &dyn LogSink {
        self.log.as_ref()
    }
}

impl Drop for RetentionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
