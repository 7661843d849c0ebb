use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::timestamp::age_secs;
use crate::core::{ComponentLogger, FacadeSink, LogContext, LogSink, StoreError, StoreResult};

use super::RetentionPolicy;
use super::accountant::{SegmentFile, directory_size, list_files_by_age};

/// How the cleanup loop learns the directory size, initially and after each
/// deletion.
pub trait SizeProbe {
    fn measure(&mut self, dir: &Path) -> StoreResult<u64>;

    fn after_removal(&mut self, dir: &Path, removed: &SegmentFile) -> StoreResult<u64>;
}

/// Rescans the whole directory every time. Quadratic in the number of files
/// evicted per pass, but always reflects what is actually on disk, including
/// bytes the active segment wrote in the meantime.
#[derive(Debug, Default, Clone, Copy)]
pub struct RescanProbe;

impl SizeProbe for RescanProbe {
    fn measure(&mut self, dir: &Path) -> StoreResult<u64> {
        directory_size(dir)
    }

    fn after_removal(&mut self, dir: &Path, _removed: &SegmentFile) -> StoreResult<u64> {
        directory_size(dir)
    }
}

/// Scans once, then subtracts the size of each removed file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackedProbe {
    current: u64,
}

impl SizeProbe for TrackedProbe {
    fn measure(&mut self, dir: &Path) -> StoreResult<u64> {
        self.current = directory_size(dir)?;
        Ok(self.current)
    }

    fn after_removal(&mut self, _dir: &Path, removed: &SegmentFile) -> StoreResult<u64> {
        self.current = self.current.saturating_sub(removed.size);
        Ok(self.current)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub initial_bytes: u64,
    pub final_bytes: u64,
    pub deleted: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty()
    }
}

struct Janitor<'a> {
    dir: &'a Path,
    log: &'a dyn LogSink,
}

impl ComponentLogger for Janitor<'_> {
    fn log_context(&self) -> LogContext {
        LogContext::new("Retention", &self.dir.to_string_lossy())
    }

    fn log_sink(&self) -> &dyn LogSink {
        self.log
    }
}

/// Deletes the oldest files in `dir` until it holds less than `budget_bytes`.
pub fn cleanup_storage(dir: &Path, budget_bytes: u64) -> StoreResult<CleanupReport> {
    cleanup_storage_with(dir, budget_bytes, &mut RescanProbe, &FacadeSink)
}

/// [`cleanup_storage`] with an explicit size probe and log sink.
///
/// Returns immediately when the directory is already under budget. Otherwise
/// files are removed strictly oldest first, stopping as soon as the size
/// drops below the budget. The first failed removal aborts the pass with
/// `Io`; files removed before it stay removed.
///
/// No lock is shared with the segment writer. The pass relies on the muxer
/// only ever appending to the newest file, so the segment being written is
/// the last candidate in age order. If the budget is smaller than one
/// segment, that open file can still be reached and unlinked while the muxer
/// writes to it. Concurrent passes over the same directory must be
/// serialized by the caller.
pub fn cleanup_storage_with(
    dir: &Path,
    budget_bytes: u64,
    probe: &mut dyn SizeProbe,
    log: &dyn LogSink,
) -> StoreResult<CleanupReport> {
    let janitor = Janitor { dir, log };
    janitor.info("cleanup_storage start");
    let result = evict(&janitor, dir, budget_bytes, probe);
    match &result {
        Ok(report) if report.is_noop() => janitor.info("cleanup_storage stop"),
        Ok(report) => janitor.info(&format!(
            "cleanup_storage stop: deleted {} files, {} -> {} bytes (budget {})",
            report.deleted.len(),
            report.initial_bytes,
            report.final_bytes,
            budget_bytes
        )),
        Err(err) => janitor.error(&format!("cleanup_storage aborted: {}", err)),
    }
    result
}

fn evict(
    janitor: &Janitor<'_>,
    dir: &Path,
    budget_bytes: u64,
    probe: &mut dyn SizeProbe,
) -> StoreResult<CleanupReport> {
    let initial = probe.measure(dir)?;
    let mut report = CleanupReport {
        initial_bytes: initial,
        final_bytes: initial,
        deleted: Vec::new(),
    };
    if initial < budget_bytes {
        return Ok(report);
    }

    let files = list_files_by_age(dir)?;
    let mut current = initial;
    for file in files {
        if current < budget_bytes {
            break;
        }
        janitor.debug(&format!(
            "deleting file: {} ({} bytes, {}s old)",
            file.path.display(),
            file.size,
            age_secs(file.modified)
        ));
        fs::remove_file(&file.path).map_err(|e| StoreError::io_at("remove", &file.path, e))?;
        janitor.debug(&format!("deleted file: {}", file.path.display()));

        current = probe.after_removal(dir, &file)?;
        report.final_bytes = current;
        report.deleted.push(file.path);
    }
    Ok(report)
}

/// Keeps one storage directory under a byte budget.
pub struct StorageQuota {
    dir: PathBuf,
    name: String,
    budget_bytes: u64,
    probe: Box<dyn SizeProbe + Send>,
    log: Arc<dyn LogSink>,
}

impl StorageQuota {
    pub fn new(dir: impl Into<PathBuf>, budget_bytes: u64, log: Arc<dyn LogSink>) -> Self {
        let dir = dir.into();
        Self {
            name: format!("quota:{}", dir.display()),
            dir,
            budget_bytes,
            probe: Box::new(RescanProbe),
            log,
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn SizeProbe + Send>) -> Self {
        self.probe = probe;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    pub fn cleanup(&mut self) -> StoreResult<CleanupReport> {
        cleanup_storage_with(
            &self.dir,
            self.budget_bytes,
            self.probe.as_mut(),
            self.log.as_ref(),
        )
    }
}

impl RetentionPolicy for StorageQuota {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> StoreResult<()> {
        self.cleanup().map(|_| ())
    }
}
