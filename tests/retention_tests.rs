// tests/retention_tests.rs

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use videostore_node::core::NullSink;
use videostore_node::storage::{
    RescanProbe, SegmentFile, SizeProbe, cleanup_storage, cleanup_storage_with, directory_size,
};
use videostore_node::{StoreError, StoreResult};

fn write_aged(dir: &Path, name: &str, len: usize, age_secs: u64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![0xABu8; len]).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
    path
}

#[test]
fn deletes_only_oldest_to_get_under_budget() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_aged(dir.path(), "a.mp4", 40, 300);
    let b = write_aged(dir.path(), "b.mp4", 40, 200);
    let c = write_aged(dir.path(), "c.mp4", 40, 100);

    let report = cleanup_storage(dir.path(), 100).unwrap();

    assert_eq!(report.initial_bytes, 120);
    assert_eq!(report.final_bytes, 80);
    assert_eq!(report.deleted, vec![a.clone()]);
    assert!(!a.exists());
    assert!(b.exists());
    assert!(c.exists());
}

#[test]
fn under_budget_performs_zero_deletions() {
    let dir = tempfile::tempdir().unwrap();
    write_aged(dir.path(), "a.mp4", 10, 30);
    write_aged(dir.path(), "b.mp4", 10, 20);

    let report = cleanup_storage(dir.path(), 21).unwrap();
    assert!(report.is_noop());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn evicts_strictly_oldest_first_and_no_more_than_needed() {
    let dir = tempfile::tempdir().unwrap();
    // Name order deliberately differs from age order.
    let oldest = write_aged(dir.path(), "z.mp4", 100, 500);
    let second = write_aged(dir.path(), "m.mp4", 10, 400);
    let third = write_aged(dir.path(), "a.mp4", 50, 300);
    let newest = write_aged(dir.path(), "b.mp4", 60, 10);

    // 220 bytes, budget 100: dropping z (100) leaves 120, m leaves 110,
    // a leaves 60 < 100.
    let report = cleanup_storage(dir.path(), 100).unwrap();

    assert_eq!(report.deleted, vec![oldest, second, third]);
    assert_eq!(report.final_bytes, 60);
    assert!(newest.exists());
    assert_eq!(directory_size(dir.path()).unwrap(), 60);
}

#[test]
fn budget_below_every_file_empties_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_aged(dir.path(), "a.mp4", 5, 20);
    write_aged(dir.path(), "b.mp4", 5, 10);

    let report = cleanup_storage(dir.path(), 1).unwrap();
    assert_eq!(report.deleted.len(), 2);
    assert_eq!(report.final_bytes, 0);
}

/// Removes the next victim behind the cleaner's back after the first
/// deletion, the way a concurrent pass would.
struct RacingProbe {
    inner: RescanProbe,
    steal: Option<PathBuf>,
}

impl SizeProbe for RacingProbe {
    fn measure(&mut self, dir: &Path) -> StoreResult<u64> {
        self.inner.measure(dir)
    }

    fn after_removal(&mut self, dir: &Path, removed: &SegmentFile) -> StoreResult<u64> {
        let size = self.inner.after_removal(dir, removed)?;
        if let Some(path) = self.steal.take() {
            // The size reported still counts the stolen file.
            fs::remove_file(&path).unwrap();
        }
        Ok(size)
    }
}

#[test]
fn failed_deletion_aborts_without_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_aged(dir.path(), "a.mp4", 50, 300);
    let b = write_aged(dir.path(), "b.mp4", 50, 200);
    let c = write_aged(dir.path(), "c.mp4", 50, 100);

    let mut probe = RacingProbe {
        inner: RescanProbe,
        steal: Some(b.clone()),
    };
    let result = cleanup_storage_with(dir.path(), 10, &mut probe, &NullSink);

    match result {
        Err(StoreError::Io { context, source }) => {
            assert!(context.contains("b.mp4"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected Io error, got {:?}", other),
    }
    assert!(!a.exists());
    assert!(c.exists());
}

#[test]
fn rerun_after_failure_finishes_the_job() {
    let dir = tempfile::tempdir().unwrap();
    write_aged(dir.path(), "a.mp4", 50, 300);
    let b = write_aged(dir.path(), "b.mp4", 50, 200);
    let c = write_aged(dir.path(), "c.mp4", 50, 100);

    let mut probe = RacingProbe {
        inner: RescanProbe,
        steal: Some(b),
    };
    assert!(cleanup_storage_with(dir.path(), 60, &mut probe, &NullSink).is_err());

    let report = cleanup_storage(dir.path(), 60).unwrap();
    assert!(report.is_noop());
    assert!(c.exists());
    assert_eq!(directory_size(dir.path()).unwrap(), 50);
}
