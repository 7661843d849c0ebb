//! Size accounting over a single storage directory.
//!
//! Only regular files directly inside the directory count. Subdirectories
//! and symlinks are skipped and never listed for deletion.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Total bytes of the regular files in `dir`.
pub fn directory_size(dir: &Path) -> StoreResult<u64> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io_at("read dir", dir, e))?;

    let mut total = 0u64;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io_at("read dir", dir, e))?;
        let meta = entry
            .metadata()
            .map_err(|e| StoreError::io_at("stat", &entry.path(), e))?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Regular files in `dir`, oldest modification time first. Equal times are
/// ordered by file name.
pub fn list_files_by_age(dir: &Path) -> StoreResult<Vec<SegmentFile>> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io_at("read dir", dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io_at("read dir", dir, e))?;
        let path = entry.path();
        let meta = entry
            .metadata()
            .map_err(|e| StoreError::io_at("stat", &path, e))?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .map_err(|e| StoreError::io_at("mtime", &path, e))?;
        files.push(SegmentFile {
            path,
            size: meta.len(),
            modified,
        });
    }

    files.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    });
    Ok(files)
}
