// src/storage/mod.rs

use crate::core::StoreResult;

/// A housekeeping pass over stored segments.
pub trait RetentionPolicy: Send {
    fn name(&self) -> &str;
    fn run(&mut self) -> StoreResult<()>;
}

pub mod accountant;
pub mod retention;
pub mod worker;

pub use accountant::{SegmentFile, directory_size, list_files_by_age};
pub use retention::{
    CleanupReport, RescanProbe, SizeProbe, StorageQuota, TrackedProbe, cleanup_storage,
    cleanup_storage_with,
};
pub use worker::RetentionWorker;
