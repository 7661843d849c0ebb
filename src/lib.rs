// src/lib.rs
pub mod config;
pub mod core;
pub mod media;
pub mod replay;
pub mod segmenter;
pub mod storage;
pub mod testing;

// Re-exports
pub use core::{ComponentLogger, FacadeSink, LogContext, LogSink, StoreError, StoreResult};
pub use media::{Packet, PacketCodec, SourceType};
pub use segmenter::{FfmpegMuxer, LifecycleState, SegmentWriter, WriterSettings};
pub use storage::{CleanupReport, RetentionWorker, StorageQuota, cleanup_storage};
