// src/segmenter/mod.rs

pub mod ffmpeg;
pub mod native;
pub mod pattern;
pub mod session;
pub mod writer;

pub use ffmpeg::FfmpegMuxer;
pub use native::{MuxerSession, NativeStatus, SegmentMuxer, SessionParams};
pub use pattern::OutputPattern;
pub use session::SessionHandle;
pub use writer::{LifecycleState, SegmentWriter, WriterSettings};
