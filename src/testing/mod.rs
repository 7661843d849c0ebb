pub mod mocks;

pub use mocks::{CaptureSink, ManualClock, MockMuxer, MuxerEvent, RecordedPacket};
