//! Boundary to the encoding/muxing engine that actually writes segment files.
//!
//! The engine owns the container format and decides when to rotate to a new
//! file. This crate only opens a session, feeds it packets in order and
//! finalizes it.

use std::fmt;
use std::io;

use crate::media::{Packet, PacketCodec};

use super::pattern::OutputPattern;

const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    -((a as i32) | ((b as i32) << 8) | ((c as i32) << 16) | ((d as i32) << 24))
}

const AVERROR_BUG: i32 = fferrtag(b'B', b'U', b'G', b'!');
const AVERROR_EOF: i32 = fferrtag(b'E', b'O', b'F', b' ');
const AVERROR_EXIT: i32 = fferrtag(b'E', b'X', b'I', b'T');
const AVERROR_INVALIDDATA: i32 = fferrtag(b'I', b'N', b'D', b'A');
const AVERROR_MUXER_NOT_FOUND: i32 = fferrtag(0xF8, b'M', b'U', b'X');
const AVERROR_PROTOCOL_NOT_FOUND: i32 = fferrtag(0xF8, b'P', b'R', b'O');

const EIO: i32 = 5;

/// Status code returned by the muxing engine. Zero is success; every other
/// value is engine specific and only meaningful for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeStatus(i32);

impl NativeStatus {
    pub const OK: Self = Self(0);
    pub const ERROR: Self = Self(1);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Negative errno, the way libav reports OS failures.
    pub fn from_io(err: &io::Error) -> Self {
        Self(-err.raw_os_error().unwrap_or(EIO))
    }

    /// Human readable text for a status code.
    pub fn describe(self) -> String {
        match self.0 {
            0 => "success".to_string(),
            1 => "generic muxer error".to_string(),
            AVERROR_BUG => "internal bug in muxer library".to_string(),
            AVERROR_EOF => "end of file".to_string(),
            AVERROR_EXIT => "immediate exit requested".to_string(),
            AVERROR_INVALIDDATA => "invalid data found when processing input".to_string(),
            AVERROR_MUXER_NOT_FOUND => "muxer not found".to_string(),
            AVERROR_PROTOCOL_NOT_FOUND => "protocol not found".to_string(),
            code if code < 0 && code > -4096 => io::Error::from_raw_os_error(-code).to_string(),
            code => format!("unknown error code {}", code),
        }
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0, self.describe())
    }
}

impl std::error::Error for NativeStatus {}

/// Everything the engine needs to open one segmenting session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub codec: PacketCodec,
    pub segment_seconds: u32,
    pub output_pattern: OutputPattern,
    pub width: u32,
    pub height: u32,
}

/// Factory for muxing sessions.
pub trait SegmentMuxer: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self, params: &SessionParams) -> Result<Box<dyn MuxerSession>, NativeStatus>;
}

/// One open muxing session.
pub trait MuxerSession: Send {
    /// Hands one packet to the engine unchanged.
    fn write_packet(&mut self, packet: &Packet<'_>) -> Result<(), NativeStatus>;

    /// Writes the trailer of the in-progress segment. The session is dropped
    /// right after, whatever this returns.
    fn finalize(&mut self) -> Result<(), NativeStatus>;
}
