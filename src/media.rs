use std::fmt;

use serde::{Deserialize, Serialize};

/// What the upstream capture component hands us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Decoded frames. Needs an encoder, not handled by the segment writer.
    Frame,
    H264,
    H265,
}

impl SourceType {
    /// The compressed packet format, if this source delivers packets.
    pub fn packet_codec(self) -> Option<PacketCodec> {
        match self {
            SourceType::H264 => Some(PacketCodec::H264),
            SourceType::H265 => Some(PacketCodec::H265),
            SourceType::Frame => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceType::Frame => "frame",
            SourceType::H264 => "h264",
            SourceType::H265 => "h265",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compressed packet formats a segment writer can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketCodec {
    H264,
    H265,
}

impl PacketCodec {
    pub fn label(self) -> &'static str {
        match self {
            PacketCodec::H264 => "h264",
            PacketCodec::H265 => "h265",
        }
    }

    /// Name of the ffmpeg demuxer for the raw Annex-B elementary stream.
    pub fn ffmpeg_demuxer(self) -> &'static str {
        match self {
            PacketCodec::H264 => "h264",
            PacketCodec::H265 => "hevc",
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            PacketCodec::H264 => 1,
            PacketCodec::H265 => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(PacketCodec::H264),
            2 => Some(PacketCodec::H265),
            _ => None,
        }
    }
}

impl From<PacketCodec> for SourceType {
    fn from(codec: PacketCodec) -> Self {
        match codec {
            PacketCodec::H264 => SourceType::H264,
            PacketCodec::H265 => SourceType::H265,
        }
    }
}

impl fmt::Display for PacketCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One already-encoded access unit, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    pub payload: &'a [u8],
    pub pts: i64,
    pub dts: i64,
    pub is_keyframe: bool,
}
