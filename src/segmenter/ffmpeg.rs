//! Segment muxer backed by an `ffmpeg` child process.
//!
//! Packets are piped as a raw Annex-B elementary stream into ffmpeg's
//! `segment` muxer, which stream-copies them into time-bounded container
//! files named after the wall-clock time of each rotation. A raw elementary
//! stream has no container timestamps, so `pts`/`dts` cannot cross the pipe:
//! ffmpeg stamps every packet with the wall clock on arrival and cuts
//! segments by delivery time. Live capture arrives in real time; recorded
//! packets must be delivered at their recorded pace, which
//! [`crate::replay::Replayer`] does.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;

use crate::core::{ComponentLogger, LogContext, LogSink};
use crate::media::Packet;

use super::native::{MuxerSession, NativeStatus, SegmentMuxer, SessionParams};

pub const DEFAULT_FFMPEG: &str = "ffmpeg";

#[derive(Clone)]
pub struct FfmpegMuxer {
    binary: PathBuf,
    log: Arc<dyn LogSink>,
}

impl FfmpegMuxer {
    pub fn new(binary: impl Into<PathBuf>, log: Arc<dyn LogSink>) -> Self {
        Self {
            binary: binary.into(),
            log,
        }
    }

    /// Arguments for one segmenting session.
    pub fn args(params: &SessionParams) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-nostdin",
            "-loglevel",
            "error",
            "-use_wallclock_as_timestamps",
            "1",
            "-f",
            params.codec.ffmpeg_demuxer(),
            "-i",
            "pipe:0",
            "-c",
            "copy",
            "-f",
            "segment",
            "-segment_time",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push(params.segment_seconds.to_string());
        args.extend(
            [
                "-segment_format",
                params.output_pattern.extension(),
                "-reset_timestamps",
                "1",
                "-break_non_keyframes",
                "1",
                "-strftime",
                "1",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(params.output_pattern.template());
        args
    }
}

impl ComponentLogger for FfmpegMuxer {
    fn log_context(&self) -> LogContext {
        LogContext::new("Ffmpeg", &self.binary.to_string_lossy())
    }

    fn log_sink(&self) -> &dyn LogSink {
        self.log.as_ref()
    }
}

impl SegmentMuxer for FfmpegMuxer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, params: &SessionParams) -> Result<Box<dyn MuxerSession>, NativeStatus> {
        // The elementary stream carries its own geometry; it is only logged.
        self.debug(&format!(
            "spawning for {}x{}: {}",
            params.width,
            params.height,
            Self::args(params).join(" ")
        ));

        let mut child = Command::new(&self.binary)
            .args(Self::args(params))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                self.error(&format!("spawn failed: {}", e));
                NativeStatus::from_io(&e)
            })?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(NativeStatus::ERROR);
        };

        Ok(Box::new(FfmpegSession {
            child,
            stdin: Some(stdin),
        }))
    }
}

struct FfmpegSession {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl MuxerSession for FfmpegSession {
    fn write_packet(&mut self, packet: &Packet<'_>) -> Result<(), NativeStatus> {
        let stdin = self.stdin.as_mut().ok_or(NativeStatus::ERROR)?;
        stdin
            .write_all(packet.payload)
            .map_err(|e| NativeStatus::from_io(&e))
    }

    fn finalize(&mut self) -> Result<(), NativeStatus> {
        // EOF on stdin makes ffmpeg write the trailer of the open segment.
        drop(self.stdin.take());

        let status = self.child.wait().map_err(|e| NativeStatus::from_io(&e))?;
        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(NativeStatus::new(code)),
            None => Err(NativeStatus::ERROR),
        }
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            drop(self.stdin.take());
            let _ = self.child.wait();
        }
    }
}
