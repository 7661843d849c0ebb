use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::core::lock::lock_mutex;
use crate::core::{ComponentLogger, LogContext, LogSink, StoreError, StoreResult};
use crate::media::{Packet, PacketCodec, SourceType};
use crate::storage::retention::{CleanupReport, RescanProbe, cleanup_storage_with};

use super::native::{SegmentMuxer, SessionParams};
use super::pattern::OutputPattern;
use super::session::SessionHandle;

pub const DEFAULT_CONTAINER: &str = "mp4";

/// Externally visible lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Closed,
}

// The session handle only exists in the `Initialized` variant.
enum WriterState {
    Uninitialized,
    Initialized(SessionHandle),
    Closed,
}

impl WriterState {
    fn lifecycle(&self) -> LifecycleState {
        match self {
            WriterState::Uninitialized => LifecycleState::Uninitialized,
            WriterState::Initialized(_) => LifecycleState::Initialized,
            WriterState::Closed => LifecycleState::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriterSettings {
    pub source: SourceType,
    pub storage_path: PathBuf,
    pub segment_seconds: u32,
    pub budget_bytes: u64,
    pub container: String,
}

impl WriterSettings {
    pub fn new(
        source: SourceType,
        storage_path: impl Into<PathBuf>,
        segment_seconds: u32,
        budget_bytes: u64,
    ) -> Self {
        Self {
            source,
            storage_path: storage_path.into(),
            segment_seconds,
            budget_bytes,
            container: DEFAULT_CONTAINER.to_string(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            source: cfg.source.source_type,
            storage_path: PathBuf::from(&cfg.storage.path),
            segment_seconds: cfg.storage.segment_seconds,
            budget_bytes: cfg.storage.budget_bytes(),
            container: cfg.muxer.container.clone(),
        }
    }
}

/// Writes one stream of pre-encoded packets into rolling segment files.
///
/// All operations take the same lock, so `init`, every `write_packet` and
/// `close` are totally ordered and the muxer never sees two calls at once.
pub struct SegmentWriter {
    codec: PacketCodec,
    storage_path: PathBuf,
    segment_seconds: u32,
    budget_bytes: u64,
    pattern: OutputPattern,
    muxer: Arc<dyn SegmentMuxer>,
    log: Arc<dyn LogSink>,
    state: Mutex<WriterState>,
}

impl SegmentWriter {
    /// Validates the settings and creates the storage directory.
    pub fn new(
        settings: WriterSettings,
        muxer: Arc<dyn SegmentMuxer>,
        log: Arc<dyn LogSink>,
    ) -> StoreResult<Self> {
        let codec = settings
            .source
            .packet_codec()
            .ok_or(StoreError::UnsupportedSourceType(settings.source))?;

        if settings.segment_seconds == 0 {
            return Err(StoreError::invalid("segment duration must be greater than zero"));
        }
        if settings.budget_bytes == 0 {
            return Err(StoreError::invalid("storage budget must be greater than zero"));
        }
        if settings.storage_path.as_os_str().is_empty() {
            return Err(StoreError::invalid("storage path must not be empty"));
        }

        fs::create_dir_all(&settings.storage_path)
            .map_err(|e| StoreError::io_at("create storage dir", &settings.storage_path, e))?;

        let pattern = OutputPattern::new(&settings.storage_path, &settings.container);

        Ok(Self {
            codec,
            storage_path: settings.storage_path,
            segment_seconds: settings.segment_seconds,
            budget_bytes: settings.budget_bytes,
            pattern,
            muxer,
            log,
            state: Mutex::new(WriterState::Uninitialized),
        })
    }

    pub fn codec(&self) -> PacketCodec {
        self.codec
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn segment_seconds(&self) -> u32 {
        self.segment_seconds
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    pub fn output_pattern(&self) -> &OutputPattern {
        &self.pattern
    }

    pub fn state(&self) -> LifecycleState {
        lock_mutex(&self.state, "segment_writer.state").lifecycle()
    }

    /// Opens the muxer session. Succeeds at most once per writer.
    pub fn init(&self, width: i32, height: i32) -> StoreResult<()> {
        if width <= 0 || height <= 0 {
            return Err(StoreError::invalid(
                "both width and height must be greater than zero",
            ));
        }

        let mut state = lock_mutex(&self.state, "segment_writer.init");
        match *state {
            WriterState::Initialized(_) => return Err(StoreError::AlreadyInitialized),
            WriterState::Closed => return Err(StoreError::AlreadyClosed),
            WriterState::Uninitialized => {}
        }

        let params = SessionParams {
            codec: self.codec,
            segment_seconds: self.segment_seconds,
            output_pattern: self.pattern.clone(),
            width: width as u32,
            height: height as u32,
        };

        match SessionHandle::open(self.muxer.as_ref(), &params) {
            Ok(handle) => {
                self.info(&format!(
                    "initialized {} muxer {}x{} segment={}s pattern={}",
                    handle.muxer_name(),
                    width,
                    height,
                    self.segment_seconds,
                    self.pattern.template()
                ));
                *state = WriterState::Initialized(handle);
                Ok(())
            }
            Err(status) => {
                let err = StoreError::EncoderInitFailed;
                self.error(&format!("{}: {}: {}", err, status.code(), status.describe()));
                Err(err)
            }
        }
    }

    /// Hands one encoded packet to the muxer. A failed write leaves the
    /// writer usable for the next packet.
    pub fn write_packet(
        &self,
        payload: &[u8],
        pts: i64,
        dts: i64,
        is_keyframe: bool,
    ) -> StoreResult<()> {
        let mut state = lock_mutex(&self.state, "segment_writer.write_packet");
        let handle = match &mut *state {
            WriterState::Uninitialized => return Err(StoreError::NotInitialized),
            WriterState::Closed => return Err(StoreError::AlreadyClosed),
            WriterState::Initialized(handle) => handle,
        };

        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let packet = Packet {
            payload,
            pts,
            dts,
            is_keyframe,
        };

        if let Err(status) = handle.write(&packet) {
            let err = StoreError::WriteFailed;
            self.error(&format!(
                "{}: {}: {} (pts={} dts={} keyframe={})",
                err,
                status.code(),
                status.describe(),
                pts,
                dts,
                is_keyframe
            ));
            return Err(err);
        }
        Ok(())
    }

    /// Finalizes the current segment and releases the muxer session.
    ///
    /// Only the first call after a successful `init` does anything. A
    /// finalize failure is logged; the session is released regardless.
    pub fn close(&self) {
        let mut state = lock_mutex(&self.state, "segment_writer.close");
        if !matches!(*state, WriterState::Initialized(_)) {
            return;
        }

        if let WriterState::Initialized(mut handle) =
            std::mem::replace(&mut *state, WriterState::Closed)
        {
            match handle.release() {
                Some(Ok(())) | None => self.info("closed"),
                Some(Err(status)) => self.error(&format!(
                    "failed to close segment muxer: {}: {}",
                    status.code(),
                    status.describe()
                )),
            }
        }
    }

    /// Runs the retention controller against this writer's directory.
    ///
    /// Takes no writer lock. See [`cleanup_storage_with`] for how this
    /// interacts with the segment currently being written.
    pub fn cleanup_storage(&self) -> StoreResult<CleanupReport> {
        cleanup_storage_with(
            &self.storage_path,
            self.budget_bytes,
            &mut RescanProbe,
            self.log.as_ref(),
        )
    }
}

impl ComponentLogger for SegmentWriter {
    fn log_context(&self) -> LogContext {
        LogContext::new("Segmenter", &self.storage_path.to_string_lossy())
            .with_stream(self.codec.label())
    }

    fn log_sink(&self) -> &dyn LogSink {
        self.log.as_ref()
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        self.close();
    }
}
