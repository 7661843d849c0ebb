use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Local;
use log::Level;

use crate::core::LogSink;
use crate::core::lock::lock_mutex;
use crate::media::Packet;
use crate::replay::ReplayClock;
use crate::segmenter::native::{MuxerSession, NativeStatus, SegmentMuxer, SessionParams};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPacket {
    pub payload: Vec<u8>,
    pub pts: i64,
    pub dts: i64,
    pub is_keyframe: bool,
}

/// Calls as the muxer saw them. Each write is bracketed by a start and an
/// end event carrying the same sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerEvent {
    Open,
    WriteStart(u64),
    WriteEnd(u64),
    Finalize,
}

#[derive(Default)]
struct MockState {
    opens: AtomicUsize,
    closes: AtomicUsize,
    write_seq: AtomicU64,
    packets: Mutex<Vec<RecordedPacket>>,
    events: Mutex<Vec<MuxerEvent>>,
    last_params: Mutex<Option<SessionParams>>,
    fail_open: Mutex<Option<NativeStatus>>,
    fail_writes: Mutex<VecDeque<NativeStatus>>,
    fail_close: Mutex<Option<NativeStatus>>,
    write_delay: Mutex<Duration>,
    disk_output: AtomicBool,
}

impl MockState {
    fn event(&self, event: MuxerEvent) {
        lock_mutex(&self.events, "mock_muxer.events").push(event);
    }
}

/// Scriptable stand-in for the muxing engine. Clones share state.
#[derive(Clone, Default)]
pub struct MockMuxer {
    state: Arc<MockState>,
}

impl MockMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends payloads to real files named by the output pattern, rotating
    /// on the first keyframe after the segment duration.
    pub fn with_disk_output(self) -> Self {
        self.state.disk_output.store(true, Ordering::SeqCst);
        self
    }

    /// Sleeps inside every write, to widen interleaving windows.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        *lock_mutex(&self.state.write_delay, "mock_muxer.write_delay") = delay;
        self
    }

    pub fn fail_open_with(&self, status: NativeStatus) {
        *lock_mutex(&self.state.fail_open, "mock_muxer.fail_open") = Some(status);
    }

    pub fn fail_next_write_with(&self, status: NativeStatus) {
        lock_mutex(&self.state.fail_writes, "mock_muxer.fail_writes").push_back(status);
    }

    pub fn fail_close_with(&self, status: NativeStatus) {
        *lock_mutex(&self.state.fail_close, "mock_muxer.fail_close") = Some(status);
    }

    pub fn clear_failures(&self) {
        *lock_mutex(&self.state.fail_open, "mock_muxer.fail_open") = None;
        lock_mutex(&self.state.fail_writes, "mock_muxer.fail_writes").clear();
        *lock_mutex(&self.state.fail_close, "mock_muxer.fail_close") = None;
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Packets the muxer accepted, in arrival order.
    pub fn packets(&self) -> Vec<RecordedPacket> {
        lock_mutex(&self.state.packets, "mock_muxer.packets").clone()
    }

    pub fn events(&self) -> Vec<MuxerEvent> {
        lock_mutex(&self.state.events, "mock_muxer.events").clone()
    }

    pub fn last_params(&self) -> Option<SessionParams> {
        lock_mutex(&self.state.last_params, "mock_muxer.last_params").clone()
    }
}

impl SegmentMuxer for MockMuxer {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&self, params: &SessionParams) -> Result<Box<dyn MuxerSession>, NativeStatus> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        *lock_mutex(&self.state.last_params, "mock_muxer.last_params") = Some(params.clone());

        if let Some(status) = *lock_mutex(&self.state.fail_open, "mock_muxer.fail_open") {
            return Err(status);
        }

        let mut session = MockSession {
            state: self.state.clone(),
            params: params.clone(),
            file: None,
            segment_started: Instant::now(),
        };
        if self.state.disk_output.load(Ordering::SeqCst) {
            session.roll()?;
        }

        self.state.event(MuxerEvent::Open);
        Ok(Box::new(session))
    }
}

struct MockSession {
    state: Arc<MockState>,
    params: SessionParams,
    file: Option<File>,
    segment_started: Instant,
}

impl MockSession {
    fn roll(&mut self) -> Result<(), NativeStatus> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| NativeStatus::from_io(&e))?;
        }
        let path = self.params.output_pattern.render(&Local::now());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| NativeStatus::from_io(&e))?;
        self.file = Some(file);
        self.segment_started = Instant::now();
        Ok(())
    }

    fn append(&mut self, packet: &Packet<'_>) -> Result<(), NativeStatus> {
        let due = self.segment_started.elapsed()
            >= Duration::from_secs(u64::from(self.params.segment_seconds));
        if due && packet.is_keyframe {
            self.roll()?;
        }
        match self.file.as_mut() {
            Some(file) => file
                .write_all(packet.payload)
                .map_err(|e| NativeStatus::from_io(&e)),
            None => Ok(()),
        }
    }
}

impl MuxerSession for MockSession {
    fn write_packet(&mut self, packet: &Packet<'_>) -> Result<(), NativeStatus> {
        let seq = self.state.write_seq.fetch_add(1, Ordering::SeqCst);
        self.state.event(MuxerEvent::WriteStart(seq));

        let delay = *lock_mutex(&self.state.write_delay, "mock_muxer.write_delay");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let scripted = lock_mutex(&self.state.fail_writes, "mock_muxer.fail_writes").pop_front();
        let result = match scripted {
            Some(status) => Err(status),
            None => {
                lock_mutex(&self.state.packets, "mock_muxer.packets").push(RecordedPacket {
                    payload: packet.payload.to_vec(),
                    pts: packet.pts,
                    dts: packet.dts,
                    is_keyframe: packet.is_keyframe,
                });
                self.append(packet)
            }
        };

        self.state.event(MuxerEvent::WriteEnd(seq));
        result
    }

    fn finalize(&mut self) -> Result<(), NativeStatus> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.state.event(MuxerEvent::Finalize);

        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| NativeStatus::from_io(&e))?;
        }
        match *lock_mutex(&self.state.fail_close, "mock_muxer.fail_close") {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

/// Log sink that keeps every line for assertions.
#[derive(Default)]
pub struct CaptureSink {
    records: Mutex<Vec<(Level, String)>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        lock_mutex(&self.records, "capture_sink.records").clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        lock_mutex(&self.records, "capture_sink.records")
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }

    pub fn count(&self, level: Level) -> usize {
        lock_mutex(&self.records, "capture_sink.records")
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl LogSink for CaptureSink {
    fn log(&self, level: Level, line: &str) {
        lock_mutex(&self.records, "capture_sink.records").push((level, line.to_string()));
    }
}

/// Replay clock that only moves when slept on or advanced. Clones share
/// the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualClockState>>,
}

#[derive(Default)]
struct ManualClockState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        lock_mutex(&*self.state, "manual_clock").now
    }

    pub fn advance(&self, by: Duration) {
        lock_mutex(&*self.state, "manual_clock").now += by;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        lock_mutex(&*self.state, "manual_clock").sleeps.clone()
    }
}

impl ReplayClock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now()
    }

    fn sleep(&mut self, duration: Duration) {
        let mut state = lock_mutex(&*self.state, "manual_clock");
        state.now += duration;
        state.sleeps.push(duration);
    }
}
