//! Recorded packet dumps, fed back through a segment writer.
//!
//! Layout (big-endian):
//! header `VSPK` | version u8 | codec u8 | width u32 | height u32
//!        | timebase num u32 | timebase den u32 (version 2 only)
//! record pts i64 | dts i64 | flags u8 | len u32 | payload
//!
//! Version 1 dumps carry no timebase and are read as 1/90000.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::core::{ComponentLogger, LogContext, LogSink};
use crate::media::{Packet, PacketCodec};
use crate::segmenter::SegmentWriter;

pub const MAGIC: &[u8; 4] = b"VSPK";
pub const VERSION: u8 = 2;

const VERSION_NO_TIMEBASE: u8 = 1;
const FLAG_KEYFRAME: u8 = 0x01;
const MAX_PAYLOAD: u32 = 64 * 1024 * 1024;

// Upper bound for one pacing sleep, so a stop request is seen quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Unit of the recorded `pts`/`dts` values, in seconds per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    pub num: u32,
    pub den: u32,
}

/// The RTP video clock.
pub const DEFAULT_TIMEBASE: Timebase = Timebase { num: 1, den: 90_000 };

impl Timebase {
    pub fn new(num: u32, den: u32) -> Option<Self> {
        (num > 0 && den > 0).then_some(Self { num, den })
    }

    /// Length of `ticks` in this timebase. Negative spans are zero.
    pub fn to_duration(self, ticks: i64) -> Duration {
        if ticks <= 0 {
            return Duration::ZERO;
        }
        let nanos = u128::from(ticks.unsigned_abs()) * u128::from(self.num) * 1_000_000_000
            / u128::from(self.den);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl Default for Timebase {
    fn default() -> Self {
        DEFAULT_TIMEBASE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpHeader {
    pub codec: PacketCodec,
    pub width: u32,
    pub height: u32,
    pub timebase: Timebase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpPacket {
    pub payload: Vec<u8>,
    pub pts: i64,
    pub dts: i64,
    pub is_keyframe: bool,
}

pub struct PacketDumpReader<R: Read> {
    inner: R,
    header: DumpHeader,
}

impl<R: Read> PacketDumpReader<R> {
    pub fn open(mut inner: R) -> anyhow::Result<Self> {
        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic).context("reading dump magic")?;
        if &magic != MAGIC {
            bail!("not a packet dump (magic {:?})", magic);
        }
        let version = inner.read_u8()?;
        if version != VERSION && version != VERSION_NO_TIMEBASE {
            bail!("unsupported packet dump version {}", version);
        }
        let codec_byte = inner.read_u8()?;
        let codec = PacketCodec::from_byte(codec_byte)
            .with_context(|| format!("unknown codec id {} in dump header", codec_byte))?;
        let width = inner.read_u32::<BigEndian>()?;
        let height = inner.read_u32::<BigEndian>()?;

        let timebase = if version == VERSION_NO_TIMEBASE {
            DEFAULT_TIMEBASE
        } else {
            let num = inner.read_u32::<BigEndian>().context("reading timebase")?;
            let den = inner.read_u32::<BigEndian>().context("reading timebase")?;
            Timebase::new(num, den)
                .with_context(|| format!("invalid timebase {}/{} in dump header", num, den))?
        };

        Ok(Self {
            inner,
            header: DumpHeader {
                codec,
                width,
                height,
                timebase,
            },
        })
    }

    pub fn header(&self) -> DumpHeader {
        self.header
    }

    /// Next record, `None` on a clean end of stream.
    pub fn next_packet(&mut self) -> anyhow::Result<Option<DumpPacket>> {
        let mut pts_bytes = [0u8; 8];
        if !read_exact_or_eof(&mut self.inner, &mut pts_bytes)? {
            return Ok(None);
        }
        let pts = BigEndian::read_i64(&pts_bytes);
        let dts = self.inner.read_i64::<BigEndian>().context("truncated record")?;
        let flags = self.inner.read_u8().context("truncated record")?;
        let len = self.inner.read_u32::<BigEndian>().context("truncated record")?;
        if len > MAX_PAYLOAD {
            bail!("record payload of {} bytes exceeds limit", len);
        }

        let mut payload = vec![0u8; len as usize];
        self.inner
            .read_exact(&mut payload)
            .context("truncated record payload")?;

        Ok(Some(DumpPacket {
            payload,
            pts,
            dts,
            is_keyframe: flags & FLAG_KEYFRAME != 0,
        }))
    }
}

impl<R: Read> Iterator for PacketDumpReader<R> {
    type Item = anyhow::Result<DumpPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

// false when the stream ended before the first byte
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

pub struct PacketDumpWriter<W: Write> {
    inner: W,
}

impl<W: Write> PacketDumpWriter<W> {
    pub fn create(mut inner: W, header: DumpHeader) -> io::Result<Self> {
        inner.write_all(MAGIC)?;
        inner.write_u8(VERSION)?;
        inner.write_u8(header.codec.to_byte())?;
        inner.write_u32::<BigEndian>(header.width)?;
        inner.write_u32::<BigEndian>(header.height)?;
        inner.write_u32::<BigEndian>(header.timebase.num)?;
        inner.write_u32::<BigEndian>(header.timebase.den)?;
        Ok(Self { inner })
    }

    pub fn write_packet(&mut self, packet: &Packet<'_>) -> io::Result<()> {
        let len = u32::try_from(packet.payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;
        self.inner.write_i64::<BigEndian>(packet.pts)?;
        self.inner.write_i64::<BigEndian>(packet.dts)?;
        self.inner
            .write_u8(if packet.is_keyframe { FLAG_KEYFRAME } else { 0 })?;
        self.inner.write_u32::<BigEndian>(len)?;
        self.inner.write_all(packet.payload)
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Time source that paces a replay.
pub trait ReplayClock {
    /// Time elapsed since the clock started.
    fn elapsed(&self) -> Duration;

    fn sleep(&mut self, duration: Duration);
}

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    started: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl ReplayClock for WallClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub written: u64,
    pub failed: u64,
}

/// Feeds a packet dump through a segment writer at the pace it was recorded.
///
/// Muxers that stamp input on arrival (the ffmpeg backend does) cut segments
/// by delivery time, so each packet is held back until its decode timestamp,
/// measured from the first packet, has elapsed on the clock.
pub struct Replayer {
    name: String,
    clock: Option<Box<dyn ReplayClock>>,
    log: Arc<dyn LogSink>,
}

impl Replayer {
    /// Paced against the wall clock.
    pub fn new(name: &str, log: Arc<dyn LogSink>) -> Self {
        Self {
            name: name.to_string(),
            clock: Some(Box::new(WallClock::start())),
            log,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn ReplayClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Writes records as fast as they are read.
    pub fn unpaced(mut self) -> Self {
        self.clock = None;
        self
    }

    /// Initializes `writer` from the dump header, writes every record and
    /// closes the writer on every exit path. Individual write failures are
    /// counted and skipped. Stops early when `running` goes false.
    pub fn run<R: Read>(
        &mut self,
        writer: &SegmentWriter,
        dump: &mut PacketDumpReader<R>,
        running: &AtomicBool,
    ) -> anyhow::Result<ReplayStats> {
        let header = dump.header();
        if header.codec != writer.codec() {
            bail!(
                "dump codec {} does not match writer codec {}",
                header.codec,
                writer.codec()
            );
        }
        let width = i32::try_from(header.width).context("dump width out of range")?;
        let height = i32::try_from(header.height).context("dump height out of range")?;

        writer.init(width, height)?;
        self.info(&format!(
            "replaying {} {}x{} timebase {}/{}{}",
            header.codec,
            header.width,
            header.height,
            header.timebase.num,
            header.timebase.den,
            if self.clock.is_some() { "" } else { " unpaced" }
        ));
        let result = self.feed(writer, dump, header.timebase, running);
        writer.close();
        result
    }

    fn feed<R: Read>(
        &mut self,
        writer: &SegmentWriter,
        dump: &mut PacketDumpReader<R>,
        timebase: Timebase,
        running: &AtomicBool,
    ) -> anyhow::Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        // (first dts, clock reading when it was written)
        let mut origin: Option<(i64, Duration)> = None;

        while running.load(Ordering::Relaxed) {
            let Some(packet) = dump.next_packet()? else {
                break;
            };

            if let Some(clock) = self.clock.as_deref_mut() {
                let (first_dts, started) = *origin.get_or_insert((packet.dts, clock.elapsed()));
                let due = started + timebase.to_duration(packet.dts.saturating_sub(first_dts));
                if !wait_until(clock, due, running) {
                    break;
                }
            }

            match writer.write_packet(&packet.payload, packet.pts, packet.dts, packet.is_keyframe)
            {
                Ok(()) => stats.written += 1,
                Err(err) => {
                    stats.failed += 1;
                    self.warn(&format!("skipping packet pts={}: {}", packet.pts, err));
                }
            }
        }
        Ok(stats)
    }
}

impl ComponentLogger for Replayer {
    fn log_context(&self) -> LogContext {
        LogContext::new("Replay", &self.name)
    }

    fn log_sink(&self) -> &dyn LogSink {
        self.log.as_ref()
    }
}

// false when stopped before `due`
fn wait_until(clock: &mut dyn ReplayClock, due: Duration, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let now = clock.elapsed();
        if now >= due {
            return true;
        }
        clock.sleep((due - now).min(SLEEP_SLICE));
    }
}
