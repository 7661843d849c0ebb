use std::fs;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use videostore_node::core::NullSink;
use videostore_node::media::{Packet, PacketCodec};
use videostore_node::replay::{DEFAULT_TIMEBASE, DumpHeader, PacketDumpReader, PacketDumpWriter, Replayer};
use videostore_node::storage::{RetentionWorker, StorageQuota, directory_size, list_files_by_age};
use videostore_node::testing::mocks::MockMuxer;
use videostore_node::{LifecycleState, SegmentWriter, SourceType, WriterSettings};

#[test]
fn writer_output_is_kept_under_budget() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    // Rotated-out segments from an earlier run.
    for (name, age) in [("2024-01-01_00-00-00.mp4", 300), ("2024-01-01_00-00-10.mp4", 200)] {
        let path = dir.path().join(name);
        fs::write(&path, vec![0u8; 600])?;
        fs::File::options()
            .write(true)
            .open(&path)?
            .set_modified(std::time::SystemTime::now() - Duration::from_secs(age))?;
    }

    let muxer = MockMuxer::new().with_disk_output();
    let writer = SegmentWriter::new(
        WriterSettings::new(SourceType::H264, dir.path(), 3600, 1000),
        Arc::new(muxer.clone()),
        Arc::new(NullSink),
    )?;
    writer.init(640, 480)?;
    for i in 0..10i64 {
        writer.write_packet(&[0x11; 20], i * 3000, i * 3000, i == 0)?;
    }
    writer.close();
    assert_eq!(writer.state(), LifecycleState::Closed);

    // 600 + 600 + 200 >= 1000; dropping the oldest leaves 800.
    let report = writer.cleanup_storage()?;
    assert_eq!(report.deleted.len(), 1);
    assert!(report.deleted[0].ends_with("2024-01-01_00-00-00.mp4"));
    assert_eq!(directory_size(dir.path())?, 800);

    let remaining = list_files_by_age(dir.path())?;
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[1].size, 200);
    Ok(())
}

#[test]
fn retention_worker_trims_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    for i in 0..5 {
        let path = dir.path().join(format!("seg-{}.mp4", i));
        fs::write(&path, vec![0u8; 100])?;
        fs::File::options()
            .write(true)
            .open(&path)?
            .set_modified(std::time::SystemTime::now() - Duration::from_secs(100 - i * 10))?;
    }

    let quota = StorageQuota::new(dir.path(), 250, Arc::new(NullSink));
    let mut worker =
        RetentionWorker::spawn(Box::new(quota), Duration::from_secs(60), Arc::new(NullSink))?;

    let deadline = Instant::now() + Duration::from_secs(2);
    while worker.passes() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    worker.stop();

    assert_eq!(worker.failures(), 0);
    assert_eq!(directory_size(dir.path())?, 200);
    assert!(dir.path().join("seg-3.mp4").exists());
    assert!(dir.path().join("seg-4.mp4").exists());
    Ok(())
}

#[test]
fn replay_feeds_every_record_and_closes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let header = DumpHeader {
        codec: PacketCodec::H265,
        width: 1280,
        height: 720,
        timebase: DEFAULT_TIMEBASE,
    };
    let mut dump = PacketDumpWriter::create(Vec::new(), header)?;
    for i in 0..4i64 {
        dump.write_packet(&Packet {
            payload: &[0, 0, 1, i as u8],
            pts: i * 100,
            dts: i * 100,
            is_keyframe: i == 0,
        })?;
    }
    let bytes = dump.finish()?;

    let muxer = MockMuxer::new();
    muxer.fail_next_write_with(videostore_node::segmenter::NativeStatus::ERROR);
    let writer = SegmentWriter::new(
        WriterSettings::new(SourceType::H265, dir.path(), 10, 1 << 20),
        Arc::new(muxer.clone()),
        Arc::new(NullSink),
    )?;

    let mut reader = PacketDumpReader::open(bytes.as_slice())?;
    let stats = Replayer::new("e2e", Arc::new(NullSink))
        .unpaced()
        .run(&writer, &mut reader, &AtomicBool::new(true))?;

    assert_eq!(stats.written, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(writer.state(), LifecycleState::Closed);
    assert_eq!(muxer.closes(), 1);
    assert_eq!((muxer.last_params().unwrap().width, muxer.last_params().unwrap().height), (1280, 720));
    Ok(())
}

#[test]
fn replay_rejects_codec_mismatch() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bytes = PacketDumpWriter::create(
        Vec::new(),
        DumpHeader {
            codec: PacketCodec::H264,
            width: 2,
            height: 2,
            timebase: DEFAULT_TIMEBASE,
        },
    )?
    .finish()?;

    let muxer = MockMuxer::new();
    let writer = SegmentWriter::new(
        WriterSettings::new(SourceType::H265, dir.path(), 10, 1 << 20),
        Arc::new(muxer.clone()),
        Arc::new(NullSink),
    )?;
    let mut reader = PacketDumpReader::open(bytes.as_slice())?;

    let result = Replayer::new("e2e", Arc::new(NullSink)).run(
        &writer,
        &mut reader,
        &AtomicBool::new(true),
    );
    assert!(result.is_err());
    assert_eq!(muxer.opens(), 0);
    assert_eq!(writer.state(), LifecycleState::Uninitialized);
    Ok(())
}
