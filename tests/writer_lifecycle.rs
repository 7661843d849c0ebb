// tests/writer_lifecycle.rs
// Lifecycle and argument checks against the public writer API

use std::path::Path;
use std::sync::Arc;

use videostore_node::core::NullSink;
use videostore_node::testing::mocks::MockMuxer;
use videostore_node::{LifecycleState, SegmentWriter, SourceType, StoreError, WriterSettings};

fn writer(dir: &Path, muxer: &MockMuxer) -> SegmentWriter {
    SegmentWriter::new(
        WriterSettings::new(SourceType::H264, dir, 10, 1024),
        Arc::new(muxer.clone()),
        Arc::new(NullSink),
    )
    .unwrap()
}

#[test]
fn write_before_init_is_not_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);

    let err = w.write_packet(&[0, 0, 1, 0x65], 0, 0, true).unwrap_err();
    assert!(matches!(err, StoreError::NotInitialized));
    assert!(err.is_invalid_state());
    assert!(muxer.packets().is_empty());
}

#[test]
fn write_after_close_is_already_closed() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);
    w.init(640, 480).unwrap();
    w.close();

    let err = w.write_packet(&[1], 0, 0, true).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyClosed));
    assert!(muxer.packets().is_empty());
}

#[test]
fn second_init_leaves_first_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);

    w.init(640, 480).unwrap();
    let err = w.init(1920, 1080).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyInitialized));

    assert_eq!(muxer.opens(), 1);
    assert_eq!(muxer.closes(), 0);
    assert_eq!(muxer.last_params().unwrap().width, 640);

    w.write_packet(&[7, 7], 1, 1, false).unwrap();
    assert_eq!(muxer.packets().len(), 1);
}

#[test]
fn init_after_close_is_already_closed() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);
    w.init(640, 480).unwrap();
    w.close();

    assert!(matches!(w.init(640, 480), Err(StoreError::AlreadyClosed)));
    assert_eq!(muxer.opens(), 1);
}

#[test]
fn bad_geometry_never_reaches_muxer() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);

    for (width, height) in [(0, 480), (640, 0), (-1, 480), (640, -720), (0, 0)] {
        let err = w.init(width, height).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(err.is_invalid_argument());
    }
    assert_eq!(muxer.opens(), 0);
    assert_eq!(w.state(), LifecycleState::Uninitialized);
}

#[test]
fn close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);
    w.init(640, 480).unwrap();

    for _ in 0..5 {
        w.close();
        assert_eq!(w.state(), LifecycleState::Closed);
    }
    drop(w);
    assert_eq!(muxer.closes(), 1);
}

#[test]
fn empty_payload_never_reaches_muxer() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);
    w.init(640, 480).unwrap();

    let err = w.write_packet(&[], 0, 0, true).unwrap_err();
    assert!(matches!(err, StoreError::EmptyPayload));
    assert!(muxer.events().iter().all(|e| !matches!(
        e,
        videostore_node::testing::MuxerEvent::WriteStart(_)
    )));
    assert_eq!(w.state(), LifecycleState::Initialized);
}

#[test]
fn packets_reach_muxer_verbatim_and_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = writer(dir.path(), &muxer);
    w.init(1280, 720).unwrap();

    w.write_packet(&[0, 0, 0, 1, 0x67], 9000, 6000, true).unwrap();
    w.write_packet(&[0, 0, 0, 1, 0x41], 12000, 9000, false).unwrap();
    w.write_packet(&[0, 0, 0, 1, 0x41], 15000, 12000, false).unwrap();
    w.close();

    let packets = muxer.packets();
    assert_eq!(packets.len(), 3);
    assert_eq!(packets[0].payload, vec![0, 0, 0, 1, 0x67]);
    assert_eq!((packets[0].pts, packets[0].dts), (9000, 6000));
    assert!(packets[0].is_keyframe);
    assert!(!packets[1].is_keyframe);
    assert_eq!(
        packets.iter().map(|p| p.pts).collect::<Vec<_>>(),
        vec![9000, 12000, 15000]
    );
}

#[test]
fn h265_writer_opens_h265_session() {
    let dir = tempfile::tempdir().unwrap();
    let muxer = MockMuxer::new();
    let w = SegmentWriter::new(
        WriterSettings::new(SourceType::H265, dir.path(), 5, 1024),
        Arc::new(muxer.clone()),
        Arc::new(NullSink),
    )
    .unwrap();
    w.init(3840, 2160).unwrap();

    let params = muxer.last_params().unwrap();
    assert_eq!(params.codec, videostore_node::PacketCodec::H265);
    assert_eq!(params.segment_seconds, 5);
    assert!(params.output_pattern.template().ends_with("%Y-%m-%d_%H-%M-%S.mp4"));
}
