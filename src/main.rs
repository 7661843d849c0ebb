// src/main.rs

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use videostore_node::config::{self, Config};
use videostore_node::core::{FacadeSink, LogSink};
use videostore_node::replay::{PacketDumpReader, Replayer};
use videostore_node::segmenter::{FfmpegMuxer, SegmentWriter, WriterSettings};
use videostore_node::storage::{RescanProbe, RetentionWorker, StorageQuota, cleanup_storage_with};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let mut args = std::env::args().skip(1);
    let cfg_path = args.next().unwrap_or_else(|| "videostore.toml".into());
    let dump_path = args.next();

    let cfg: Config = config::load(&cfg_path)?;
    info!("[videostore] loaded {}", cfg_path);

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("[videostore] shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    let log: Arc<dyn LogSink> = Arc::new(FacadeSink);
    let storage_dir = Path::new(&cfg.storage.path);
    std::fs::create_dir_all(storage_dir)
        .with_context(|| format!("creating {}", storage_dir.display()))?;

    // ------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------
    let quota = StorageQuota::new(storage_dir, cfg.storage.budget_bytes(), log.clone());
    let mut retention =
        RetentionWorker::spawn(Box::new(quota), cfg.retention.interval(), log.clone())?;
    info!(
        "[videostore] retention every {}s, budget {} GB at {}",
        cfg.retention.interval_secs,
        cfg.storage.size_gb,
        storage_dir.display()
    );

    // ------------------------------------------------------------
    // Replay or idle
    // ------------------------------------------------------------
    match dump_path {
        Some(path) => {
            let result = run_replay(&cfg, &path, log.clone(), &running);
            retention.stop();
            result?;

            // Worker is stopped, so this pass cannot overlap with it.
            let report = cleanup_storage_with(
                storage_dir,
                cfg.storage.budget_bytes(),
                &mut RescanProbe,
                log.as_ref(),
            )?;
            info!(
                "[videostore] final cleanup removed {} files, {} bytes on disk",
                report.deleted.len(),
                report.final_bytes
            );
        }
        None => {
            info!("[videostore] running retention only – Ctrl+C to stop");
            while running.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(100));
            }
            retention.stop();
        }
    }

    info!(
        "[videostore] stopped after {} retention passes ({} failed)",
        retention.passes(),
        retention.failures()
    );
    Ok(())
}

fn run_replay(
    cfg: &Config,
    path: &str,
    log: Arc<dyn LogSink>,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening dump {}", path))?;
    let mut dump = PacketDumpReader::open(BufReader::new(file))?;
    let header = dump.header();
    info!(
        "[videostore] replaying {} dump {} ({}x{}, timebase {}/{})",
        header.codec, path, header.width, header.height, header.timebase.num, header.timebase.den
    );

    let muxer = Arc::new(FfmpegMuxer::new(&cfg.muxer.ffmpeg, log.clone()));
    let writer = SegmentWriter::new(WriterSettings::from_config(cfg), muxer, log.clone())?;

    // ffmpeg stamps input on arrival, so the dump is replayed at its recorded pace.
    let stats = Replayer::new(path, log).run(&writer, &mut dump, running)?;
    info!("[videostore] replay wrote {} packets", stats.written);
    if stats.failed > 0 {
        warn!("[videostore] {} packets failed to write", stats.failed);
    }
    Ok(())
}
