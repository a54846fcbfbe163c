//! blobspot - live color-blob detector
//!
//! Opens a capture source and, per frame, classifies pixels into the
//! fixed color bands, cleans the masks, extracts contours, and reports
//! every blob above the area threshold. Runs until the stream ends, a
//! frame read fails, or ctrl-c is pressed.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use framescout::color::BlobDetector;
use framescout::ingest::{CaptureSource, FrameSource};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Capture source: a device index, an http(s) URL, or a file path.
    #[arg(long, env = "FRAMESCOUT_CAPTURE_SOURCE", default_value = "0")]
    source: String,
    /// Target frame rate hint for device and URL sources.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Preferred capture width for device sources.
    #[arg(long, default_value_t = 640)]
    width: u32,
    /// Preferred capture height for device sources.
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Save annotated frames with detections into this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let quit = Arc::new(AtomicBool::new(false));
    let quit_flag = quit.clone();
    ctrlc::set_handler(move || {
        quit_flag.store(true, Ordering::SeqCst);
    })
    .context("install quit handler")?;

    let mut source = match CaptureSource::open(&args.source, args.fps, args.width, args.height) {
        Ok(source) => source,
        Err(err) => {
            log::error!("could not open capture source: {:#}", err);
            return Ok(());
        }
    };
    if let Err(err) = source.connect() {
        log::error!("could not open capture source: {:#}", err);
        return Ok(());
    }

    if let Some(dir) = &args.snapshot_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create snapshot dir {}", dir.display()))?;
    }

    let detector = BlobDetector::new();
    let mut frame_count = 0u64;
    let mut last_health_log = Instant::now();

    log::info!("blobspot watching {}", args.source);

    while !quit.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("stream ended");
                break;
            }
            Err(err) => {
                log::error!("failed to grab frame: {:#}", err);
                break;
            }
        };

        let mut annotated = frame.to_rgb_image();
        let detections = detector.process(&frame, &mut annotated);

        if let Some(dir) = &args.snapshot_dir {
            if !detections.is_empty() {
                let path = dir.join(format!("frame_{:06}.jpg", frame.index));
                annotated
                    .save(&path)
                    .with_context(|| format!("save snapshot {}", path.display()))?;
            }
        }

        frame_count += 1;
        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = source.stats();
            log::info!(
                "capture health frames={} source={}",
                stats.frames_captured,
                stats.source
            );
            last_health_log = Instant::now();
        }
    }

    log::info!("processed {} frames", frame_count);
    Ok(())
}
