//! Frame ingestion sources.
//!
//! This module provides the sources a processing loop can read frames from:
//! - Local video files (feature: video-ffmpeg)
//! - Remote HTTP MJPEG/JPEG URLs
//! - Local capture devices (feature: ingest-v4l2)
//! - Synthetic `stub://` clips (testing)
//!
//! All sources produce tightly packed RGB8 `Frame`s and expose the stream
//! parameters (rate, geometry) an output sink needs. Sources own their
//! handles and release them on drop, on every exit path.

use anyhow::{anyhow, Result};

use crate::frame::{Frame, VideoParams};

pub mod file;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod http;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use file::FileSource;
pub use http::HttpSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// A blocking frame producer.
///
/// `next_frame` returns `Ok(None)` at end of stream and `Err` on a failed
/// read; both terminate the caller's loop. There is no retry logic: a
/// single failed read ends the run.
pub trait FrameSource {
    /// Open the underlying device/stream. Must be called before reads.
    fn connect(&mut self) -> Result<()>;

    /// Stream parameters, available once connected.
    fn params(&self) -> Result<VideoParams>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Frame statistics for health logging.
    fn stats(&self) -> SourceStats;
}

/// Statistics shared by all source kinds.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// A capture source selected from a spec string:
/// - a bare integer selects a local capture device (`/dev/video<N>`),
/// - `http(s)://` selects a remote MJPEG/JPEG stream,
/// - `stub://` selects a synthetic clip,
/// - anything else is treated as a local video file path.
pub enum CaptureSource {
    File(FileSource),
    Http(HttpSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Source),
}

impl CaptureSource {
    pub fn open(spec: &str, target_fps: u32, width: u32, height: u32) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(anyhow!("capture source spec is empty"));
        }
        if let Ok(device_index) = spec.parse::<u32>() {
            #[cfg(feature = "ingest-v4l2")]
            {
                let config = v4l2::V4l2Config {
                    device: format!("/dev/video{}", device_index),
                    target_fps,
                    width,
                    height,
                };
                return Ok(Self::Device(V4l2Source::new(config)?));
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                let _ = (width, height);
                return Err(anyhow!(
                    "device index {} requires the ingest-v4l2 feature",
                    device_index
                ));
            }
        }
        if spec.starts_with("http://") || spec.starts_with("https://") {
            return Ok(Self::Http(HttpSource::new(http::HttpConfig {
                url: spec.to_string(),
                target_fps,
            })?));
        }
        Ok(Self::File(FileSource::new(file::FileConfig {
            path: spec.to_string(),
            target_fps,
        })?))
    }
}

impl FrameSource for CaptureSource {
    fn connect(&mut self) -> Result<()> {
        match self {
            Self::File(source) => source.connect(),
            Self::Http(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            Self::Device(source) => source.connect(),
        }
    }

    fn params(&self) -> Result<VideoParams> {
        match self {
            Self::File(source) => source.params(),
            Self::Http(source) => source.params(),
            #[cfg(feature = "ingest-v4l2")]
            Self::Device(source) => source.params(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self {
            Self::File(source) => source.next_frame(),
            Self::Http(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            Self::Device(source) => source.next_frame(),
        }
    }

    fn stats(&self) -> SourceStats {
        match self {
            Self::File(source) => source.stats(),
            Self::Http(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            Self::Device(source) => source.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_empty_spec() {
        assert!(CaptureSource::open("", 10, 640, 480).is_err());
    }

    #[test]
    fn open_routes_stub_paths_to_file_source() {
        let source = CaptureSource::open("stub://clip?frames=2", 10, 640, 480).unwrap();
        assert!(matches!(source, CaptureSource::File(_)));
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn open_reports_missing_device_feature() {
        let err = CaptureSource::open("0", 10, 640, 480).err().unwrap();
        assert!(err.to_string().contains("ingest-v4l2"));
    }
}
