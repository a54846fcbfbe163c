//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file. Real decoding is
//! done by FFmpeg (feature: video-ffmpeg); `stub://` paths select a
//! synthetic clip source used by the test suite.
//!
//! The file source is responsible for:
//! - Decoding video frames in-memory
//! - Reporting the stream's rate and geometry
//! - Producing `Frame` instances in presentation order
//!
//! It MUST NOT fetch remote URLs; those belong to `HttpSource`.

use anyhow::{anyhow, Result};

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, SourceStats};
use crate::frame::{Frame, VideoParams};

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path, or a `stub://` clip spec.
    pub path: String,
    /// Frame rate reported for synthetic clips (real files report their own).
    pub target_fps: u32,
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticClipSource),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticClipSource::new(config)?),
            })
        } else {
            #[cfg(feature = "video-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "video-ffmpeg"))]
            {
                Err(anyhow!("file ingestion requires the video-ffmpeg feature"))
            }
        }
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn params(&self) -> Result<VideoParams> {
        match &self.backend {
            FileBackend::Synthetic(source) => source.params(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.params(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic clip source (stub://) for tests
// ----------------------------------------------------------------------------

/// Synthetic clip controlled by query parameters in the stub spec:
///
/// `stub://clip?frames=12&classes=3&w=64&h=48&fail=read:5`
///
/// - `frames`:  clip length; the source reports end-of-stream afterwards
/// - `classes`: stamp a marker pixel at (0,0) cycling through that many
///   class ids (consumed by the stub detection backend)
/// - `w`/`h`:   frame geometry (default 640x480)
/// - `fail`:    `open` fails `connect()`; `read:<n>` fails the n-th read
struct SyntheticClipSource {
    config: FileConfig,
    width: u32,
    height: u32,
    total_frames: Option<u64>,
    marker_classes: Option<u8>,
    fail: Option<FailureMode>,
    frame_count: u64,
    connected: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum FailureMode {
    Open,
    Read(u64),
}

impl SyntheticClipSource {
    fn new(config: FileConfig) -> Result<Self> {
        let url = url::Url::parse(&config.path)
            .map_err(|e| anyhow!("invalid stub clip spec '{}': {}", config.path, e))?;
        let mut width = 640u32;
        let mut height = 480u32;
        let mut total_frames = None;
        let mut marker_classes = None;
        let mut fail = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "w" => width = parse_query_u32(&value, "w")?,
                "h" => height = parse_query_u32(&value, "h")?,
                "frames" => total_frames = Some(parse_query_u32(&value, "frames")? as u64),
                "classes" => {
                    let classes = parse_query_u32(&value, "classes")?;
                    if classes == 0 || classes > 80 {
                        return Err(anyhow!("stub clip classes must be in 1..=80"));
                    }
                    marker_classes = Some(classes as u8);
                }
                "fail" => {
                    fail = Some(if value == "open" {
                        FailureMode::Open
                    } else if let Some(n) = value.strip_prefix("read:") {
                        FailureMode::Read(
                            n.parse()
                                .map_err(|_| anyhow!("stub clip fail=read:<n> needs an integer"))?,
                        )
                    } else {
                        return Err(anyhow!("unknown stub clip failure mode '{}'", value));
                    });
                }
                other => return Err(anyhow!("unknown stub clip parameter '{}'", other)),
            }
        }
        Ok(Self {
            config,
            width,
            height,
            total_frames,
            marker_classes,
            fail,
            frame_count: 0,
            connected: false,
        })
    }

    fn connect(&mut self) -> Result<()> {
        if self.fail == Some(FailureMode::Open) {
            return Err(anyhow!(
                "could not open capture source {}",
                self.config.path
            ));
        }
        self.connected = true;
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn params(&self) -> Result<VideoParams> {
        if !self.connected {
            return Err(anyhow!("source not connected; call connect() first"));
        }
        VideoParams::new(self.config.target_fps.max(1) as f64, self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("source not connected; call connect() first"));
        }
        if let Some(FailureMode::Read(n)) = self.fail {
            if self.frame_count == n {
                return Err(anyhow!("failed to read frame {}", n));
            }
        }
        if let Some(total) = self.total_frames {
            if self.frame_count >= total {
                return Ok(None);
            }
        }
        let index = self.frame_count;
        let frame = Frame::new(self.generate_pixels(index), self.width, self.height, index)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn generate_pixels(&self, index: u64) -> Vec<u8> {
        let pixel_count = (self.width * self.height * 3) as usize;
        // Uniform dark gray keeps synthetic frames outside every color band.
        let mut pixels = vec![40u8; pixel_count];
        if let Some(classes) = self.marker_classes {
            pixels[0] = (index % classes as u64) as u8;
            pixels[1] = 200;
            pixels[2] = 0;
        }
        pixels
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.path.clone(),
        }
    }
}

fn parse_query_u32(value: &str, key: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| anyhow!("stub clip parameter '{}' must be an integer", key))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_clip(spec: &str) -> FileSource {
        let mut source = FileSource::new(FileConfig {
            path: spec.to_string(),
            target_fps: 10,
        })
        .unwrap();
        source.connect().unwrap();
        source
    }

    #[test]
    fn synthetic_clip_ends_after_requested_frames() {
        let mut source = open_clip("stub://clip?frames=3");
        for expected in 0..3u64 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.index, expected);
        }
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn synthetic_clip_marks_classes_cyclically() {
        let mut source = open_clip("stub://clip?frames=4&classes=2");
        let markers: Vec<u8> = (0..4)
            .map(|_| source.next_frame().unwrap().unwrap().pixels()[0])
            .collect();
        assert_eq!(markers, vec![0, 1, 0, 1]);
    }

    #[test]
    fn synthetic_clip_injects_read_failure() {
        let mut source = open_clip("stub://clip?frames=9&fail=read:2");
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn synthetic_clip_injects_open_failure() {
        let mut source = FileSource::new(FileConfig {
            path: "stub://clip?fail=open".to_string(),
            target_fps: 10,
        })
        .unwrap();
        assert!(source.connect().is_err());
    }

    #[test]
    fn rejects_remote_urls() {
        assert!(FileSource::new(FileConfig {
            path: "rtsp://camera-1/stream".to_string(),
            target_fps: 10,
        })
        .is_err());
    }
}
