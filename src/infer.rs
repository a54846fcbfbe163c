//! Inference front-end pipeline.
//!
//! Accepts exactly one input modality per invocation (a still image, a
//! local video file, or a remote video URL), runs a pretrained detection
//! model over it, and produces annotated output:
//!
//! - image: one annotated image, no video output
//! - video/URL: every annotated frame appended to an output video, plus
//!   one raw representative still saved per newly seen object class
//!
//! Failures are terminal for the invocation. A source that cannot be
//! opened processes zero frames; a mid-stream read failure is reported
//! and ends the run with resources released and partial output retained.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use rand::RngCore;
use serde::Deserialize;

use crate::annotate::draw_detections;
use crate::detect::{BackendRegistry, DetectorBackend};
use crate::ingest::{file, http, FileSource, FrameSource, HttpSource};
use crate::sink::VideoSink;

pub const MIN_IMAGE_SIZE: u32 = 320;
pub const MAX_IMAGE_SIZE: u32 = 1280;

/// Frame rate assumed for remote streams that do not declare one.
pub const DEFAULT_URL_FPS: u32 = 10;

/// The selected input kind. Exactly one is active per invocation; the
/// serialized form is a single-key map (`{"video_url": "http://..."}`),
/// so ambiguous or empty selections fail to parse.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum InputModality {
    Image(PathBuf),
    Video(PathBuf),
    VideoUrl(String),
}

impl InputModality {
    /// Build a modality from optional parts, rejecting empty and ambiguous
    /// combinations explicitly.
    pub fn from_parts(
        image: Option<PathBuf>,
        video: Option<PathBuf>,
        video_url: Option<String>,
    ) -> Result<Self> {
        match (image, video, video_url) {
            (Some(path), None, None) => Ok(Self::Image(path)),
            (None, Some(path), None) => Ok(Self::Video(path)),
            (None, None, Some(url)) => Ok(Self::VideoUrl(url)),
            (None, None, None) => Err(anyhow!(
                "no input selected; provide exactly one of image, video, video_url"
            )),
            _ => Err(anyhow!(
                "ambiguous input; provide exactly one of image, video, video_url"
            )),
        }
    }
}

/// Pass-through parameters for the inference call.
#[derive(Clone, Debug)]
pub struct InferenceOptions {
    pub model_id: String,
    pub image_size: u32,
    pub conf_threshold: f32,
    pub output_dir: PathBuf,
}

impl InferenceOptions {
    pub fn validate(&self) -> Result<()> {
        crate::detect::model::validate_model_id(&self.model_id)?;
        validate_image_size(self.image_size)?;
        validate_conf_threshold(self.conf_threshold)?;
        Ok(())
    }
}

pub fn validate_image_size(image_size: u32) -> Result<()> {
    if !(MIN_IMAGE_SIZE..=MAX_IMAGE_SIZE).contains(&image_size) {
        return Err(anyhow!(
            "image size {} out of range {}..={}",
            image_size,
            MIN_IMAGE_SIZE,
            MAX_IMAGE_SIZE
        ));
    }
    Ok(())
}

pub fn validate_conf_threshold(conf_threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&conf_threshold) {
        return Err(anyhow!(
            "confidence threshold {} out of range 0.0..=1.0",
            conf_threshold
        ));
    }
    Ok(())
}

/// Caller-owned accumulator of class labels seen during one video run.
/// Ensures at most one representative still is saved per class; reset by
/// constructing a fresh one per invocation.
#[derive(Clone, Debug, Default)]
pub struct SeenClasses {
    classes: BTreeSet<String>,
}

impl SeenClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a class. Returns true the first time it is seen.
    pub fn insert(&mut self, class_name: &str) -> bool {
        self.classes.insert(class_name.to_string())
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains(class_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }
}

/// Where a video run writes its artifacts.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Directory receiving saved stills and generated output names.
    pub dir: PathBuf,
    /// Explicit output video path; `None` generates one under `dir`.
    /// `stub://` paths select the counting memory sink.
    pub video_path: Option<String>,
}

/// Result of a video run.
#[derive(Clone, Debug)]
pub struct VideoOutcome {
    pub output_path: String,
    pub frames_written: u64,
    /// Classes first observed during this run, in observation order.
    pub newly_seen: Vec<String>,
    pub saved_stills: Vec<PathBuf>,
}

/// What one invocation produced: an annotated image XOR an output video.
#[derive(Clone, Debug)]
pub enum InferenceOutput {
    AnnotatedImage(PathBuf),
    OutputVideo(VideoOutcome),
}

/// Open the frame source for a video or URL modality.
pub fn open_modality_source(
    modality: &InputModality,
    target_fps: u32,
) -> Result<Box<dyn FrameSource>> {
    match modality {
        InputModality::Image(_) => Err(anyhow!("the image modality has no frame source")),
        InputModality::Video(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| anyhow!("video path is not valid UTF-8"))?
                .to_string();
            Ok(Box::new(FileSource::new(file::FileConfig {
                path,
                target_fps,
            })?))
        }
        InputModality::VideoUrl(url) if url.starts_with("stub://") => {
            Ok(Box::new(FileSource::new(file::FileConfig {
                path: url.clone(),
                target_fps,
            })?))
        }
        InputModality::VideoUrl(url) => Ok(Box::new(HttpSource::new(http::HttpConfig {
            url: url.clone(),
            target_fps,
        })?)),
    }
}

/// Run one inference pass over a still image and return the annotated
/// image. No video output is produced.
pub fn run_image(backend: &mut dyn DetectorBackend, image_path: &Path) -> Result<RgbImage> {
    let image = image::open(image_path)
        .with_context(|| format!("could not open image {}", image_path.display()))?
        .into_rgb8();
    let (width, height) = image.dimensions();
    let detections = backend.detect(image.as_raw(), width, height)?;
    for detection in &detections {
        log::info!(
            "detected {} ({:.2})",
            detection.class_name,
            detection.confidence
        );
    }
    let mut annotated = image;
    draw_detections(&mut annotated, &detections);
    Ok(annotated)
}

/// Process a video source end to end.
///
/// Opens the source, opens a sink matching its parameters, and for every
/// frame: runs inference, annotates a copy, saves the raw frame once per
/// newly seen class, and appends the annotated frame to the sink. The
/// loop ends at end of stream or on the first failed read (reported);
/// both paths release the source and close the sink.
pub fn run_video(
    backend: &mut dyn DetectorBackend,
    source: &mut dyn FrameSource,
    output: &OutputConfig,
    seen: &mut SeenClasses,
) -> Result<VideoOutcome> {
    source.connect()?;
    let params = source.params()?;

    let video_path = match &output.video_path {
        Some(path) => path.clone(),
        None => generated_output_path(&output.dir)?,
    };
    let mut sink = VideoSink::open(&video_path, params)?;

    let mut newly_seen = Vec::new();
    let mut saved_stills = Vec::new();

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                log::warn!("frame read failed; ending run: {:#}", err);
                break;
            }
        };

        let detections = backend.detect(frame.pixels(), frame.width, frame.height)?;

        let mut annotated = frame.to_rgb_image();
        draw_detections(&mut annotated, &detections);

        for detection in &detections {
            if seen.insert(&detection.class_name) {
                let still = output
                    .dir
                    .join(format!("detected_{}.jpg", detection.class_name));
                frame.to_rgb_image().save(&still).with_context(|| {
                    format!("save detection still {}", still.display())
                })?;
                log::info!("saved {} to {}", detection.class_name, still.display());
                newly_seen.push(detection.class_name.clone());
                saved_stills.push(still);
            }
        }

        sink.write_frame(&annotated)?;
    }

    let report = sink.finish()?;
    log::info!(
        "wrote {} annotated frames to {}",
        report.frames_written,
        report.path
    );
    Ok(VideoOutcome {
        output_path: report.path,
        frames_written: report.frames_written,
        newly_seen,
        saved_stills,
    })
}

/// Run one invocation for any modality, resolving the backend through the
/// registry. This is the operation the CLI and the HTTP surface share.
pub fn run(
    registry: &BackendRegistry,
    modality: &InputModality,
    options: &InferenceOptions,
) -> Result<InferenceOutput> {
    options.validate()?;
    let backend =
        registry.get_or_load(&options.model_id, options.image_size, options.conf_threshold)?;
    let mut backend = backend
        .lock()
        .map_err(|_| anyhow!("detector backend lock poisoned"))?;

    match modality {
        InputModality::Image(path) => {
            let annotated = run_image(&mut *backend, path)?;
            std::fs::create_dir_all(&options.output_dir).with_context(|| {
                format!("create output dir {}", options.output_dir.display())
            })?;
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("image");
            let out_path = options.output_dir.join(format!("annotated_{}.jpg", stem));
            annotated
                .save(&out_path)
                .with_context(|| format!("save annotated image {}", out_path.display()))?;
            Ok(InferenceOutput::AnnotatedImage(out_path))
        }
        InputModality::Video(_) | InputModality::VideoUrl(_) => {
            let mut source = open_modality_source(modality, DEFAULT_URL_FPS)?;
            std::fs::create_dir_all(&options.output_dir).with_context(|| {
                format!("create output dir {}", options.output_dir.display())
            })?;
            let mut seen = SeenClasses::new();
            let outcome = run_video(
                &mut *backend,
                source.as_mut(),
                &OutputConfig {
                    dir: options.output_dir.clone(),
                    video_path: None,
                },
                &mut seen,
            )?;
            Ok(InferenceOutput::OutputVideo(outcome))
        }
    }
}

fn generated_output_path(dir: &Path) -> Result<String> {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    let path = dir.join(format!("annotated_{:016x}.webm", u64::from_le_bytes(bytes)));
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("output dir is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_parses_from_single_key_maps() {
        let modality: InputModality = serde_json::from_str(r#"{"image": "cat.jpg"}"#).unwrap();
        assert_eq!(modality, InputModality::Image(PathBuf::from("cat.jpg")));

        let modality: InputModality =
            serde_json::from_str(r#"{"video_url": "http://example/stream"}"#).unwrap();
        assert_eq!(
            modality,
            InputModality::VideoUrl("http://example/stream".to_string())
        );
    }

    #[test]
    fn modality_rejects_ambiguous_and_empty_maps() {
        assert!(serde_json::from_str::<InputModality>(r#"{}"#).is_err());
        assert!(serde_json::from_str::<InputModality>(
            r#"{"image": "a.jpg", "video": "b.webm"}"#
        )
        .is_err());
    }

    #[test]
    fn from_parts_enforces_exactly_one() {
        assert!(InputModality::from_parts(None, None, None).is_err());
        assert!(InputModality::from_parts(
            Some(PathBuf::from("a.jpg")),
            Some(PathBuf::from("b.webm")),
            None
        )
        .is_err());
        assert_eq!(
            InputModality::from_parts(None, None, Some("http://x/y".into())).unwrap(),
            InputModality::VideoUrl("http://x/y".to_string())
        );
    }

    #[test]
    fn options_validation_bounds_the_surface() {
        let mut options = InferenceOptions {
            model_id: "stub".to_string(),
            image_size: 640,
            conf_threshold: 0.25,
            output_dir: PathBuf::from("out"),
        };
        assert!(options.validate().is_ok());
        options.image_size = 64;
        assert!(options.validate().is_err());
        options.image_size = 640;
        options.conf_threshold = 1.5;
        assert!(options.validate().is_err());
    }

    #[test]
    fn seen_classes_records_first_observation_only() {
        let mut seen = SeenClasses::new();
        assert!(seen.insert("person"));
        assert!(!seen.insert("person"));
        assert!(seen.insert("car"));
        assert_eq!(seen.len(), 2);
        assert!(seen.contains("car"));
    }
}
