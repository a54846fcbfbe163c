//! framescout
//!
//! Two small video-analysis tools sharing one crate:
//!
//! - **Color-blob detection**: per-frame classification of pixels into
//!   fixed hue/saturation/value bands, mask cleanup, contour extraction,
//!   and area-filtered blob reporting (`blobspot`).
//! - **Inference front-end**: single-shot or per-frame object detection
//!   with a named pretrained model over a still image, a local video, or
//!   a remote video URL, with annotated output and one representative
//!   still saved per newly seen class (`scout`, `scoutd`).
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (files, HTTP streams, capture devices, stubs)
//! - `color`: band masks, morphology, contours, blob detection
//! - `detect`: detection backends, model resolution, backend registry
//! - `infer`: modality selection and the front-end pipelines
//! - `sink`: the output video sink
//! - `api`: the thin HTTP surface wrapping `infer`
//!
//! Both pipelines are single-threaded and blocking; every failure is
//! terminal for the invocation, and sources/sinks are released on every
//! exit path.

pub mod annotate;
pub mod api;
pub mod color;
pub mod config;
pub mod detect;
pub mod frame;
pub mod infer;
pub mod ingest;
pub mod sink;
pub mod ui;

pub use color::{BlobDetection, BlobDetector};
pub use config::ScoutConfig;
pub use detect::{BackendRegistry, Detection, DetectorBackend};
pub use frame::{Frame, VideoParams};
pub use infer::{
    InferenceOptions, InferenceOutput, InputModality, OutputConfig, SeenClasses, VideoOutcome,
};
pub use ingest::{CaptureSource, FrameSource};
pub use sink::{SinkReport, VideoSink};
