#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::names;
use crate::detect::result::{BoundingBox, Detection};

type YoloPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based backend for NMS-free YOLO detection models.
///
/// Loads a local ONNX model with a fixed square input and decodes its
/// end-to-end output: `[1, N, 6]` rows of `x1, y1, x2, y2, confidence,
/// class_id` in input-canvas coordinates. No network I/O happens here;
/// weight fetching is the model resolver's job.
pub struct TractYolo {
    model: YoloPlan,
    input_size: u32,
    conf_threshold: f32,
}

impl TractYolo {
    /// Load an ONNX model from disk and prepare it for inference at the
    /// given square input size.
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32, conf_threshold: f32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            conf_threshold,
        })
    }

    /// Letterbox the frame onto the model canvas: aspect-preserving resize
    /// anchored top-left, the rest filled with the training pad value.
    /// Returns the tensor and the resize ratio for decoding.
    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<(Tensor, f32)> {
        let image = RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame byte length does not match {}x{}", width, height))?;
        let size = self.input_size;
        let ratio = (size as f32 / width as f32).min(size as f32 / height as f32);
        let scaled_w = ((width as f32 * ratio).round() as u32).clamp(1, size);
        let scaled_h = ((height as f32 * ratio).round() as u32).clamp(1, size);
        let resized =
            image::imageops::resize(&image, scaled_w, scaled_h, image::imageops::FilterType::Triangle);

        let mut input = tract_ndarray::Array4::<f32>::from_elem(
            (1, 3, size as usize, size as usize),
            144.0 / 255.0,
        );
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = f32::from(pixel[0]) / 255.0;
            input[[0, 1, y as usize, x as usize]] = f32::from(pixel[1]) / 255.0;
            input[[0, 2, y as usize, x as usize]] = f32::from(pixel[2]) / 255.0;
        }

        Ok((input.into_tensor(), ratio))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        ratio: f32,
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let preds = view
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("unexpected model output rank; expected [1, N, 6]")?;
        if preds.shape()[2] != 6 {
            return Err(anyhow!(
                "unexpected model output shape {:?}; expected [1, N, 6]",
                preds.shape()
            ));
        }

        let (frame_w, frame_h) = (width as f32, height as f32);
        let mut detections = Vec::new();
        for row in preds.index_axis(tract_ndarray::Axis(0), 0).outer_iter() {
            let confidence = row[4];
            if confidence < self.conf_threshold {
                continue;
            }
            let class_id = row[5] as usize;
            if class_id >= names::CLASS_NAMES.len() {
                continue;
            }

            let x1 = (row[0] / ratio).max(0.0);
            let y1 = (row[1] / ratio).max(0.0);
            let x2 = (row[2] / ratio).min(frame_w);
            let y2 = (row[3] / ratio).min(frame_h);
            let w = x2 - x1;
            let h = y2 - y1;
            if w <= 0.0 || h <= 0.0 {
                continue;
            }

            detections.push(Detection {
                bbox: BoundingBox { x: x1, y: y1, w, h },
                confidence,
                class_id,
                class_name: names::class_name(class_id).to_string(),
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractYolo {
    fn name(&self) -> &'static str {
        "tract-yolo"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let (input, ratio) = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, ratio, width, height)
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.input_size;
        let blank = vec![0u8; (size * size * 3) as usize];
        self.detect(&blank, size, size).map(|_| ())
    }
}
