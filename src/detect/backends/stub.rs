use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::names::class_name;
use crate::detect::result::{BoundingBox, Detection};

/// Deterministic backend driven by a marker pixel at (0,0).
///
/// The synthetic clip source stamps `(class_id, 200, 0)` into that pixel;
/// this backend reports one centered detection for it, with the confidence
/// taken from the green channel. Frames without a marker yield nothing.
pub struct StubBackend {
    conf_threshold: f32,
}

impl StubBackend {
    pub fn new(conf_threshold: f32) -> Self {
        Self { conf_threshold }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let Some([r, g, b]) = pixels.get(..3).map(|p| [p[0], p[1], p[2]]) else {
            return Ok(vec![]);
        };
        if b != 0 || g < 128 || r >= 80 {
            return Ok(vec![]);
        }
        let confidence = f32::from(g) / 255.0;
        if confidence < self.conf_threshold {
            return Ok(vec![]);
        }
        let class_id = r as usize;
        let (w, h) = (width as f32, height as f32);
        Ok(vec![Detection {
            bbox: BoundingBox {
                x: w / 4.0,
                y: h / 4.0,
                w: w / 2.0,
                h: h / 2.0,
            },
            confidence,
            class_id,
            class_name: class_name(class_id).to_string(),
        }])
    }
}
