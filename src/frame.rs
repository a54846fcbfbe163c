//! Frame and stream-parameter types.
//!
//! A `Frame` is one decoded RGB image from a capture source. Frames are
//! owned by the processing loop for a single iteration and dropped
//! afterwards unless a routine persists them as an explicit side effect
//! (saved detection stills, sink writes).

use anyhow::{anyhow, Result};
use image::RgbImage;

/// One decoded frame: tightly packed RGB8 pixels plus dimensions.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of this frame within the run, starting at 0.
    pub index: u64,
}

impl Frame {
    /// Create a frame from raw RGB8 bytes. Fails when the byte count does
    /// not match `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    pub fn from_rgb_image(image: RgbImage, index: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            index,
        }
    }

    /// Tightly packed RGB8 pixel bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy this frame into an `RgbImage` for annotation or encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame byte length is validated at construction")
    }

    pub fn into_rgb_image(self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data)
            .expect("frame byte length is validated at construction")
    }
}

/// Stream parameters probed from an opened source. The output sink is
/// opened with these so its rate and geometry match the input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoParams {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoParams {
    pub fn new(fps: f64, width: u32, height: u32) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(anyhow!("frame rate must be positive, got {}", fps));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        Ok(Self { fps, width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_byte_count() {
        assert!(Frame::new(vec![0u8; 11], 2, 2, 0).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2, 0).is_ok());
    }

    #[test]
    fn frame_round_trips_through_rgb_image() {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(1, 1, image::Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(image.clone(), 7);
        assert_eq!(frame.width, 3);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.index, 7);
        assert_eq!(frame.to_rgb_image(), image);
    }

    #[test]
    fn params_reject_degenerate_values() {
        assert!(VideoParams::new(0.0, 640, 480).is_err());
        assert!(VideoParams::new(f64::NAN, 640, 480).is_err());
        assert!(VideoParams::new(24.0, 0, 480).is_err());
        assert!(VideoParams::new(24.0, 640, 480).is_ok());
    }
}
