//! Color-blob detection.
//!
//! Classifies pixels of a frame into fixed hue/saturation/value bands,
//! cleans the resulting masks with fixed morphology, extracts contours,
//! and reports every blob whose area passes the fixed threshold.
//!
//! The bands, the morphology (one 5x5 erosion pass, two 5x5 dilation
//! passes), and the area threshold are hard-coded; this detector has no
//! tuning surface.

mod contour;
mod detector;
mod hsv;
mod mask;

pub use contour::{contour_area, mask_contours};
pub use detector::{BlobDetection, BlobDetector};
pub use hsv::{hsv_plane, rgb_to_hsv};
pub use mask::{band_mask, open};

use image::Rgb;

/// A fixed range of hue/saturation/value classifying pixels into a named
/// color category. Components use the 8-bit convention (H 0..=179,
/// S 0..=255, V 0..=255); both bounds are inclusive.
#[derive(Clone, Copy, Debug)]
pub struct ColorBand {
    pub name: &'static str,
    pub lower: [u8; 3],
    pub upper: [u8; 3],
    /// Outline color used when drawing matched contours.
    pub outline: Rgb<u8>,
}

pub const BAND_BLUE: ColorBand = ColorBand {
    name: "blue",
    lower: [100, 150, 50],
    upper: [140, 255, 255],
    outline: Rgb([0, 0, 255]),
};

pub const BAND_BROWN: ColorBand = ColorBand {
    name: "brown",
    lower: [10, 100, 20],
    upper: [20, 255, 200],
    outline: Rgb([255, 0, 0]),
};

/// The two bands the detector watches, in reporting order.
pub const BANDS: [ColorBand; 2] = [BAND_BLUE, BAND_BROWN];

/// Contours at or below this area are treated as noise. Strictly greater
/// areas are reported.
pub const MIN_BLOB_AREA: f64 = 500.0;
