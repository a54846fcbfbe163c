//! Per-frame blob detection pipeline.

use image::{GrayImage, RgbImage};
use imageproc::point::Point;

use super::{band_mask, contour_area, hsv_plane, mask_contours, open, ColorBand, BANDS, MIN_BLOB_AREA};
use crate::annotate::draw_contour_outline;
use crate::frame::Frame;

/// One blob that passed the area filter.
#[derive(Clone, Debug)]
pub struct BlobDetection {
    pub band: &'static str,
    pub area: f64,
    pub points: Vec<Point<i32>>,
}

/// Classifies each frame against the fixed color bands and reports blobs.
#[derive(Debug, Default)]
pub struct BlobDetector;

impl BlobDetector {
    pub fn new() -> Self {
        Self
    }

    /// Process one frame: threshold each band, clean the mask, extract
    /// contours, keep blobs with area strictly greater than the threshold,
    /// and draw each kept contour's outline in the band's color onto
    /// `annotated`. Emits one notice per kept blob.
    pub fn process(&self, frame: &Frame, annotated: &mut RgbImage) -> Vec<BlobDetection> {
        let image = frame.to_rgb_image();
        let hsv = hsv_plane(&image);

        let mut detections = Vec::new();
        for band in &BANDS {
            let mask = band_mask(&hsv, frame.width, frame.height, band);
            let cleaned = open(&mask);
            for blob in blobs_over_threshold(&cleaned, band) {
                log::info!(
                    "{} object detected (area {:.0}, frame {})",
                    blob.band,
                    blob.area,
                    frame.index
                );
                draw_contour_outline(annotated, &blob.points, band.outline);
                detections.push(blob);
            }
        }
        detections
    }
}

/// Contours of `mask` whose area is strictly greater than `MIN_BLOB_AREA`.
/// A contour of exactly the threshold area is noise.
fn blobs_over_threshold(mask: &GrayImage, band: &ColorBand) -> Vec<BlobDetection> {
    mask_contours(mask)
        .into_iter()
        .filter_map(|contour| {
            let area = contour_area(&contour.points);
            if area > MIN_BLOB_AREA {
                Some(BlobDetection {
                    band: band.name,
                    area,
                    points: contour.points,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BAND_BLUE;
    use image::Luma;

    fn filled_rect_mask(w: u32, h: u32) -> GrayImage {
        let mut mask = GrayImage::new(w + 10, h + 10);
        for y in 4..4 + h {
            for x in 4..4 + w {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn area_filter_is_strictly_greater_than() {
        // 21x26 block: boundary polygon area 20 * 25 = 500, exactly the
        // threshold. Must not be reported.
        let at_threshold = filled_rect_mask(21, 26);
        assert!(blobs_over_threshold(&at_threshold, &BAND_BLUE).is_empty());

        // 22x26 block: 21 * 25 = 525. Must be reported.
        let above_threshold = filled_rect_mask(22, 26);
        let blobs = blobs_over_threshold(&above_threshold, &BAND_BLUE);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].band, "blue");
        assert_eq!(blobs[0].area, 525.0);
    }

    #[test]
    fn small_specks_are_ignored() {
        let speck = filled_rect_mask(4, 4);
        assert!(blobs_over_threshold(&speck, &BAND_BLUE).is_empty());
    }
}
