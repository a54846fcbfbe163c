//! Band masks and mask cleanup.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

use super::ColorBand;

/// Binary mask of pixels whose HSV components fall inside the band.
/// Both bounds are inclusive. Member pixels are 255, the rest 0.
pub fn band_mask(hsv: &[[u8; 3]], width: u32, height: u32, band: &ColorBand) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for (pixel, value) in hsv.iter().zip(mask.pixels_mut()) {
        let inside = pixel
            .iter()
            .zip(band.lower.iter().zip(band.upper.iter()))
            .all(|(component, (lower, upper))| component >= lower && component <= upper);
        if inside {
            *value = Luma([255u8]);
        }
    }
    mask
}

/// Noise suppression: one erosion pass followed by two dilation passes,
/// all with a 5x5 square structuring element. The extra dilation pass is
/// deliberate; surviving regions come back slightly grown.
pub fn open(mask: &GrayImage) -> GrayImage {
    let eroded = erode(mask, Norm::LInf, 2);
    let grown = dilate(&eroded, Norm::LInf, 2);
    dilate(&grown, Norm::LInf, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{hsv_plane, BAND_BLUE, BAND_BROWN};
    use image::RgbImage;

    fn blue_square_image() -> RgbImage {
        let mut image = RgbImage::new(40, 40);
        for y in 10..30 {
            for x in 10..30 {
                image.put_pixel(x, y, image::Rgb([0, 0, 255]));
            }
        }
        image
    }

    #[test]
    fn band_mask_selects_only_matching_pixels() {
        let image = blue_square_image();
        let hsv = hsv_plane(&image);
        let blue = band_mask(&hsv, 40, 40, &BAND_BLUE);
        let brown = band_mask(&hsv, 40, 40, &BAND_BROWN);

        assert_eq!(blue.get_pixel(15, 15)[0], 255);
        assert_eq!(blue.get_pixel(0, 0)[0], 0);
        assert!(brown.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn band_bounds_are_inclusive() {
        let band = BAND_BLUE;
        let hsv = [[band.lower[0], band.lower[1], band.lower[2]]];
        let mask = band_mask(&hsv, 1, 1, &band);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);

        let hsv = [[band.upper[0], band.upper[1], band.upper[2]]];
        let mask = band_mask(&hsv, 1, 1, &band);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn open_removes_isolated_specks() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(5, 5, Luma([255]));
        mask.put_pixel(12, 7, Luma([255]));
        let cleaned = open(&mask);
        assert!(cleaned.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn open_grows_surviving_regions() {
        // A 10x10 block survives erosion and gains two pixels per side net:
        // -2 from the erosion pass, +2 from each of the two dilation passes.
        let mut mask = GrayImage::new(30, 30);
        for y in 10..20 {
            for x in 10..20 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let cleaned = open(&mask);
        assert_eq!(cleaned.get_pixel(8, 8)[0], 255);
        assert_eq!(cleaned.get_pixel(21, 21)[0], 255);
        assert_eq!(cleaned.get_pixel(7, 7)[0], 0);
    }
}
