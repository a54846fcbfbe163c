//! RGB to HSV conversion in the 8-bit convention (H 0..=179, S and V
//! 0..=255), so the fixed band constants apply to the converted plane
//! unchanged.

use image::RgbImage;

/// Convert one RGB8 pixel to 8-bit HSV.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let h_deg = if delta <= f32::EPSILON {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };
    // Halved to fit 8 bits; 360 wraps to 0 before halving.
    let h = (h_deg / 2.0).round() % 180.0;

    [h as u8, s.round() as u8, v.round() as u8]
}

/// Convert a whole image into a row-major HSV plane.
pub fn hsv_plane(image: &RgbImage) -> Vec<[u8; 3]> {
    image
        .pixels()
        .map(|pixel| rgb_to_hsv(pixel[0], pixel[1], pixel[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_anchors() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
    }

    #[test]
    fn gray_has_no_saturation() {
        assert_eq!(rgb_to_hsv(40, 40, 40), [0, 0, 40]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(255, 255, 255), [0, 0, 255]);
    }

    #[test]
    fn brown_tone_lands_in_the_brown_band() {
        let [h, s, v] = rgb_to_hsv(150, 90, 30);
        assert!((10..=20).contains(&h), "h={}", h);
        assert!(s >= 100);
        assert!((20..=200).contains(&v), "v={}", v);
    }

    #[test]
    fn plane_matches_per_pixel_conversion() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([0, 0, 255]));
        image.put_pixel(1, 0, image::Rgb([150, 90, 30]));
        let plane = hsv_plane(&image);
        assert_eq!(plane[0], rgb_to_hsv(0, 0, 255));
        assert_eq!(plane[1], rgb_to_hsv(150, 90, 30));
    }
}
