//! Contour extraction and area measurement.

use image::GrayImage;
use imageproc::contours::{find_contours, Contour};
use imageproc::point::Point;

/// Extract the boundary polygons of every connected mask region, outer
/// borders and nested hole borders alike.
pub fn mask_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
}

/// Polygon (shoelace) area of a contour's boundary points.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        twice_area += i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y);
    }
    (twice_area.abs() as f64) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect_mask(width: u32, height: u32, w: u32, h: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for y in 2..2 + h {
            for x in 2..2 + w {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn rect_contour_area_is_boundary_polygon_area() {
        // A filled w x h pixel block has a boundary polygon through the
        // border pixels, enclosing (w-1) * (h-1).
        let mask = filled_rect_mask(40, 40, 11, 21);
        let contours = mask_contours(&mask);
        let outer = contours
            .iter()
            .find(|c| c.border_type == imageproc::contours::BorderType::Outer)
            .expect("outer contour");
        assert_eq!(contour_area(&outer.points), 200.0);
    }

    #[test]
    fn degenerate_contours_have_zero_area() {
        assert_eq!(contour_area(&[]), 0.0);
        assert_eq!(contour_area(&[Point::new(3, 3), Point::new(4, 3)]), 0.0);
    }

    #[test]
    fn nested_regions_report_hole_borders() {
        let mut mask = GrayImage::new(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        for y in 12..18 {
            for x in 12..18 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        let contours = mask_contours(&mask);
        assert!(contours
            .iter()
            .any(|c| c.border_type == imageproc::contours::BorderType::Outer));
        assert!(contours
            .iter()
            .any(|c| c.border_type == imageproc::contours::BorderType::Hole));
    }
}
