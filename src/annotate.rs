//! Drawing detection results onto frames.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::detect::Detection;

const BOX_THICKNESS: i32 = 2;

const BRIGHT_COLORS: [(u8, u8, u8); 12] = [
    (255, 0, 0),
    (0, 255, 0),
    (0, 0, 255),
    (255, 255, 0),
    (255, 0, 255),
    (0, 255, 255),
    (255, 128, 0),
    (255, 0, 128),
    (128, 255, 0),
    (0, 128, 255),
    (128, 0, 255),
    (255, 128, 128),
];

/// Stable display color for a class id.
pub fn class_color(class_id: usize) -> Rgb<u8> {
    let (r, g, b) = BRIGHT_COLORS[class_id % BRIGHT_COLORS.len()];
    Rgb([r, g, b])
}

/// Draw every detection as a hollow box in its class color.
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        let color = class_color(detection.class_id);
        let x = detection.bbox.x.round() as i32;
        let y = detection.bbox.y.round() as i32;
        let w = detection.bbox.w.round() as u32;
        let h = detection.bbox.h.round() as u32;
        if w == 0 || h == 0 {
            continue;
        }
        for inset in 0..BOX_THICKNESS {
            let (w, h) = (w as i32 - 2 * inset, h as i32 - 2 * inset);
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                image,
                Rect::at(x + inset, y + inset).of_size(w as u32, h as u32),
                color,
            );
        }
    }
}

/// Trace a closed contour outline onto the image.
pub fn draw_contour_outline(image: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    if points.is_empty() {
        return;
    }
    if points.len() == 1 {
        let point = points[0];
        if point.x >= 0 && point.y >= 0 && (point.x as u32) < image.width() && (point.y as u32) < image.height() {
            image.put_pixel(point.x as u32, point.y as u32, color);
        }
        return;
    }
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        draw_line_segment_mut(
            image,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }
}
