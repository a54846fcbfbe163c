use framescout::color::BlobDetector;
use framescout::frame::Frame;
use image::RgbImage;

fn frame_with_square(color: image::Rgb<u8>, x0: u32, y0: u32, side: u32) -> Frame {
    let mut image = RgbImage::new(200, 200);
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            image.put_pixel(x, y, color);
        }
    }
    Frame::from_rgb_image(image, 0)
}

#[test]
fn blue_region_reports_blue_and_nothing_else() {
    let frame = frame_with_square(image::Rgb([0, 0, 255]), 50, 50, 60);
    let mut annotated = frame.to_rgb_image();
    let before = annotated.clone();

    let detections = BlobDetector::new().process(&frame, &mut annotated);

    assert!(!detections.is_empty());
    assert!(detections.iter().all(|d| d.band == "blue"));
    assert!(detections.iter().all(|d| d.area > 500.0));
    // The outline was drawn onto the annotated frame.
    assert_ne!(annotated, before);
}

#[test]
fn brown_region_reports_brown_only() {
    let frame = frame_with_square(image::Rgb([150, 90, 30]), 40, 40, 70);
    let mut annotated = frame.to_rgb_image();

    let detections = BlobDetector::new().process(&frame, &mut annotated);

    assert!(!detections.is_empty());
    assert!(detections.iter().all(|d| d.band == "brown"));
}

#[test]
fn small_regions_fall_under_the_area_filter() {
    // A 10x10 block grows to 14x14 through the morphology pass, leaving a
    // boundary polygon area of 169 - well under the threshold.
    let frame = frame_with_square(image::Rgb([0, 0, 255]), 90, 90, 10);
    let mut annotated = frame.to_rgb_image();
    let before = annotated.clone();

    let detections = BlobDetector::new().process(&frame, &mut annotated);

    assert!(detections.is_empty());
    assert_eq!(annotated, before);
}

#[test]
fn empty_frame_reports_nothing() {
    let frame = Frame::from_rgb_image(RgbImage::new(120, 90), 0);
    let mut annotated = frame.to_rgb_image();
    let detections = BlobDetector::new().process(&frame, &mut annotated);
    assert!(detections.is_empty());
}
