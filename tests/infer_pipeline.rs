use std::path::PathBuf;

use framescout::detect::backends::StubBackend;
use framescout::detect::BackendRegistry;
use framescout::infer::{
    self, InferenceOptions, InferenceOutput, InputModality, OutputConfig, SeenClasses,
};
use image::RgbImage;

fn stub_output(dir: &tempfile::TempDir) -> OutputConfig {
    OutputConfig {
        dir: dir.path().to_path_buf(),
        video_path: Some("stub://sink".to_string()),
    }
}

fn run_clip(clip: &str, output: &OutputConfig, seen: &mut SeenClasses) -> infer::VideoOutcome {
    let mut backend = StubBackend::new(0.25);
    let mut source =
        infer::open_modality_source(&InputModality::VideoUrl(clip.to_string()), 10).unwrap();
    infer::run_video(&mut backend, source.as_mut(), output, seen).unwrap()
}

#[test]
fn output_frames_match_frames_read_until_stream_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut seen = SeenClasses::new();
    let outcome = run_clip("stub://clip?frames=7", &stub_output(&dir), &mut seen);
    assert_eq!(outcome.frames_written, 7);
    assert_eq!(outcome.output_path, "stub://sink");
}

#[test]
fn output_frames_match_frames_read_until_first_failed_read() {
    let dir = tempfile::tempdir().unwrap();
    let mut seen = SeenClasses::new();
    let outcome = run_clip("stub://clip?frames=9&fail=read:4", &stub_output(&dir), &mut seen);
    assert_eq!(outcome.frames_written, 4);
}

#[test]
fn one_still_is_saved_per_class_at_first_observation() {
    let dir = tempfile::tempdir().unwrap();
    let mut seen = SeenClasses::new();
    // Six frames cycling through two marker classes: person, bicycle.
    let outcome = run_clip("stub://clip?frames=6&classes=2", &stub_output(&dir), &mut seen);

    assert_eq!(outcome.frames_written, 6);
    // First observations in order, no repeats on later frames.
    assert_eq!(outcome.newly_seen, vec!["person", "bicycle"]);
    assert_eq!(outcome.saved_stills.len(), 2);
    assert!(dir.path().join("detected_person.jpg").is_file());
    assert!(dir.path().join("detected_bicycle.jpg").is_file());
    assert_eq!(seen.len(), 2);

    let stills: Vec<PathBuf> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("detected_"))
        })
        .collect();
    assert_eq!(stills.len(), 2);
}

#[test]
fn seen_classes_carry_across_runs_when_reused() {
    let dir = tempfile::tempdir().unwrap();
    let mut seen = SeenClasses::new();
    let first = run_clip("stub://clip?frames=2&classes=2", &stub_output(&dir), &mut seen);
    assert_eq!(first.newly_seen.len(), 2);

    // A caller reusing the accumulator saves nothing new.
    let second = run_clip("stub://clip?frames=2&classes=2", &stub_output(&dir), &mut seen);
    assert!(second.newly_seen.is_empty());
    assert!(second.saved_stills.is_empty());
}

#[test]
fn capture_open_failure_processes_no_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = StubBackend::new(0.25);
    let mut source = infer::open_modality_source(
        &InputModality::VideoUrl("stub://clip?fail=open".to_string()),
        10,
    )
    .unwrap();
    let mut seen = SeenClasses::new();
    let err = infer::run_video(&mut backend, source.as_mut(), &stub_output(&dir), &mut seen)
        .unwrap_err();
    assert!(err.to_string().contains("could not open capture source"));
    assert!(seen.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn image_modality_yields_one_annotated_image_and_no_video() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("street.jpg");
    let mut image = RgbImage::new(64, 48);
    // Marker pixel so the stub backend reports a person.
    image.put_pixel(0, 0, image::Rgb([0, 200, 0]));
    image.save(&image_path).unwrap();

    let registry = BackendRegistry::new(dir.path().join("models"), None);
    let options = InferenceOptions {
        model_id: "stub".to_string(),
        image_size: 640,
        conf_threshold: 0.25,
        output_dir: dir.path().join("out"),
    };
    let output = infer::run(&registry, &InputModality::Image(image_path), &options).unwrap();

    let InferenceOutput::AnnotatedImage(annotated) = output else {
        panic!("image modality must produce an annotated image");
    };
    assert!(annotated.is_file());
    assert_eq!(
        annotated.file_name().and_then(|name| name.to_str()),
        Some("annotated_street.jpg")
    );

    // No video output appears anywhere in the output directory.
    let webm_count = std::fs::read_dir(options.output_dir)
        .unwrap()
        .filter(|entry| {
            entry
                .as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "webm")
        })
        .count();
    assert_eq!(webm_count, 0);
}

#[test]
fn invalid_options_are_rejected_before_any_resource_opens() {
    let dir = tempfile::tempdir().unwrap();
    let registry = BackendRegistry::new(dir.path().join("models"), None);
    let options = InferenceOptions {
        model_id: "stub".to_string(),
        image_size: 64,
        conf_threshold: 0.25,
        output_dir: dir.path().to_path_buf(),
    };
    let err = infer::run(
        &registry,
        &InputModality::VideoUrl("stub://clip?frames=1".to_string()),
        &options,
    )
    .unwrap_err();
    assert!(err.to_string().contains("image size"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
