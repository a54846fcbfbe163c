use std::sync::Mutex;

use tempfile::NamedTempFile;

use framescout::config::ScoutConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FRAMESCOUT_CONFIG",
        "FRAMESCOUT_MODELS_DIR",
        "FRAMESCOUT_MODEL_BASE_URL",
        "FRAMESCOUT_OUTPUT_DIR",
        "FRAMESCOUT_API_ADDR",
        "FRAMESCOUT_MODEL_ID",
        "FRAMESCOUT_IMAGE_SIZE",
        "FRAMESCOUT_CONF_THRESHOLD",
        "FRAMESCOUT_CAPTURE_SOURCE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "models_dir": "weights",
        "model_base_url": "https://models.example/v1",
        "output_dir": "renders",
        "api": {
            "addr": "0.0.0.0:9100"
        },
        "inference": {
            "model_id": "yolov10m",
            "image_size": 960,
            "conf_threshold": 0.4
        },
        "capture": {
            "source": "rear-lot.webm",
            "target_fps": 12,
            "width": 800,
            "height": 600
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FRAMESCOUT_CONFIG", file.path());
    std::env::set_var("FRAMESCOUT_MODEL_ID", "yolov10x");
    std::env::set_var("FRAMESCOUT_IMAGE_SIZE", "1280");

    let cfg = ScoutConfig::load().expect("load config");

    assert_eq!(cfg.models_dir, std::path::PathBuf::from("weights"));
    assert_eq!(
        cfg.model_base_url.as_deref(),
        Some("https://models.example/v1")
    );
    assert_eq!(cfg.output_dir, std::path::PathBuf::from("renders"));
    assert_eq!(cfg.api_addr, "0.0.0.0:9100");
    assert_eq!(cfg.inference.model_id, "yolov10x");
    assert_eq!(cfg.inference.image_size, 1280);
    assert_eq!(cfg.inference.conf_threshold, 0.4);
    assert_eq!(cfg.capture.source, "rear-lot.webm");
    assert_eq!(cfg.capture.target_fps, 12);
    assert_eq!(cfg.capture.width, 800);
    assert_eq!(cfg.capture.height, 600);

    clear_env();
}

#[test]
fn defaults_apply_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScoutConfig::load().expect("load config");
    assert_eq!(cfg.inference.model_id, "yolov10s");
    assert_eq!(cfg.inference.image_size, 640);
    assert_eq!(cfg.inference.conf_threshold, 0.25);
    assert_eq!(cfg.api_addr, "127.0.0.1:8650");
    assert_eq!(cfg.capture.source, "0");
    assert!(cfg.model_base_url.is_none());

    clear_env();
}

#[test]
fn rejects_out_of_range_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FRAMESCOUT_CONF_THRESHOLD", "1.5");
    assert!(ScoutConfig::load().is_err());
    clear_env();

    std::env::set_var("FRAMESCOUT_IMAGE_SIZE", "64");
    assert!(ScoutConfig::load().is_err());
    clear_env();

    std::env::set_var("FRAMESCOUT_MODEL_ID", "../escape");
    assert!(ScoutConfig::load().is_err());
    clear_env();

    std::env::set_var("FRAMESCOUT_MODEL_BASE_URL", "not a url");
    assert!(ScoutConfig::load().is_err());
    clear_env();
}
