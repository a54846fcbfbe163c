use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::model::validate_model_id;

const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_OUTPUT_DIR: &str = "out";
const DEFAULT_MODEL_ID: &str = "yolov10s";
const DEFAULT_IMAGE_SIZE: u32 = 640;
const DEFAULT_CONF_THRESHOLD: f32 = 0.25;
const DEFAULT_API_ADDR: &str = "127.0.0.1:8650";
const DEFAULT_CAPTURE_SOURCE: &str = "0";
const DEFAULT_CAPTURE_FPS: u32 = 10;
const DEFAULT_CAPTURE_WIDTH: u32 = 640;
const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct ScoutConfigFile {
    models_dir: Option<PathBuf>,
    model_base_url: Option<String>,
    output_dir: Option<PathBuf>,
    api: Option<ApiConfigFile>,
    inference: Option<InferenceConfigFile>,
    capture: Option<CaptureConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct InferenceConfigFile {
    model_id: Option<String>,
    image_size: Option<u32>,
    conf_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    source: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub models_dir: PathBuf,
    /// Base URL for fetching missing model weights; `None` disables download.
    pub model_base_url: Option<String>,
    pub output_dir: PathBuf,
    pub api_addr: String,
    pub inference: InferenceSettings,
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub model_id: String,
    pub image_size: u32,
    pub conf_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub source: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl ScoutConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FRAMESCOUT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScoutConfigFile) -> Self {
        let models_dir = file
            .models_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR));
        let output_dir = file
            .output_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let inference = InferenceSettings {
            model_id: file
                .inference
                .as_ref()
                .and_then(|inference| inference.model_id.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            image_size: file
                .inference
                .as_ref()
                .and_then(|inference| inference.image_size)
                .unwrap_or(DEFAULT_IMAGE_SIZE),
            conf_threshold: file
                .inference
                .as_ref()
                .and_then(|inference| inference.conf_threshold)
                .unwrap_or(DEFAULT_CONF_THRESHOLD),
        };
        let capture = CaptureSettings {
            source: file
                .capture
                .as_ref()
                .and_then(|capture| capture.source.clone())
                .unwrap_or_else(|| DEFAULT_CAPTURE_SOURCE.to_string()),
            target_fps: file
                .capture
                .as_ref()
                .and_then(|capture| capture.target_fps)
                .unwrap_or(DEFAULT_CAPTURE_FPS),
            width: file
                .capture
                .as_ref()
                .and_then(|capture| capture.width)
                .unwrap_or(DEFAULT_CAPTURE_WIDTH),
            height: file
                .capture
                .and_then(|capture| capture.height)
                .unwrap_or(DEFAULT_CAPTURE_HEIGHT),
        };
        Self {
            models_dir,
            model_base_url: file.model_base_url,
            output_dir,
            api_addr,
            inference,
            capture,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("FRAMESCOUT_MODELS_DIR") {
            if !dir.trim().is_empty() {
                self.models_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var("FRAMESCOUT_MODEL_BASE_URL") {
            if !url.trim().is_empty() {
                self.model_base_url = Some(url);
            }
        }
        if let Ok(dir) = std::env::var("FRAMESCOUT_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(addr) = std::env::var("FRAMESCOUT_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(model_id) = std::env::var("FRAMESCOUT_MODEL_ID") {
            if !model_id.trim().is_empty() {
                self.inference.model_id = model_id;
            }
        }
        if let Ok(size) = std::env::var("FRAMESCOUT_IMAGE_SIZE") {
            self.inference.image_size = size
                .parse()
                .map_err(|_| anyhow!("FRAMESCOUT_IMAGE_SIZE must be an integer pixel size"))?;
        }
        if let Ok(threshold) = std::env::var("FRAMESCOUT_CONF_THRESHOLD") {
            self.inference.conf_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("FRAMESCOUT_CONF_THRESHOLD must be a number in 0..=1"))?;
        }
        if let Ok(source) = std::env::var("FRAMESCOUT_CAPTURE_SOURCE") {
            if !source.trim().is_empty() {
                self.capture.source = source;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        validate_model_id(&self.inference.model_id)?;
        crate::infer::validate_image_size(self.inference.image_size)?;
        crate::infer::validate_conf_threshold(self.inference.conf_threshold)?;
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture dimensions must be non-zero"));
        }
        if let Some(url) = &self.model_base_url {
            url::Url::parse(url).map_err(|e| anyhow!("invalid model_base_url '{}': {}", url, e))?;
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScoutConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
