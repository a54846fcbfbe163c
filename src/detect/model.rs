//! Model identifier validation and weight resolution.
//!
//! A model identifier selects the pretrained weights to load:
//! `<models_dir>/<model_id>.onnx`. When the file is absent and a base URL
//! is configured, the weights are fetched once and cached there.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Model id reserved for the deterministic stub backend (no weights).
pub const STUB_MODEL_ID: &str = "stub";

const MAX_WEIGHT_BYTES: u64 = 512 * 1024 * 1024;

/// A conforming model id is a plain slug, never a path. We enforce a
/// positive allowlist pattern to keep ids out of filesystem semantics.
///
/// Allowed: "yolov10s", "yolov10-x.v2"
/// Disallowed: anything with whitespace, slashes, or a leading dot.
pub fn validate_model_id(model_id: &str) -> Result<()> {
    // Compile once for hot paths.
    static MODEL_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = MODEL_ID_RE
        .get_or_init(|| regex::Regex::new(r"^[a-z0-9][a-z0-9._-]{0,63}$").unwrap());

    let id = model_id.to_lowercase();
    if !re.is_match(&id) {
        return Err(anyhow!(
            "model id must match ^[a-z0-9][a-z0-9._-]{{0,63}}$"
        ));
    }
    Ok(())
}

/// Resolve the weight file for a model id, downloading it when missing
/// and a base URL is configured.
pub fn ensure_weights(
    models_dir: &Path,
    model_id: &str,
    base_url: Option<&str>,
) -> Result<PathBuf> {
    validate_model_id(model_id)?;
    let path = models_dir.join(format!("{}.onnx", model_id));
    if path.is_file() {
        return Ok(path);
    }

    let Some(base_url) = base_url else {
        return Err(anyhow!(
            "model weights not found at {}; configure model_base_url to fetch them",
            path.display()
        ));
    };

    std::fs::create_dir_all(models_dir)
        .with_context(|| format!("create models dir {}", models_dir.display()))?;

    let url = format!("{}/{}.onnx", base_url.trim_end_matches('/'), model_id);
    log::info!("fetching model weights for '{}' from {}", model_id, url);
    let response = ureq::get(&url)
        .call()
        .with_context(|| format!("fetch model weights from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_WEIGHT_BYTES + 1)
        .read_to_end(&mut bytes)
        .context("read model weights")?;
    if bytes.is_empty() {
        return Err(anyhow!("model weight download was empty"));
    }
    if bytes.len() as u64 > MAX_WEIGHT_BYTES {
        return Err(anyhow!("model weights exceed {} bytes", MAX_WEIGHT_BYTES));
    }

    // Stage next to the final path so a failed download never looks loadable.
    let staging = path.with_extension("onnx.part");
    std::fs::write(&staging, &bytes)
        .with_context(|| format!("write staged weights {}", staging.display()))?;
    std::fs::rename(&staging, &path)
        .with_context(|| format!("move weights into place at {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_slugs() {
        assert!(validate_model_id("yolov10s").is_ok());
        assert!(validate_model_id("yolov10-x.v2").is_ok());
        assert!(validate_model_id("YOLOV10S").is_ok());
    }

    #[test]
    fn rejects_path_like_ids() {
        assert!(validate_model_id("").is_err());
        assert!(validate_model_id("../etc/passwd").is_err());
        assert!(validate_model_id("a/b").is_err());
        assert!(validate_model_id("model id").is_err());
        assert!(validate_model_id(".hidden").is_err());
    }

    #[test]
    fn resolves_existing_weights_without_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.onnx");
        std::fs::write(&path, b"weights").unwrap();
        let resolved = ensure_weights(dir.path(), "tiny", None).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn missing_weights_without_base_url_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_weights(dir.path(), "tiny", None).unwrap_err();
        assert!(err.to_string().contains("model_base_url"));
    }
}
