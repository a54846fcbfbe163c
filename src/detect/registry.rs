use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::StubBackend;
use super::model::STUB_MODEL_ID;

/// Thread-safe cache of loaded detector backends.
///
/// Backends are keyed by (model id, input size, confidence threshold) so
/// repeated requests reuse loaded weights instead of reloading them per
/// invocation. Each backend is wrapped in `Mutex` because
/// `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: Mutex<HashMap<BackendKey, Arc<Mutex<dyn DetectorBackend>>>>,
    models_dir: PathBuf,
    model_base_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct BackendKey {
    model_id: String,
    image_size: u32,
    conf_permille: u32,
}

impl BackendKey {
    fn new(model_id: &str, image_size: u32, conf_threshold: f32) -> Self {
        Self {
            model_id: model_id.to_string(),
            image_size,
            conf_permille: (conf_threshold * 1000.0).round() as u32,
        }
    }
}

impl BackendRegistry {
    pub fn new(models_dir: PathBuf, model_base_url: Option<String>) -> Self {
        Self {
            backends: Mutex::new(HashMap::new()),
            models_dir,
            model_base_url,
        }
    }

    /// Get the backend for a model key, loading it on first use.
    pub fn get_or_load(
        &self,
        model_id: &str,
        image_size: u32,
        conf_threshold: f32,
    ) -> Result<Arc<Mutex<dyn DetectorBackend>>> {
        let key = BackendKey::new(model_id, image_size, conf_threshold);
        let mut backends = self
            .backends
            .lock()
            .map_err(|_| anyhow!("backend registry lock poisoned"))?;
        if let Some(backend) = backends.get(&key) {
            return Ok(backend.clone());
        }

        let backend = self.load_backend(model_id, image_size, conf_threshold)?;
        backends.insert(key, backend.clone());
        Ok(backend)
    }

    /// Names of the currently loaded model ids.
    pub fn loaded(&self) -> Vec<String> {
        self.backends
            .lock()
            .map(|backends| {
                let mut ids: Vec<String> =
                    backends.keys().map(|key| key.model_id.clone()).collect();
                ids.sort();
                ids.dedup();
                ids
            })
            .unwrap_or_default()
    }

    fn load_backend(
        &self,
        model_id: &str,
        image_size: u32,
        conf_threshold: f32,
    ) -> Result<Arc<Mutex<dyn DetectorBackend>>> {
        if model_id == STUB_MODEL_ID {
            return Ok(Arc::new(Mutex::new(StubBackend::new(conf_threshold))));
        }

        #[cfg(feature = "backend-tract")]
        {
            let weights = super::model::ensure_weights(
                &self.models_dir,
                model_id,
                self.model_base_url.as_deref(),
            )?;
            log::info!("loading model '{}' ({}px input)", model_id, image_size);
            let backend =
                super::backends::TractYolo::load(weights, image_size, conf_threshold)?;
            Ok(Arc::new(Mutex::new(backend)))
        }

        #[cfg(not(feature = "backend-tract"))]
        {
            let _ = (image_size, &self.models_dir, &self.model_base_url);
            Err(anyhow!(
                "model '{}' requires the backend-tract feature",
                model_id
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backends_are_cached_per_key() {
        let registry = BackendRegistry::new(PathBuf::from("models"), None);
        let a = registry.get_or_load(STUB_MODEL_ID, 640, 0.25).unwrap();
        let b = registry.get_or_load(STUB_MODEL_ID, 640, 0.25).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = registry.get_or_load(STUB_MODEL_ID, 640, 0.5).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.loaded(), vec![STUB_MODEL_ID.to_string()]);
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn real_models_need_the_tract_feature() {
        let registry = BackendRegistry::new(PathBuf::from("models"), None);
        let err = registry.get_or_load("yolov10s", 640, 0.25).err().unwrap();
        assert!(err.to_string().contains("backend-tract"));
    }
}
