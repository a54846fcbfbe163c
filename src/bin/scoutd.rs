//! scoutd - inference front-end daemon
//!
//! Loads the configuration, spawns the HTTP surface, and serves inference
//! requests until interrupted. Loaded models are cached across requests.

use anyhow::{Context, Result};
use std::sync::mpsc;
use std::sync::Arc;

use framescout::api::{ApiConfig, ApiServer};
use framescout::config::ScoutConfig;
use framescout::detect::BackendRegistry;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = ScoutConfig::load()?;
    let registry = Arc::new(BackendRegistry::new(
        cfg.models_dir.clone(),
        cfg.model_base_url.clone(),
    ));

    let api_cfg = ApiConfig {
        addr: cfg.api_addr.clone(),
        defaults: cfg.inference.clone(),
        output_dir: cfg.output_dir.clone(),
    };
    let handle = ApiServer::new(api_cfg, registry.clone()).spawn()?;
    log::info!("inference api listening on {}", handle.addr);
    log::info!(
        "defaults: model_id={} image_size={} conf_threshold={}",
        cfg.inference.model_id,
        cfg.inference.image_size,
        cfg.inference.conf_threshold
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("install shutdown handler")?;
    rx.recv().context("wait for shutdown signal")?;

    log::info!("shutting down ({} models loaded)", registry.loaded().len());
    handle.stop()?;
    Ok(())
}
