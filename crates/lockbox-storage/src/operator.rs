//! OpenDAL Operator factory for lockbox blob stores

use anyhow::{Context, Result};
use lockbox_core::config::{StorageBackend, StorageConfig};
use opendal::Operator;

/// Build an OpenDAL Operator for the configured backend.
///
/// The fs backend roots every object under `cfg.root`, creating the
/// directory if needed.
pub fn build_operator(cfg: &StorageConfig) -> Result<Operator> {
    let op = match cfg.backend {
        StorageBackend::Fs => {
            std::fs::create_dir_all(&cfg.root)
                .with_context(|| format!("creating blob root: {}", cfg.root.display()))?;
            let root = cfg.root.to_string_lossy();
            let builder = opendal::services::Fs::default().root(&root);
            Operator::new(builder)
                .context("creating OpenDAL fs operator")?
                .finish()
        }
        StorageBackend::Memory => {
            tracing::warn!("memory blob store: payloads are lost on restart");
            Operator::new(opendal::services::Memory::default())
                .context("creating OpenDAL memory operator")?
                .finish()
        }
    };

    Ok(op
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(3)
                .with_jitter(),
        ))
}

/// Bare in-memory operator (tests, dry runs)
pub fn memory_operator() -> Result<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())
        .context("creating OpenDAL memory operator")?
        .finish())
}
