//! Daemon lifecycle: key loading, store setup, health checks, HTTP server

use anyhow::{Context, Result};
use lockbox_core::config::LockboxConfig;
use lockbox_records::SqliteRecordStore;
use lockbox_storage::OperatorBlobStore;
use lockbox_vault::Vault;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::http::AppState;
use crate::metrics::{HealthState, Metrics};

pub async fn run(config: LockboxConfig) -> Result<()> {
    info!("daemon starting");

    // Only the source is ever logged, never the key
    let loaded = lockbox_crypto::load_master_key(config.crypto.master_key_file.as_deref())
        .await
        .context("loading master key")?;
    info!(source = %loaded.source, "master key loaded");

    let operator = lockbox_storage::build_operator(&config.storage)
        .context("building blob store operator")?;
    match lockbox_storage::check_health(&operator).await {
        Ok(()) => info!(root = %config.storage.root.display(), "blob store: reachable"),
        Err(e) => warn!(root = %config.storage.root.display(), "blob store: {e}"),
    }

    let records = SqliteRecordStore::open(
        &config.records.database_path,
        config.records.max_connections,
    )
    .await
    .with_context(|| {
        format!(
            "opening record store {}",
            config.records.database_path.display()
        )
    })?;

    let mut registry = Registry::default();
    let metrics = Metrics::new(&mut registry);

    if let Some(addr) = config.daemon.metrics_addr.clone() {
        let health = HealthState {
            registry: Arc::new(registry),
            operator: operator.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(addr, health).await {
                error!("metrics server failed: {e}");
            }
        });
    }

    let vault = Vault::new(loaded.key, records, OperatorBlobStore::new(operator));
    let state = AppState {
        vault: Arc::new(vault),
        metrics,
    };
    let app = crate::http::router(state, config.daemon.max_upload_bytes);

    notify_ready();

    crate::http::serve(&config.daemon.listen, app).await
}

/// sd_notify(READY=1) when running under systemd; no-op otherwise
#[cfg(unix)]
fn notify_ready() {
    if let Ok(socket) = std::env::var("NOTIFY_SOCKET") {
        use std::os::unix::net::UnixDatagram;
        if let Ok(sock) = UnixDatagram::unbound() {
            let _ = sock.send_to(b"READY=1\n", &socket);
            tracing::debug!(notify_socket = %socket, "sent systemd READY=1");
        }
    }
}

#[cfg(not(unix))]
fn notify_ready() {}
