//! Storage health check

use anyhow::Result;
use opendal::Operator;

/// Verify the blob store is reachable by listing the root
pub async fn check_health(op: &Operator) -> Result<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("storage health check failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_operator_is_healthy() {
        let op = crate::operator::memory_operator().unwrap();
        assert!(check_health(&op).await.is_ok());
    }

    #[tokio::test]
    async fn test_fs_operator_is_healthy() {
        let tmp = tempfile::TempDir::new().unwrap();
        let op = crate::operator::build_operator(&lockbox_core::config::StorageConfig {
            backend: lockbox_core::config::StorageBackend::Fs,
            root: tmp.path().join("blobs"),
        })
        .unwrap();
        assert!(check_health(&op).await.is_ok());
    }
}
