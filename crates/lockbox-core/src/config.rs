use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LockboxError, LockboxResult};

/// Top-level configuration (loaded from lockbox.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockboxConfig {
    pub daemon: DaemonConfig,
    pub storage: StorageConfig,
    pub records: RecordsConfig,
    pub crypto: CryptoConfig,
    /// Warn if the config file is world-readable (default: true)
    #[serde(default = "default_true")]
    pub config_file_mode_check: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen address for the file API
    pub listen: String,
    /// Prometheus metrics endpoint (default: 127.0.0.1:9100)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
}

/// Blob store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding payloads (fs backend only)
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// File containing the base64 master key (last entry in the discovery chain)
    pub master_key_file: Option<PathBuf>,
}

impl Default for LockboxConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            storage: StorageConfig::default(),
            records: RecordsConfig::default(),
            crypto: CryptoConfig::default(),
            config_file_mode_check: true,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            metrics_addr: Some("127.0.0.1:9100".into()),
            log_level: "info".into(),
            log_format: "json".into(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("/var/lib/lockbox/uploads"),
        }
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("/var/lib/lockbox/lockbox.sqlite3"),
            max_connections: 8,
        }
    }
}

/// Problem noticed while reading the config file. Collected instead of
/// logged so callers can report them once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    Missing(PathBuf),
    WorldReadable(PathBuf),
}

impl ConfigWarning {
    pub fn emit(&self) {
        match self {
            Self::Missing(path) => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults")
            }
            Self::WorldReadable(path) => tracing::warn!(
                path = %path.display(),
                "config file is world-readable; restrict it with chmod 600"
            ),
        }
    }
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "config file not found: {}", path.display()),
            Self::WorldReadable(path) => {
                write!(f, "config file is world-readable: {}", path.display())
            }
        }
    }
}

impl LockboxConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    /// Warnings go straight to `tracing`.
    pub fn load(path: &Path) -> LockboxResult<Self> {
        let (config, warnings) = Self::read(path)?;
        for warning in &warnings {
            warning.emit();
        }
        Ok(config)
    }

    /// Like [`LockboxConfig::load`], but hands warnings back to the caller.
    pub fn read(path: &Path) -> LockboxResult<(Self, Vec<ConfigWarning>)> {
        if !path.exists() {
            return Ok((Self::default(), vec![ConfigWarning::Missing(path.to_path_buf())]));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| LockboxError::Config(format!("reading {}: {e}", path.display())))?;
        let config: LockboxConfig = toml::from_str(&content)
            .map_err(|e| LockboxError::Config(format!("parsing {}: {e}", path.display())))?;

        let mut warnings = Vec::new();
        if config.config_file_mode_check && is_world_readable(path) {
            warnings.push(ConfigWarning::WorldReadable(path.to_path_buf()));
        }
        Ok((config, warnings))
    }
}

#[cfg(unix)]
fn is_world_readable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o004 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_world_readable(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
config_file_mode_check = false

[daemon]
listen = "0.0.0.0:9000"
log_level = "debug"
log_format = "text"
max_upload_bytes = 1048576

[storage]
backend = "memory"
root = "/srv/lockbox/blobs"

[records]
database_path = "/srv/lockbox/db.sqlite3"
max_connections = 2

[crypto]
master_key_file = "/etc/lockbox/master.key"
"#;
        let config: LockboxConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.daemon.listen, "0.0.0.0:9000");
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.daemon.max_upload_bytes, 1048576);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.root, PathBuf::from("/srv/lockbox/blobs"));
        assert_eq!(config.records.max_connections, 2);
        assert_eq!(
            config.crypto.master_key_file,
            Some(PathBuf::from("/etc/lockbox/master.key"))
        );
        assert!(!config.config_file_mode_check);
    }

    #[test]
    fn test_parse_defaults() {
        let config: LockboxConfig = toml::from_str("").unwrap();

        assert_eq!(config.daemon.listen, "127.0.0.1:8080");
        assert_eq!(config.daemon.metrics_addr.as_deref(), Some("127.0.0.1:9100"));
        assert_eq!(config.daemon.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.records.max_connections, 8);
        assert!(config.crypto.master_key_file.is_none());
        assert!(config.config_file_mode_check);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[storage]
root = "/tmp/lockbox"
"#;
        let config: LockboxConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.storage.root, PathBuf::from("/tmp/lockbox"));
        // Defaults
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.daemon.log_level, "info");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = LockboxConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.daemon.listen, "127.0.0.1:8080");
    }

    #[test]
    fn test_read_reports_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");

        let (config, warnings) = LockboxConfig::read(&path).unwrap();
        assert_eq!(config.daemon.listen, "127.0.0.1:8080");
        assert_eq!(warnings, vec![ConfigWarning::Missing(path)]);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_reports_world_readable_file() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lockbox.toml");
        std::fs::write(&path, "[daemon]\nlog_level = \"debug\"\n").unwrap();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let (config, warnings) = LockboxConfig::read(&path).unwrap();
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(warnings, vec![ConfigWarning::WorldReadable(path.clone())]);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        let (_, warnings) = LockboxConfig::read(&path).unwrap();
        assert!(warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_read_skips_mode_check_when_disabled() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lockbox.toml");
        std::fs::write(&path, "config_file_mode_check = false\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let (_, warnings) = LockboxConfig::read(&path).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lockbox.toml");
        std::fs::write(&path, "[daemon\nlisten = ").unwrap();

        let err = LockboxConfig::load(&path).unwrap_err();
        assert!(matches!(err, LockboxError::Config(_)));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = LockboxConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: LockboxConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.daemon.listen, parsed.daemon.listen);
        assert_eq!(config.storage.root, parsed.storage.root);
        assert_eq!(config.records.database_path, parsed.records.database_path);
    }
}
