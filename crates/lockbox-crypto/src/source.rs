//! Master key discovery chain

use secrecy::SecretString;
use std::path::{Path, PathBuf};

use crate::keys::{decode_master_key, KeyError, MasterKey};

/// A master key plus a description of where it came from (safe to log)
#[derive(Debug)]
pub struct LoadedKey {
    pub key: MasterKey,
    pub source: String,
}

/// Discover and load the master key using the priority chain:
///   1. $CREDENTIALS_DIRECTORY/master-key  (systemd credential injection)
///   2. $LOCKBOX_MASTER_KEY_FILE  (explicit path env var)
///   3. $LOCKBOX_MASTER_KEY  (literal base64 key)
///   4. config `crypto.master_key_file`
pub async fn load_master_key(config_file: Option<&Path>) -> Result<LoadedKey, KeyError> {
    load_master_key_with(|name| std::env::var(name).ok(), config_file).await
}

pub(crate) async fn load_master_key_with<F>(
    env: F,
    config_file: Option<&Path>,
) -> Result<LoadedKey, KeyError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. systemd credentials directory
    if let Some(cred_dir) = env("CREDENTIALS_DIRECTORY") {
        let path = PathBuf::from(cred_dir).join("master-key");
        if path.exists() {
            return read_key_file(&path, "systemd").await;
        }
    }

    // 2. LOCKBOX_MASTER_KEY_FILE env var
    if let Some(key_file) = env("LOCKBOX_MASTER_KEY_FILE") {
        let path = PathBuf::from(key_file);
        if path.exists() {
            return read_key_file(&path, "LOCKBOX_MASTER_KEY_FILE").await;
        }
        tracing::warn!(path = %path.display(), "LOCKBOX_MASTER_KEY_FILE points at a missing file");
    }

    // 3. LOCKBOX_MASTER_KEY env var
    if let Some(literal) = env("LOCKBOX_MASTER_KEY") {
        if !literal.trim().is_empty() {
            let key = decode_master_key(&SecretString::from(literal))?;
            return Ok(LoadedKey {
                key,
                source: "LOCKBOX_MASTER_KEY (env)".into(),
            });
        }
    }

    // 4. Config path
    if let Some(path) = config_file {
        if path.exists() {
            return read_key_file(path, "config").await;
        }
    }

    Err(KeyError::Missing(
        "$CREDENTIALS_DIRECTORY/master-key, LOCKBOX_MASTER_KEY_FILE, LOCKBOX_MASTER_KEY, \
         crypto.master_key_file"
            .into(),
    ))
}

async fn read_key_file(path: &Path, label: &str) -> Result<LoadedKey, KeyError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|error| KeyError::Read {
            source_name: format!("{label}:{}", path.display()),
            error,
        })?;
    let key = decode_master_key(&SecretString::from(content))?;
    Ok(LoadedKey {
        key,
        source: format!("{label}:{}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{encode_master_key, generate_master_key};
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn test_systemd_credential_wins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let systemd_key = generate_master_key();
        std::fs::write(
            tmp.path().join("master-key"),
            encode_master_key(&systemd_key).expose_secret(),
        )
        .unwrap();

        let env_key = generate_master_key();
        let env = env_from(&[
            ("CREDENTIALS_DIRECTORY", tmp.path().display().to_string()),
            (
                "LOCKBOX_MASTER_KEY",
                encode_master_key(&env_key).expose_secret().to_string(),
            ),
        ]);

        let loaded = load_master_key_with(env, None).await.unwrap();
        assert!(loaded.source.starts_with("systemd:"));
        assert_eq!(loaded.key.as_bytes(), systemd_key.as_bytes());
    }

    #[tokio::test]
    async fn test_literal_env_key() {
        let key = generate_master_key();
        let env = env_from(&[(
            "LOCKBOX_MASTER_KEY",
            encode_master_key(&key).expose_secret().to_string(),
        )]);

        let loaded = load_master_key_with(env, None).await.unwrap();
        assert_eq!(loaded.source, "LOCKBOX_MASTER_KEY (env)");
        assert_eq!(loaded.key.as_bytes(), key.as_bytes());
    }

    #[tokio::test]
    async fn test_config_file_fallback() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("master.key");
        let key = generate_master_key();
        std::fs::write(&path, encode_master_key(&key).expose_secret()).unwrap();

        let loaded = load_master_key_with(env_from(&[]), Some(&path))
            .await
            .unwrap();
        assert!(loaded.source.starts_with("config:"));
        assert_eq!(loaded.key.as_bytes(), key.as_bytes());
    }

    #[tokio::test]
    async fn test_no_source_is_an_error() {
        let result = load_master_key_with(env_from(&[]), None).await;
        assert!(matches!(result, Err(KeyError::Missing(_))));
    }

    #[tokio::test]
    async fn test_malformed_key_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("master.key");
        std::fs::write(&path, "c2hvcnQ=").unwrap();

        let result = load_master_key_with(env_from(&[]), Some(&path)).await;
        assert!(matches!(result, Err(KeyError::Length(5))));
    }
}
