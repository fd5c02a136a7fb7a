//! SQLite-backed [`RecordStore`]

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use chrono::{DateTime, Utc};
use lockbox_core::types::{IV_LEN, TAG_LEN};
use lockbox_core::{CipherMaterial, FileId, FileRecord, NewFileRecord, StoredName, UserId};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::store::{RecordError, RecordStore};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const LIST_BY_OWNER: &str = "SELECT id, owner_id, display_name, stored_name, iv, auth_tag, \
     created_at FROM files WHERE owner_id = ? ORDER BY created_at DESC, id DESC";

const FIND_BY_ID: &str = "SELECT id, owner_id, display_name, stored_name, iv, auth_tag, \
     created_at FROM files WHERE id = ?";

const FIND_BY_ID_AND_OWNER: &str = "SELECT id, owner_id, display_name, stored_name, iv, \
     auth_tag, created_at FROM files WHERE id = ? AND owner_id = ?";

#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `path` and apply migrations.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, RecordError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecordError::Database(format!("creating {}: {e}", parent.display()))
            })?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await?;
        MIGRATOR.run(&pool).await?;

        tracing::info!(path = %path.display(), "record store opened");
        Ok(Self { pool })
    }

    /// Private in-memory database (tests, dry runs).
    pub async fn in_memory() -> Result<Self, RecordError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Every new connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        MIGRATOR.run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl RecordStore for SqliteRecordStore {
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<FileRecord>, RecordError> {
        let rows = sqlx::query(LIST_BY_OWNER)
            .bind(owner.0)
            .fetch_all(&self.pool)
            .await?;

        // One unreadable row must not hide the rest of the owner's files.
        let records = rows
            .iter()
            .filter_map(|row| match row_to_record(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    let id = row.try_get::<i64, _>("id").ok();
                    tracing::error!(?id, owner = %owner, error = %e, "skipping corrupt file record");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn find_by_id(
        &self,
        id: FileId,
        require_owner: Option<UserId>,
    ) -> Result<FileRecord, RecordError> {
        let row = match require_owner {
            Some(owner) => {
                sqlx::query(FIND_BY_ID_AND_OWNER)
                    .bind(id.0)
                    .bind(owner.0)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(FIND_BY_ID)
                    .bind(id.0)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        match row {
            Some(row) => row_to_record(&row),
            None => Err(RecordError::NotFound),
        }
    }

    async fn insert(&self, record: &NewFileRecord) -> Result<FileId, RecordError> {
        let (iv, auth_tag) = match &record.cipher {
            Some(c) => (Some(B64.encode(c.iv)), Some(B64.encode(c.auth_tag))),
            None => (None, None),
        };

        let result = sqlx::query(
            "INSERT INTO files (owner_id, display_name, stored_name, iv, auth_tag, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.owner_id.0)
        .bind(&record.display_name)
        .bind(record.stored_name.as_str())
        .bind(iv)
        .bind(auth_tag)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(FileId(result.last_insert_rowid()))
    }

    async fn delete(&self, id: FileId, require_owner: Option<UserId>) -> Result<(), RecordError> {
        let result = match require_owner {
            Some(owner) => {
                sqlx::query("DELETE FROM files WHERE id = ? AND owner_id = ?")
                    .bind(id.0)
                    .bind(owner.0)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM files WHERE id = ?")
                    .bind(id.0)
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound);
        }
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<FileRecord, RecordError> {
    let id: i64 = row.try_get("id")?;
    let corrupt = |detail: String| RecordError::Corrupt { id, detail };

    let stored_name: String = row.try_get("stored_name")?;
    let stored_name = StoredName::parse(&stored_name).map_err(|e| corrupt(e.to_string()))?;

    let iv: Option<String> = row.try_get("iv")?;
    let auth_tag: Option<String> = row.try_get("auth_tag")?;
    let cipher = decode_cipher(iv.as_deref(), auth_tag.as_deref()).map_err(corrupt)?;

    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(FileRecord {
        id: FileId(id),
        owner_id: UserId(row.try_get("owner_id")?),
        display_name: row.try_get("display_name")?,
        stored_name,
        cipher,
        created_at,
    })
}

/// Both columns empty means a legacy plaintext record; anything half-set or
/// malformed is corruption, never a silent downgrade to plaintext.
fn decode_cipher(
    iv: Option<&str>,
    auth_tag: Option<&str>,
) -> Result<Option<CipherMaterial>, String> {
    let is_blank = |v: Option<&str>| v.map_or(true, |s| s.is_empty());

    match (is_blank(iv), is_blank(auth_tag)) {
        (true, true) => Ok(None),
        (false, false) => {
            let iv = decode_fixed::<IV_LEN>(iv.unwrap_or_default(), "iv")?;
            let auth_tag = decode_fixed::<TAG_LEN>(auth_tag.unwrap_or_default(), "auth_tag")?;
            Ok(Some(CipherMaterial { iv, auth_tag }))
        }
        _ => Err("only one of iv/auth_tag is set".into()),
    }
}

fn decode_fixed<const N: usize>(encoded: &str, field: &str) -> Result<[u8; N], String> {
    let raw = B64
        .decode(encoded)
        .map_err(|_| format!("{field} is not valid base64"))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| format!("{field} has {} bytes (expected {N})", raw.len()))
}
