use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LockboxError;

/// AES-GCM IV length in bytes (96-bit)
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes (128-bit)
pub const TAG_LEN: usize = 16;

/// Identifier of a file record, assigned by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub i64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated user, issued by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl FromStr for Role {
    type Err = LockboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(LockboxError::InvalidInput(format!("unknown role: {other:?}"))),
        }
    }
}

/// The already-authenticated caller of every vault operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn user(id: i64) -> Self {
        Self {
            id: UserId(id),
            role: Role::User,
        }
    }

    pub fn admin(id: i64) -> Self {
        Self {
            id: UserId(id),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Name of a stored payload inside the blob store root.
///
/// New uploads always get 32 lowercase hex chars (a simple-format UUID v4).
/// Rows written before that scheme may carry other names; those are accepted
/// as long as they are a single path segment, so no record can name anything
/// outside the blob store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredName(String);

impl StoredName {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Re-validate a name read back from persisted state.
    pub fn parse(s: &str) -> Result<Self, LockboxError> {
        if !is_generated(s) && !is_safe_segment(s) {
            return Err(LockboxError::Persistence(format!(
                "invalid stored name ({} chars)",
                s.len()
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Like [`StoredName::parse`], but only for names this service generates.
    pub fn parse_generated(s: &str) -> Result<Self, LockboxError> {
        if !is_generated(s) {
            return Err(LockboxError::Persistence(format!(
                "not a generated stored name ({} chars)",
                s.len()
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// False for names carried over from before generated names
    pub fn is_generated(&self) -> bool {
        is_generated(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_generated(s: &str) -> bool {
    s.len() == 32
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn is_safe_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 255
        && !s.contains("..")
        && !s.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// IV and tag of an encrypted payload. Both or neither: a record without
/// this is a legacy plaintext file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherMaterial {
    pub iv: [u8; IV_LEN],
    pub auth_tag: [u8; TAG_LEN],
}

/// Persisted metadata for one uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub owner_id: UserId,
    /// Original filename as uploaded. Display and headers only, never a path.
    pub display_name: String,
    pub stored_name: StoredName,
    pub cipher: Option<CipherMaterial>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }
}

/// A record about to be inserted; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub owner_id: UserId,
    pub display_name: String,
    pub stored_name: StoredName,
    pub cipher: Option<CipherMaterial>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn from_attachment_flag(as_attachment: bool) -> Self {
        if as_attachment {
            Disposition::Attachment
        } else {
            Disposition::Inline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Decrypted (or legacy plaintext) file ready to hand to the transport
#[derive(Clone)]
pub struct RetrievedFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Already sanitized against header injection
    pub suggested_filename: String,
    pub disposition: Disposition,
    /// False when served through the legacy plaintext path
    pub encrypted: bool,
}

impl RetrievedFile {
    /// Value for a `Content-Disposition` header
    pub fn content_disposition(&self) -> String {
        format!(
            "{}; filename=\"{}\"",
            self.disposition.as_str(),
            self.suggested_filename
        )
    }
}

impl fmt::Debug for RetrievedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievedFile")
            .field("bytes", &format_args!("[{} bytes]", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .field("suggested_filename", &self.suggested_filename)
            .field("disposition", &self.disposition)
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_generate_is_valid_and_unique() {
        let a = StoredName::generate();
        let b = StoredName::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert_eq!(StoredName::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn test_stored_name_rejects_paths() {
        for bad in [
            "../../etc/passwd",
            "..",
            "",
            "a/b",
            "a\\b",
            "0123456789abcdef0123456789abcde/",
            "x\0y",
            "line\nbreak",
            "del\u{7f}.txt",
        ] {
            assert!(StoredName::parse(bad).is_err(), "{bad:?} must be rejected");
        }
        assert!(StoredName::parse(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_stored_name_accepts_legacy_segment() {
        let legacy = StoredName::parse("6543a1b2_old.txt").unwrap();
        assert_eq!(legacy.as_str(), "6543a1b2_old.txt");
        assert!(!legacy.is_generated());
        assert!(StoredName::parse("report.pdf").is_ok());
    }

    #[test]
    fn test_parse_generated_is_strict() {
        let name = StoredName::generate();
        assert!(name.is_generated());
        assert_eq!(StoredName::parse_generated(name.as_str()).unwrap(), name);
        for bad in ["report.pdf", "0123456789abcdef0123456789ABCDEF", "6543a1b2_old.txt"] {
            assert!(StoredName::parse_generated(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_principal_admin_flag() {
        assert!(Principal::admin(1).is_admin());
        assert!(!Principal::user(1).is_admin());
    }

    #[test]
    fn test_content_disposition() {
        let file = RetrievedFile {
            bytes: vec![1, 2, 3],
            mime_type: "application/pdf".into(),
            suggested_filename: "report.pdf".into(),
            disposition: Disposition::from_attachment_flag(true),
            encrypted: true,
        };
        assert_eq!(file.content_disposition(), "attachment; filename=\"report.pdf\"");
        assert_eq!(
            format!("{file:?}"),
            "RetrievedFile { bytes: [3 bytes], mime_type: \"application/pdf\", \
             suggested_filename: \"report.pdf\", disposition: Attachment, encrypted: true }"
        );
    }
}
