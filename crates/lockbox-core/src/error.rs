use thiserror::Error;

pub type LockboxResult<T> = Result<T, LockboxError>;

/// Failure taxonomy for the file vault.
///
/// The `Display` text carries internal detail for server-side logs. Anything
/// shown to a caller goes through [`LockboxError::public_message`].
#[derive(Debug, Error)]
pub enum LockboxError {
    /// Record missing, or the principal may not see it. Never split in two.
    #[error("file not found or access denied")]
    NotFoundOrDenied,

    #[error("authentication tag verification failed")]
    AuthenticationFailure,

    #[error("storage error: {0}")]
    StorageIo(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LockboxError {
    /// Caller-facing text: no paths, no driver errors, no key material.
    pub fn public_message(&self) -> &'static str {
        match self {
            LockboxError::NotFoundOrDenied => "File not found or access denied.",
            LockboxError::AuthenticationFailure => {
                "Decryption failed: authentication failed or data corrupted."
            }
            LockboxError::InvalidInput(_) => "Invalid request.",
            _ => "Server error.",
        }
    }
}
