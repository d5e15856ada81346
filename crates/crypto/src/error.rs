//! Image container error types.

/// Errors produced by key handling, sealing and opening.
#[derive(Debug, thiserror::Error)]
pub enum CryptError {
    /// The serialized package is structurally invalid or a field failed to
    /// decode from its transport encoding.
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    /// A textual key does not decode to exactly 32 bytes.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Tag verification failed. Wrong key and tampered data are reported
    /// identically.
    #[error("authentication failed: wrong key or corrupted data")]
    AuthenticationFailed,

    /// Caller-supplied metadata is unusable (e.g. a zero dimension).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The random source could not produce bytes.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// The cipher primitive failed outside of tag verification.
    #[error("cipher error: {0}")]
    Cipher(String),
}

impl CryptError {
    /// Environment failures that the caller cannot fix by changing input.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Entropy(_) | Self::Cipher(_))
    }
}

pub type Result<T> = std::result::Result<T, CryptError>;
