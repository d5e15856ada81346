//! Cipher trait for swappable authenticated encryption backends.

use crate::{error::Result, keys::Key};

/// Nonce size shared by every supported AEAD (96 bits).
pub const NONCE_LEN: usize = 12;

/// Authentication tag size (128 bits).
pub const TAG_LEN: usize = 16;

pub type Nonce = [u8; NONCE_LEN];
pub type Tag = [u8; TAG_LEN];

/// Output of a single encryption call.
///
/// The tag is kept apart from the ciphertext because the package format
/// stores them as separate fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce,
    pub tag: Tag,
}

/// Trait for authenticated encryption with associated data (AEAD).
///
/// Implementations generate the nonce themselves: a caller can never pick
/// one, so a (key, nonce) pair is not reused across calls.
pub trait Cipher: Send + Sync {
    /// Human-readable algorithm name, e.g. `AES-256-GCM`.
    fn algorithm(&self) -> &'static str;

    /// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
    fn encrypt(&self, key: &Key, plaintext: &[u8], aad: &[u8]) -> Result<SealedPayload>;

    /// Verify `tag` and decrypt. No plaintext is returned unless the tag
    /// verifies.
    fn decrypt(
        &self,
        key: &Key,
        ciphertext: &[u8],
        nonce: &Nonce,
        tag: &Tag,
        aad: &[u8],
    ) -> Result<Vec<u8>>;
}
