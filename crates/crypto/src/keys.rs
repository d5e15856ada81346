//! Symmetric key generation, password derivation and text encoding.
//!
//! Keys are either drawn from the OS CSPRNG or derived from a password with
//! PBKDF2-HMAC-SHA256. Nothing here is persisted; the caller owns the key for
//! the duration of one seal or open.

use std::fmt;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    rand::{TryCryptoRng, rngs::OsRng},
    sha2::Sha256,
    zeroize::Zeroizing,
};

use crate::error::{CryptError, Result};

/// AES-256 key size in bytes.
pub const KEY_LEN: usize = 32;

/// Salt size for password-derived keys.
pub const SALT_LEN: usize = 16;

/// PBKDF2 rounds. Lowering this would also break re-derivation of keys
/// created by earlier releases.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// 256-bit symmetric key. Zeroed on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct Key(Zeroizing<[u8; KEY_LEN]>);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Build a key from raw bytes, rejecting any length other than 32.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if !validate_key(bytes) {
            return Err(CryptError::InvalidKeyFormat(format!(
                "invalid key length: {} bytes (expected {KEY_LEN})",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key([REDACTED])")
    }
}

/// PBKDF2 salt. Not secret, but required to re-derive the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Fresh random salt from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        fill_random(&mut OsRng, &mut salt)?;
        Ok(Self(salt))
    }

    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let salt: [u8; SALT_LEN] = bytes.try_into().map_err(|_| {
            CryptError::InvalidKeyFormat(format!(
                "invalid salt length: {} bytes (expected {SALT_LEN})",
                bytes.len()
            ))
        })?;
        Ok(Self(salt))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptError::InvalidKeyFormat(format!("salt is not valid base64: {e}")))?;
        Self::from_slice(&bytes)
    }
}

fn fill_random<R: TryCryptoRng + ?Sized>(rng: &mut R, dest: &mut [u8]) -> Result<()> {
    rng.try_fill_bytes(dest)
        .map_err(|e| CryptError::Entropy(e.to_string()))
}

/// Generate a cryptographically secure random key.
pub fn generate_random_key() -> Result<Key> {
    generate_random_key_with(&mut OsRng)
}

/// Generate a key from a caller-supplied CSPRNG. Meant for test harnesses
/// that need reproducible keys; production code uses [`generate_random_key`].
pub fn generate_random_key_with<R: TryCryptoRng + ?Sized>(rng: &mut R) -> Result<Key> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    fill_random(rng, key.as_mut())?;

    #[cfg(feature = "tracing")]
    tracing::debug!("generated random key");

    Ok(Key(key))
}

/// Derive a key from `password` with PBKDF2-HMAC-SHA256.
///
/// Without a salt a fresh one is generated. The same (password, salt) pair
/// always yields the same key, so the returned salt must be kept to derive
/// it again.
pub fn derive_key_from_password(password: &str, salt: Option<&Salt>) -> Result<(Key, Salt)> {
    let salt = match salt {
        Some(salt) => *salt,
        None => Salt::generate()?,
    };

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        key.as_mut(),
    );

    #[cfg(feature = "tracing")]
    tracing::debug!(iterations = PBKDF2_ITERATIONS, "derived key from password");

    Ok((Key(key), salt))
}

/// Encode a key as standard base64 for copy/paste.
pub fn key_to_string(key: &Key) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Decode a base64 key. Only the decoded length is validated; whether the
/// key opens a given package is unknowable until decryption.
pub fn string_to_key(encoded: &str) -> Result<Key> {
    let bytes = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptError::InvalidKeyFormat(format!("key is not valid base64: {e}")))?,
    );
    Key::from_slice(&bytes)
}

/// Length check only; does not attempt decryption.
pub fn validate_key(key: &[u8]) -> bool {
    key.len() == KEY_LEN
}
