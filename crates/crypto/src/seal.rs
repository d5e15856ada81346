//! Sealer: encrypt a pixel buffer and wrap it into a [`Package`].

use crate::{
    aes256gcm::Aes256GcmCipher,
    error::Result,
    keys::Key,
    package::{FormatVersion, ImageShape, Metadata, Package},
    traits::{Cipher, SealedPayload},
};

/// Builds packages. Holds no state besides the (zero-sized) cipher, so one
/// instance can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Sealer<C: Cipher = Aes256GcmCipher> {
    cipher: C,
}

impl Sealer<Aes256GcmCipher> {
    pub fn new() -> Self {
        Self::with_cipher(Aes256GcmCipher)
    }
}

impl<C: Cipher> Sealer<C> {
    pub fn with_cipher(cipher: C) -> Self {
        Self { cipher }
    }

    /// Encrypt `payload` with a fresh random nonce and no associated data.
    pub fn encrypt(&self, payload: &[u8], key: &Key) -> Result<SealedPayload> {
        let sealed = self.cipher.encrypt(key, payload, &[])?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            algorithm = self.cipher.algorithm(),
            bytes = payload.len(),
            "encrypted payload"
        );

        Ok(sealed)
    }

    /// Seal into a version `1.0` package. Metadata is carried in clear and is
    /// not covered by the tag.
    pub fn seal(
        &self,
        payload: &[u8],
        key: &Key,
        original_filename: &str,
        shape: ImageShape,
    ) -> Result<Package> {
        let metadata = Metadata::new(original_filename, shape, FormatVersion::V1);
        let sealed = self.encrypt(payload, key)?;
        Ok(assemble(metadata, sealed))
    }

    /// Seal into a version `2.0` package, binding the metadata into the tag
    /// so filename or shape tampering fails authentication on open.
    pub fn seal_bound(
        &self,
        payload: &[u8],
        key: &Key,
        original_filename: &str,
        shape: ImageShape,
    ) -> Result<Package> {
        let metadata = Metadata::new(original_filename, shape, FormatVersion::V2);
        let aad = metadata.associated_data()?;
        let sealed = self.cipher.encrypt(key, payload, &aad)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            algorithm = self.cipher.algorithm(),
            bytes = payload.len(),
            "encrypted payload with bound metadata"
        );

        Ok(assemble(metadata, sealed))
    }

    /// Persistable byte form of `package`.
    pub fn serialize(&self, package: &Package) -> Result<Vec<u8>> {
        let bytes = package.to_json_bytes()?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            file = %package.metadata.original_filename,
            version = %package.metadata.version,
            bytes = bytes.len(),
            "created encrypted package"
        );

        Ok(bytes)
    }
}

fn assemble(metadata: Metadata, sealed: SealedPayload) -> Package {
    Package {
        metadata,
        nonce: sealed.nonce,
        tag: sealed.tag,
        ciphertext: sealed.ciphertext,
    }
}
