//! Opener: parse an untrusted package and recover the pixel buffer.
//!
//! Parsing failures are [`CryptError::MalformedPackage`]; anything that gets
//! past parsing and still fails is [`CryptError::AuthenticationFailed`],
//! without saying whether the key or the data was wrong.

use crate::{
    aes256gcm::Aes256GcmCipher,
    error::{CryptError, Result},
    keys::Key,
    package::{Metadata, Package},
    traits::{Cipher, Nonce, Tag},
};

/// Mirror of [`Sealer`](crate::seal::Sealer). Stateless and thread-safe.
#[derive(Debug, Clone, Default)]
pub struct Opener<C: Cipher = Aes256GcmCipher> {
    cipher: C,
}

impl Opener<Aes256GcmCipher> {
    pub fn new() -> Self {
        Self::with_cipher(Aes256GcmCipher)
    }
}

impl<C: Cipher> Opener<C> {
    pub fn with_cipher(cipher: C) -> Self {
        Self { cipher }
    }

    /// Decode the text form of a package without touching the key.
    pub fn parse(&self, serialized: &[u8]) -> Result<Package> {
        let package = Package::from_json_bytes(serialized);

        #[cfg(feature = "tracing")]
        if let Err(ref e) = package {
            tracing::warn!(error = %e, "rejected malformed package");
        }

        package
    }

    /// Verify the tag and decrypt. No associated data.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &Key,
        nonce: &Nonce,
        tag: &Tag,
    ) -> Result<Vec<u8>> {
        self.decrypt_with_aad(ciphertext, key, nonce, tag, &[])
    }

    fn decrypt_with_aad(
        &self,
        ciphertext: &[u8],
        key: &Key,
        nonce: &Nonce,
        tag: &Tag,
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let result = self.cipher.decrypt(key, ciphertext, nonce, tag, aad);

        #[cfg(feature = "tracing")]
        match &result {
            Ok(plaintext) => tracing::debug!(bytes = plaintext.len(), "decrypted payload"),
            Err(CryptError::AuthenticationFailed) => {
                tracing::warn!("decryption failed: wrong key or corrupted data")
            },
            Err(e) => tracing::error!(error = %e, "decryption failed"),
        }

        result
    }

    /// Parse then decrypt. Returns the payload and the metadata it was sealed
    /// with.
    ///
    /// For version `1.0` packages the metadata is not authenticated and must
    /// be treated as advisory; see [`Metadata::is_authenticated`].
    pub fn open(&self, serialized: &[u8], key: &Key) -> Result<(Vec<u8>, Metadata)> {
        let package = self.parse(serialized)?;
        let payload = self.open_package(&package, key)?;
        Ok((payload, package.metadata))
    }

    /// Decrypt an already parsed package.
    pub fn open_package(&self, package: &Package, key: &Key) -> Result<Vec<u8>> {
        let aad = package
            .metadata
            .associated_data()
            .map_err(|e| CryptError::MalformedPackage(e.to_string()))?;
        let payload = self.decrypt_with_aad(
            &package.ciphertext,
            key,
            &package.nonce,
            &package.tag,
            &aad,
        )?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            file = %package.metadata.original_filename,
            version = %package.metadata.version,
            bytes = payload.len(),
            "opened encrypted package"
        );

        Ok(payload)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{package::ImageShape, seal::Sealer},
    };

    fn sealed_bytes(key: &Key, bound: bool) -> Vec<u8> {
        let sealer = Sealer::new();
        let shape = ImageShape::new(1, 2, 3).unwrap();
        let package = if bound {
            sealer.seal_bound(b"pixels", key, "p.png", shape)
        } else {
            sealer.seal(b"pixels", key, "p.png", shape)
        }
        .unwrap();
        sealer.serialize(&package).unwrap()
    }

    #[test]
    fn open_round_trip() {
        let key = Key::from_bytes([7; 32]);
        let (payload, metadata) = Opener::new().open(&sealed_bytes(&key, false), &key).unwrap();
        assert_eq!(payload, b"pixels");
        assert_eq!(metadata.original_filename, "p.png");
    }

    #[test]
    fn open_is_repeatable() {
        let key = Key::from_bytes([7; 32]);
        let bytes = sealed_bytes(&key, true);
        let opener = Opener::new();
        let first = opener.open(&bytes, &key).unwrap();
        let second = opener.open(&bytes, &key).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn wrong_key_is_authentication_failure() {
        let bytes = sealed_bytes(&Key::from_bytes([7; 32]), false);
        let err = Opener::new()
            .open(&bytes, &Key::from_bytes([8; 32]))
            .unwrap_err();
        assert!(matches!(err, CryptError::AuthenticationFailed));
    }

    #[test]
    fn garbage_is_malformed_not_authentication() {
        let err = Opener::new()
            .open(b"{\"metadata\": 1}", &Key::from_bytes([0; 32]))
            .unwrap_err();
        assert!(matches!(err, CryptError::MalformedPackage(_)));
    }

    #[test]
    fn v1_metadata_edit_goes_unnoticed() {
        let key = Key::from_bytes([7; 32]);
        let opener = Opener::new();
        let mut package = opener.parse(&sealed_bytes(&key, false)).unwrap();
        package.metadata.original_filename = "renamed.png".into();
        assert_eq!(opener.open_package(&package, &key).unwrap(), b"pixels");
    }

    #[test]
    fn v2_metadata_edit_is_detected() {
        let key = Key::from_bytes([7; 32]);
        let opener = Opener::new();
        let mut package = opener.parse(&sealed_bytes(&key, true)).unwrap();
        package.metadata.original_filename = "renamed.png".into();
        assert!(matches!(
            opener.open_package(&package, &key),
            Err(CryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn decrypt_takes_raw_parts() {
        let key = Key::from_bytes([2; 32]);
        let sealed = Sealer::new().encrypt(b"raw", &key).unwrap();
        let plain = Opener::new()
            .decrypt(&sealed.ciphertext, &key, &sealed.nonce, &sealed.tag)
            .unwrap();
        assert_eq!(plain, b"raw");
    }
}
