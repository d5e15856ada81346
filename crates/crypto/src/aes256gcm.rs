//! AES-256-GCM implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use aes_gcm::{
    Aes256Gcm,
    aead::{AeadInPlace, KeyInit, generic_array::GenericArray},
};
use rand::{TryRngCore, rngs::OsRng};

use crate::{
    error::{CryptError, Result},
    keys::Key,
    traits::{Cipher, NONCE_LEN, Nonce, SealedPayload, TAG_LEN, Tag},
};

/// AES-256 in Galois/Counter mode with a random 96-bit nonce per call.
///
/// GCM is a stream mode: ciphertext length equals plaintext length, the
/// 16-byte tag travels separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmCipher;

fn random_nonce() -> Result<Nonce> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CryptError::Entropy(e.to_string()))?;
    Ok(nonce)
}

impl Cipher for Aes256GcmCipher {
    fn algorithm(&self) -> &'static str {
        "AES-256-GCM"
    }

    #[allow(deprecated)]
    fn encrypt(&self, key: &Key, plaintext: &[u8], aad: &[u8]) -> Result<SealedPayload> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        let nonce = random_nonce()?;

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&nonce), aad, &mut buffer)
            .map_err(|e| CryptError::Cipher(e.to_string()))?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(SealedPayload {
            ciphertext: buffer,
            nonce,
            tag: tag_bytes,
        })
    }

    #[allow(deprecated)]
    fn decrypt(
        &self,
        key: &Key,
        ciphertext: &[u8],
        nonce: &Nonce,
        tag: &Tag,
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));

        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce),
                aad,
                &mut buffer,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| CryptError::AuthenticationFailed)?;
        Ok(buffer)
    }
}
