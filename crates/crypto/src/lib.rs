//! Encrypted image container.
//!
//! A raw pixel buffer is sealed with AES-256-GCM under a 32-byte key (random
//! or PBKDF2-derived from a password) and wrapped in a self-describing JSON
//! [`Package`] together with its metadata, nonce and tag. Opening verifies
//! the tag before any plaintext is released.
//!
//! Everything here is synchronous, does no I/O and keeps no state between
//! calls; [`Sealer`] and [`Opener`] can be shared freely across threads.
//! The [`Cipher`] trait allows swapping the AEAD backend.

pub mod aes256gcm;
pub mod error;
pub mod keys;
pub mod open;
pub mod package;
pub mod seal;
pub mod traits;

pub use {
    aes256gcm::Aes256GcmCipher,
    error::{CryptError, Result},
    keys::{
        Key, Salt, derive_key_from_password, generate_random_key, key_to_string, string_to_key,
        validate_key,
    },
    open::Opener,
    package::{FormatVersion, ImageShape, Metadata, Package},
    seal::Sealer,
    traits::{Cipher, SealedPayload},
};
