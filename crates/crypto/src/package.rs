//! Self-describing encrypted image container.
//!
//! On disk a package is pretty-printed JSON:
//!
//! ```text
//! {
//!   "metadata": {
//!     "original_filename": "cat.png",
//!     "image_shape": [width, height, channels],
//!     "version": "1.0"
//!   },
//!   "nonce": "<base64, 12 bytes>",
//!   "tag": "<base64, 16 bytes>",
//!   "ciphertext": "<base64, same length as the pixel buffer>"
//! }
//! ```
//!
//! Metadata travels in clear. Version `1.0` leaves it outside the AEAD tag,
//! so it is advisory only; version `2.0` binds it as associated data.

use std::fmt;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    serde::{Deserialize, Serialize},
};

use crate::{
    error::{CryptError, Result},
    traits::{NONCE_LEN, Nonce, TAG_LEN, Tag},
};

/// Container format version, stored as `metadata.version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatVersion {
    /// Metadata is not covered by the tag.
    #[serde(rename = "1.0")]
    V1,
    /// Metadata is bound into the tag as associated data.
    #[serde(rename = "2.0")]
    V2,
}

impl FormatVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1.0",
            Self::V2 => "2.0",
        }
    }

    /// Whether tampering with metadata is detected on open.
    pub fn binds_metadata(self) -> bool {
        matches!(self, Self::V2)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel buffer dimensions. All three values are strictly positive.
///
/// Serialized as a `[width, height, channels]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 3]", into = "[u32; 3]")]
pub struct ImageShape {
    width: u32,
    height: u32,
    channels: u32,
}

impl ImageShape {
    pub fn new(width: u32, height: u32, channels: u32) -> Result<Self> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(CryptError::InvalidMetadata(format!(
                "image shape must be positive, got ({width}, {height}, {channels})"
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Expected pixel buffer length in bytes for 8-bit samples, `None` on
    /// overflow.
    pub fn pixel_len(&self) -> Option<usize> {
        let w = usize::try_from(self.width).ok()?;
        let h = usize::try_from(self.height).ok()?;
        let c = usize::try_from(self.channels).ok()?;
        w.checked_mul(h)?.checked_mul(c)
    }
}

impl TryFrom<[u32; 3]> for ImageShape {
    type Error = CryptError;

    fn try_from([width, height, channels]: [u32; 3]) -> Result<Self> {
        Self::new(width, height, channels)
    }
}

impl From<ImageShape> for [u32; 3] {
    fn from(shape: ImageShape) -> Self {
        [shape.width, shape.height, shape.channels]
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Descriptive record carried alongside the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    pub original_filename: String,
    pub image_shape: ImageShape,
    pub version: FormatVersion,
}

impl Metadata {
    pub fn new(
        original_filename: impl Into<String>,
        image_shape: ImageShape,
        version: FormatVersion,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            image_shape,
            version,
        }
    }

    /// Whether this metadata was authenticated by the tag on open.
    pub fn is_authenticated(&self) -> bool {
        self.version.binds_metadata()
    }

    /// AEAD associated data for this metadata: empty for `1.0`, compact
    /// canonical JSON for `2.0`.
    pub fn associated_data(&self) -> Result<Vec<u8>> {
        if !self.version.binds_metadata() {
            return Ok(Vec::new());
        }
        serde_json::to_vec(self).map_err(|e| CryptError::InvalidMetadata(e.to_string()))
    }
}

/// Text form of a package. Field order here is the on-disk order.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WirePackage {
    metadata: Metadata,
    nonce: String,
    tag: String,
    ciphertext: String,
}

/// A sealed image: metadata, nonce, tag and ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub metadata: Metadata,
    pub nonce: Nonce,
    pub tag: Tag,
    pub ciphertext: Vec<u8>,
}

impl Package {
    /// Deterministic pretty-printed JSON encoding.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let wire = WirePackage {
            metadata: self.metadata.clone(),
            nonce: STANDARD.encode(self.nonce),
            tag: STANDARD.encode(self.tag),
            ciphertext: STANDARD.encode(&self.ciphertext),
        };
        serde_json::to_vec_pretty(&wire).map_err(|e| CryptError::InvalidMetadata(e.to_string()))
    }

    /// Strict decode: unknown or missing fields, bad base64 and wrong nonce
    /// or tag lengths are all [`CryptError::MalformedPackage`].
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let wire: WirePackage = serde_json::from_slice(bytes)
            .map_err(|e| CryptError::MalformedPackage(e.to_string()))?;

        Ok(Self {
            nonce: decode_fixed::<NONCE_LEN>("nonce", &wire.nonce)?,
            tag: decode_fixed::<TAG_LEN>("tag", &wire.tag)?,
            ciphertext: decode_field("ciphertext", &wire.ciphertext)?,
            metadata: wire.metadata,
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptError::MalformedPackage(format!("{name}: invalid base64: {e}")))
}

fn decode_fixed<const N: usize>(name: &str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_field(name, value)?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptError::MalformedPackage(format!(
            "{name}: expected {N} bytes, got {}",
            bytes.len()
        ))
    })
}
