//! Raster codec bridge for the image container.
//!
//! Turns an image file into a flat 8-bit pixel buffer plus its
//! [`ImageShape`], and writes such a buffer back out in a format chosen by
//! file extension. The crypto crate never sees codecs; it only sees the
//! bytes produced here.

use std::{io::Cursor, path::Path};

use {
    image::{
        DynamicImage, GenericImageView, ImageBuffer, ImageFormat, ImageReader,
        codecs::jpeg::JpegEncoder,
    },
    imagecrypt_crypto::ImageShape,
    tracing::{debug, info},
};

use crate::error::{Error, Result};

/// File extensions accepted as encryption input by default.
pub const DEFAULT_SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// JPEG quality used when writing decrypted images (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Decoded pixels, row-major, 8 bits per sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub shape: ImageShape,
}

impl RawImage {
    /// Pair a buffer with a shape, checking the buffer length matches.
    pub fn new(pixels: Vec<u8>, shape: ImageShape) -> Result<Self> {
        let expected = shape
            .pixel_len()
            .ok_or_else(|| Error::invalid_input(format!("image shape {shape} overflows")))?;
        if pixels.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { pixels, shape })
    }
}

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Lower-case extensions without the dot.
    pub supported_formats: Vec<String>,
    /// Keep an alpha channel (RGBA) instead of flattening to RGB.
    pub preserve_alpha: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            supported_formats: DEFAULT_SUPPORTED_FORMATS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            preserve_alpha: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub jpeg_quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Case-insensitive extension check against `formats`.
pub fn is_supported_format(path: &Path, formats: &[String]) -> bool {
    extension_of(path).is_some_and(|ext| formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)))
}

/// Load an image file and flatten it to 8-bit RGB (or RGBA when
/// `preserve_alpha` is set and the source has alpha).
pub fn decode_image(path: &Path, options: &DecodeOptions) -> Result<RawImage> {
    if !path.exists() {
        return Err(Error::invalid_input(format!(
            "image file not found: {}",
            path.display()
        )));
    }
    if !is_supported_format(path, &options.supported_formats) {
        return Err(Error::unsupported_format(
            extension_of(path).unwrap_or_default(),
        ));
    }

    let img = ImageReader::open(path)
        .map_err(|e| Error::external(format!("failed to open {}", path.display()), e))?
        .with_guessed_format()
        .map_err(|e| Error::external("failed to guess image format", e))?
        .decode()
        .map_err(|e| Error::external(format!("failed to decode {}", path.display()), e))?;

    let raw = from_dynamic(&img, options.preserve_alpha)?;
    info!(
        path = %path.display(),
        width = raw.shape.width(),
        height = raw.shape.height(),
        channels = raw.shape.channels(),
        "loaded image"
    );
    Ok(raw)
}

/// Flatten a decoded image into a [`RawImage`].
pub fn from_dynamic(img: &DynamicImage, preserve_alpha: bool) -> Result<RawImage> {
    let (width, height) = img.dimensions();
    let (pixels, channels) = if preserve_alpha && img.color().has_alpha() {
        (img.to_rgba8().into_raw(), 4)
    } else {
        (img.to_rgb8().into_raw(), 3)
    };
    let shape = ImageShape::new(width, height, channels)
        .map_err(|e| Error::invalid_input(e.to_string()))?;
    debug!(bytes = pixels.len(), %shape, "converted image to bytes");
    RawImage::new(pixels, shape)
}

/// Rebuild an image from a flat buffer. Supports 1 (L), 2 (LA), 3 (RGB) and
/// 4 (RGBA) channels.
pub fn to_dynamic(raw: &RawImage) -> Result<DynamicImage> {
    let expected = raw
        .shape
        .pixel_len()
        .ok_or_else(|| Error::invalid_input(format!("image shape {} overflows", raw.shape)))?;
    if raw.pixels.len() != expected {
        return Err(Error::ShapeMismatch {
            expected,
            actual: raw.pixels.len(),
        });
    }

    let (w, h) = (raw.shape.width(), raw.shape.height());
    let pixels = raw.pixels.clone();
    let img = match raw.shape.channels() {
        1 => ImageBuffer::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
        2 => ImageBuffer::from_raw(w, h, pixels).map(DynamicImage::ImageLumaA8),
        3 => ImageBuffer::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
        4 => ImageBuffer::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8),
        n => {
            return Err(Error::invalid_input(format!(
                "unsupported channel count: {n}"
            )));
        },
    };
    img.ok_or_else(|| Error::invalid_input("pixel buffer does not match image shape"))
}

/// Write `raw` to `path`, picking the codec from the extension. Parent
/// directories are created. JPEG output drops any alpha channel.
///
/// The image is encoded in memory first; nothing is created on disk unless
/// encoding succeeds.
pub fn encode_image(raw: &RawImage, path: &Path, options: &EncodeOptions) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|_| Error::unsupported_format(extension_of(path).unwrap_or_default()))?;
    let img = to_dynamic(raw)?;

    let mut encoded = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let img = if img.color().has_alpha() {
                DynamicImage::ImageRgb8(img.to_rgb8())
            } else {
                img
            };
            let encoder = JpegEncoder::new_with_quality(&mut encoded, options.jpeg_quality);
            img.write_with_encoder(encoder)
                .map_err(|e| Error::external("failed to encode as JPEG", e))?;
        },
        other => img
            .write_to(&mut encoded, other)
            .map_err(|e| Error::external(format!("failed to encode as {other:?}"), e))?,
    }
    let encoded = encoded.into_inner();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::external(format!("failed to create {}", parent.display()), e))?;
    }
    std::fs::write(path, &encoded)
        .map_err(|e| Error::external(format!("failed to write {}", path.display()), e))?;

    info!(path = %path.display(), format = ?format, bytes = encoded.len(), "saved image");
    Ok(())
}
