//! Image codec collaborator: file <-> flat pixel buffer with shape.

pub mod error;
pub mod image_ops;

pub use {
    error::{Error, Result},
    image_ops::{
        DecodeOptions, EncodeOptions, RawImage, decode_image, encode_image, is_supported_format,
    },
};
