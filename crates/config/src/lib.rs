//! Configuration loading and output naming.
//!
//! Config files: `imagecrypt.toml`, `imagecrypt.yaml`, or `imagecrypt.json`
//! Searched in `./` then `~/.config/imagecrypt/`.

pub mod loader;
pub mod naming;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, find_or_default_config_path,
        load_config, save_config, save_config_to, set_config_dir,
    },
    naming::{decrypted_file_name, encrypted_file_name, sanitize_file_name},
    schema::{CryptoConfig, ImageCryptConfig, ImagesConfig, LoggingConfig, PathsConfig},
};
