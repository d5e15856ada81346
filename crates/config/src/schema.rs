//! Config schema types (paths, images, crypto, logging).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCryptConfig {
    pub paths: PathsConfig,
    pub images: ImagesConfig,
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

impl ImageCryptConfig {
    /// Create every configured directory if missing.
    pub fn create_directories(&self) -> std::io::Result<()> {
        for dir in [
            self.paths.original_dir(),
            self.paths.encrypted_dir(),
            self.paths.decrypted_dir(),
            self.paths.logs_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Working directories. Relative entries are resolved against `base_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    /// Source images picked for encryption.
    pub original: PathBuf,
    /// Where `.enc` packages are written.
    pub encrypted: PathBuf,
    /// Where decrypted images are written.
    pub decrypted: PathBuf,
    pub logs: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            original: PathBuf::from("images/original"),
            encrypted: PathBuf::from("images/encrypted"),
            decrypted: PathBuf::from("images/decrypted"),
            logs: PathBuf::from("logs"),
        }
    }
}

impl PathsConfig {
    fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.base_dir.join(dir)
        }
    }

    pub fn original_dir(&self) -> PathBuf {
        self.resolve(&self.original)
    }

    pub fn encrypted_dir(&self) -> PathBuf {
        self.resolve(&self.encrypted)
    }

    pub fn decrypted_dir(&self) -> PathBuf {
        self.resolve(&self.decrypted)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.resolve(&self.logs)
    }
}

/// Image codec settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Accepted input extensions, lower-case, without the dot.
    pub supported_formats: Vec<String>,
    /// JPEG quality (1-100) used when writing decrypted images.
    pub jpeg_quality: u8,
    /// Keep the alpha channel of RGBA/LA sources instead of flattening to RGB.
    pub preserve_alpha: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            supported_formats: ["jpg", "jpeg", "png", "bmp"]
                .into_iter()
                .map(String::from)
                .collect(),
            jpeg_quality: 95,
            preserve_alpha: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Seal version 2.0 packages whose metadata is covered by the tag.
    /// Off by default so packages stay readable by 1.0-only tools.
    pub bind_metadata: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a per-run log file into the logs directory.
    pub file: bool,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_layout() {
        let cfg = ImageCryptConfig::default();
        assert_eq!(
            cfg.paths.encrypted_dir(),
            PathBuf::from("./images/encrypted")
        );
        assert_eq!(cfg.images.supported_formats, ["jpg", "jpeg", "png", "bmp"]);
        assert_eq!(cfg.images.jpeg_quality, 95);
        assert!(!cfg.crypto.bind_metadata);
        assert!(!cfg.logging.file);
    }

    #[test]
    fn absolute_paths_ignore_base_dir() {
        let paths = PathsConfig {
            base_dir: PathBuf::from("/srv/imagecrypt"),
            logs: PathBuf::from("/var/log/imagecrypt"),
            ..PathsConfig::default()
        };
        assert_eq!(paths.logs_dir(), PathBuf::from("/var/log/imagecrypt"));
        assert_eq!(
            paths.decrypted_dir(),
            PathBuf::from("/srv/imagecrypt/images/decrypted")
        );
    }

    #[test]
    fn create_directories_builds_tree() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ImageCryptConfig {
            paths: PathsConfig {
                base_dir: dir.path().to_path_buf(),
                ..PathsConfig::default()
            },
            ..ImageCryptConfig::default()
        };
        cfg.create_directories().unwrap();
        assert!(dir.path().join("images/original").is_dir());
        assert!(dir.path().join("images/encrypted").is_dir());
        assert!(dir.path().join("images/decrypted").is_dir());
        assert!(dir.path().join("logs").is_dir());
    }
}
