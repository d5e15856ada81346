use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    imagecrypt_config::{ImageCryptConfig, decrypted_file_name, encrypted_file_name},
    imagecrypt_crypto::{
        CryptError, Key, Metadata, Opener, Salt, Sealer, generate_random_key, key_to_string,
    },
    imagecrypt_media::{DecodeOptions, EncodeOptions, RawImage, decode_image, encode_image},
    secrecy::SecretString,
    tokio::task::JoinSet,
    tracing::{error, info, warn},
};

use crate::key_commands::{derive, parse_key};

#[derive(Args)]
pub struct EncryptArgs {
    /// Images to encrypt.
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Base64 key. Takes precedence over --password; a new key is generated
    /// and printed when neither is given.
    #[arg(long)]
    key: Option<String>,
    /// Derive the key from a password.
    #[arg(long, env = "IMAGECRYPT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Base64 salt for --password; random when omitted.
    #[arg(long, requires = "password")]
    salt: Option<String>,
    /// Output directory (defaults to the configured encrypted directory).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Write 2.0 packages whose metadata is covered by the tag.
    #[arg(long)]
    bind_metadata: bool,
}

#[derive(Args)]
pub struct DecryptArgs {
    /// Encrypted package (.enc).
    package: PathBuf,
    /// Base64 key used at encryption time.
    #[arg(long, env = "IMAGECRYPT_KEY", hide_env_values = true)]
    key: String,
    /// Output directory (defaults to the configured decrypted directory).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output image format (png, jpg, bmp). Defaults to the original extension.
    #[arg(long)]
    format: Option<String>,
}

/// Where the encryption key came from; decides what gets printed afterwards.
enum KeySource {
    Given,
    Generated,
    Derived(Salt),
}

fn resolve_key(args: &EncryptArgs) -> Result<(Key, KeySource)> {
    if let Some(text) = &args.key {
        return Ok((parse_key(text.clone())?, KeySource::Given));
    }
    if let Some(password) = &args.password {
        let password = SecretString::new(password.clone());
        let (key, salt) = derive(&password, args.salt.as_deref())?;
        return Ok((key, KeySource::Derived(salt)));
    }
    Ok((generate_random_key()?, KeySource::Generated))
}

fn decode_options(config: &ImageCryptConfig) -> DecodeOptions {
    DecodeOptions {
        supported_formats: config.images.supported_formats.clone(),
        preserve_alpha: config.images.preserve_alpha,
    }
}

/// Seal one image file into `out_dir`. Returns the written package path.
pub fn encrypt_file(
    image: &Path,
    key: &Key,
    options: &DecodeOptions,
    out_dir: &Path,
    bind_metadata: bool,
) -> Result<PathBuf> {
    let raw = decode_image(image, options)?;
    let filename = image
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", image.display()))?;

    let sealer = Sealer::new();
    let package = if bind_metadata {
        sealer.seal_bound(&raw.pixels, key, filename, raw.shape)?
    } else {
        sealer.seal(&raw.pixels, key, filename, raw.shape)?
    };
    let bytes = sealer.serialize(&package)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let dest = out_dir.join(encrypted_file_name(filename));
    std::fs::write(&dest, bytes).with_context(|| format!("failed to write {}", dest.display()))?;
    info!(source = %image.display(), dest = %dest.display(), "encrypted image");
    Ok(dest)
}

/// Used when the original extension is missing or not writable.
const FALLBACK_EXTENSION: &str = "png";

/// Pick the output extension. An explicit `format` must be supported; an
/// extension taken from package metadata is untrusted and falls back to
/// png when it is not.
pub fn output_extension(
    original_filename: &str,
    format: Option<&str>,
    supported: &[String],
) -> Result<String> {
    let is_supported = |ext: &str| supported.iter().any(|f| f.eq_ignore_ascii_case(ext));

    if let Some(format) = format {
        let format = format.trim_start_matches('.');
        if !is_supported(format) {
            bail!("unsupported output format: {format}");
        }
        return Ok(format.to_ascii_lowercase());
    }

    let original = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| is_supported(e));
    match original {
        Some(ext) => Ok(ext.to_ascii_lowercase()),
        None => {
            warn!(
                file = original_filename,
                fallback = FALLBACK_EXTENSION,
                "original extension not writable, using fallback"
            );
            Ok(FALLBACK_EXTENSION.to_string())
        },
    }
}

/// Whether `err` comes from the environment (entropy, cipher backend) rather
/// than from the input.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CryptError>()
        .is_some_and(CryptError::is_fatal)
}

/// Open one package and write the image into `out_dir`. Returns the written
/// image path and the package metadata.
pub fn decrypt_file(
    package: &Path,
    key: &Key,
    out_dir: &Path,
    format: Option<&str>,
    supported: &[String],
    options: &EncodeOptions,
) -> Result<(PathBuf, Metadata)> {
    let bytes = std::fs::read(package)
        .with_context(|| format!("failed to read {}", package.display()))?;
    let (pixels, metadata) = Opener::new().open(&bytes, key)?;
    let raw = RawImage::new(pixels, metadata.image_shape)?;

    let ext = output_extension(&metadata.original_filename, format, supported)?;
    let dest = out_dir.join(decrypted_file_name(&metadata.original_filename, Some(&ext)));
    encode_image(&raw, &dest, options)?;
    info!(source = %package.display(), dest = %dest.display(), "decrypted image");
    Ok((dest, metadata))
}

pub async fn handle_encrypt(args: EncryptArgs, config: &ImageCryptConfig) -> Result<()> {
    let (key, source) = resolve_key(&args)?;
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| config.paths.encrypted_dir());
    let bind_metadata = args.bind_metadata || config.crypto.bind_metadata;
    let options = Arc::new(decode_options(config));
    let key = Arc::new(key);
    let total = args.images.len();

    let mut tasks = JoinSet::new();
    for image in args.images {
        let key = Arc::clone(&key);
        let options = Arc::clone(&options);
        let out_dir = out_dir.clone();
        tasks.spawn_blocking(move || {
            let result = encrypt_file(&image, &key, &options, &out_dir, bind_metadata);
            (image, result)
        });
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (image, result) = joined.context("encryption task panicked")?;
        match result {
            Ok(dest) => println!("{} -> {}", image.display(), dest.display()),
            Err(e) if is_fatal(&e) => {
                error!(
                    path = %image.display(),
                    error = %e,
                    "encryption aborted by environment failure"
                );
                return Err(e);
            },
            Err(e) => {
                failed += 1;
                warn!(path = %image.display(), error = %e, "encryption failed");
                eprintln!("{}: {e:#}", image.display());
            },
        }
    }

    match source {
        KeySource::Given => {},
        KeySource::Generated => println!("key:  {}", key_to_string(&key)),
        KeySource::Derived(salt) => println!("salt: {}", salt.to_base64()),
    }

    if failed > 0 {
        bail!("{failed} of {total} image(s) failed to encrypt");
    }
    Ok(())
}

pub async fn handle_decrypt(args: DecryptArgs, config: &ImageCryptConfig) -> Result<()> {
    let key = parse_key(args.key)?;
    let out_dir = args.out.unwrap_or_else(|| config.paths.decrypted_dir());
    let options = EncodeOptions {
        jpeg_quality: config.images.jpeg_quality,
    };
    let supported = config.images.supported_formats.clone();
    let package = args.package;
    let format = args.format;

    let result = tokio::task::spawn_blocking(move || {
        decrypt_file(
            &package,
            &key,
            &out_dir,
            format.as_deref(),
            &supported,
            &options,
        )
    })
    .await
    .context("decryption task panicked")?;

    let (dest, metadata) = match result {
        Ok(done) => done,
        Err(e) => {
            if is_fatal(&e) {
                error!(error = %e, "decryption aborted by environment failure");
            } else {
                warn!(error = %e, "decryption failed");
            }
            return Err(e);
        },
    };

    println!(
        "{} ({}) -> {}",
        metadata.original_filename,
        metadata.image_shape,
        dest.display()
    );
    Ok(())
}

/// Print package metadata without decrypting.
pub fn handle_inspect(package: &Path) -> Result<()> {
    let bytes = std::fs::read(package)
        .with_context(|| format!("failed to read {}", package.display()))?;
    let parsed = Opener::new().parse(&bytes)?;
    let meta = &parsed.metadata;
    println!("file:          {}", meta.original_filename);
    println!("shape:         {}", meta.image_shape);
    println!("version:       {}", meta.version);
    println!(
        "authenticated: {}",
        if meta.is_authenticated() { "yes" } else { "no" }
    );
    println!("ciphertext:    {} bytes", parsed.ciphertext.len());
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        imagecrypt_crypto::ImageShape,
    };

    fn write_png(dir: &Path, name: &str) -> (PathBuf, RawImage) {
        let shape = ImageShape::new(4, 3, 3).unwrap();
        let pixels: Vec<u8> = (0..shape.pixel_len().unwrap())
            .map(|i| (i * 7 % 251) as u8)
            .collect();
        let raw = RawImage::new(pixels, shape).unwrap();
        let path = dir.join(name);
        encode_image(&raw, &path, &EncodeOptions::default()).unwrap();
        (path, raw)
    }

    fn formats() -> Vec<String> {
        DecodeOptions::default().supported_formats
    }

    #[test]
    fn encrypt_then_decrypt_file() {
        let dir = tempfile::tempdir().unwrap();
        let (image, raw) = write_png(dir.path(), "cat.png");
        let key = generate_random_key().unwrap();

        let enc_dir = dir.path().join("encrypted");
        let package =
            encrypt_file(&image, &key, &DecodeOptions::default(), &enc_dir, false).unwrap();
        assert_eq!(package, enc_dir.join("encrypted_cat.png.enc"));

        let dec_dir = dir.path().join("decrypted");
        let (out, metadata) =
            decrypt_file(&package, &key, &dec_dir, None, &formats(), &EncodeOptions::default())
                .unwrap();
        assert_eq!(out, dec_dir.join("decrypted_cat.png"));
        assert_eq!(metadata.original_filename, "cat.png");
        assert!(!metadata.is_authenticated());

        let restored = decode_image(&out, &DecodeOptions::default()).unwrap();
        assert_eq!(restored, raw);
    }

    #[test]
    fn decrypt_with_wrong_key_is_authentication_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (image, _) = write_png(dir.path(), "dog.png");
        let key = generate_random_key().unwrap();
        let package =
            encrypt_file(&image, &key, &DecodeOptions::default(), dir.path(), true).unwrap();

        let other = generate_random_key().unwrap();
        let err = decrypt_file(
            &package,
            &other,
            dir.path(),
            None,
            &formats(),
            &EncodeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CryptError>(),
            Some(CryptError::AuthenticationFailed)
        ));
        assert!(!dir.path().join("decrypted_dog.png").exists());
    }

    #[test]
    fn decrypt_can_change_format() {
        let dir = tempfile::tempdir().unwrap();
        let (image, raw) = write_png(dir.path(), "bird.png");
        let key = generate_random_key().unwrap();
        let package =
            encrypt_file(&image, &key, &DecodeOptions::default(), dir.path(), false).unwrap();

        let (out, _) = decrypt_file(
            &package,
            &key,
            dir.path(),
            Some("bmp"),
            &formats(),
            &EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(out, dir.path().join("decrypted_bird.bmp"));
        assert_eq!(decode_image(&out, &DecodeOptions::default()).unwrap(), raw);
    }

    #[test]
    fn unwritable_original_extension_falls_back_to_png() {
        let dir = tempfile::tempdir().unwrap();
        let key = generate_random_key().unwrap();
        let shape = ImageShape::new(2, 2, 3).unwrap();
        let pixels: Vec<u8> = (0..12).collect();

        let sealer = Sealer::new();
        let package = sealer.seal(&pixels, &key, "photo.gif", shape).unwrap();
        let path = dir.path().join("encrypted_photo.gif.enc");
        std::fs::write(&path, sealer.serialize(&package).unwrap()).unwrap();

        let out_dir = dir.path().join("decrypted");
        let (out, _) = decrypt_file(
            &path,
            &key,
            &out_dir,
            None,
            &formats(),
            &EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(out, out_dir.join("decrypted_photo.png"));
        assert!(!out_dir.join("decrypted_photo.gif").exists());
        for entry in std::fs::read_dir(&out_dir).unwrap() {
            assert!(entry.unwrap().metadata().unwrap().len() > 0);
        }
        let restored = decode_image(&out, &DecodeOptions::default()).unwrap();
        assert_eq!(restored.pixels, pixels);
    }

    #[test]
    fn unsupported_format_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (image, _) = write_png(dir.path(), "fish.png");
        let key = generate_random_key().unwrap();
        let package =
            encrypt_file(&image, &key, &DecodeOptions::default(), dir.path(), false).unwrap();

        let out_dir = dir.path().join("decrypted");
        let err = decrypt_file(
            &package,
            &key,
            &out_dir,
            Some("gif"),
            &formats(),
            &EncodeOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported output format"));
        assert!(!out_dir.exists());
    }

    #[test]
    fn output_extension_rules() {
        let supported = formats();
        assert_eq!(output_extension("a.JPG", None, &supported).unwrap(), "jpg");
        assert_eq!(output_extension("a.png", Some(".BMP"), &supported).unwrap(), "bmp");
        assert_eq!(output_extension("a.webp", None, &supported).unwrap(), "png");
        assert_eq!(output_extension("noext", None, &supported).unwrap(), "png");
        assert!(output_extension("a.png", Some("tiff"), &supported).is_err());
    }

    #[test]
    fn only_environment_errors_are_fatal() {
        let entropy = anyhow::Error::new(CryptError::Entropy("no rng".into()));
        assert!(is_fatal(&entropy));
        let auth = anyhow::Error::new(CryptError::AuthenticationFailed);
        assert!(!is_fatal(&auth));
        assert!(!is_fatal(&anyhow::anyhow!("failed to read x")));
    }

    #[derive(clap::Parser)]
    struct EncryptCli {
        #[command(flatten)]
        args: EncryptArgs,
    }

    #[test]
    fn password_can_come_from_environment() {
        use clap::CommandFactory;

        let cmd = EncryptCli::command();
        let password = cmd
            .get_arguments()
            .find(|a| a.get_id() == "password")
            .unwrap();
        assert_eq!(
            password.get_env().and_then(|v| v.to_str()),
            Some("IMAGECRYPT_PASSWORD")
        );
        assert!(password.is_hide_env_values_set());
    }

    #[test]
    fn key_takes_precedence_over_password() {
        use clap::Parser;

        let key = generate_random_key().unwrap();
        let cli = EncryptCli::try_parse_from([
            "encrypt",
            "cat.png",
            "--key",
            &key_to_string(&key),
            "--password",
            "ignored",
        ])
        .unwrap();
        let (resolved, source) = resolve_key(&cli.args).unwrap();
        assert_eq!(resolved.as_bytes(), key.as_bytes());
        assert!(matches!(source, KeySource::Given));
    }

    #[test]
    fn encrypt_rejects_unsupported_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let key = generate_random_key().unwrap();
        assert!(encrypt_file(&path, &key, &DecodeOptions::default(), dir.path(), false).is_err());
    }

    #[tokio::test]
    async fn encrypt_many_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let images: Vec<PathBuf> = (0..6)
            .map(|i| write_png(dir.path(), &format!("img{i}.png")).0)
            .collect();
        let key = generate_random_key().unwrap();
        let out = dir.path().join("out");

        let args = EncryptArgs {
            images,
            key: Some(key_to_string(&key)),
            password: None,
            salt: None,
            out: Some(out.clone()),
            bind_metadata: false,
        };
        handle_encrypt(args, &ImageCryptConfig::default())
            .await
            .unwrap();

        for i in 0..6 {
            assert!(out.join(format!("encrypted_img{i}.png.enc")).is_file());
        }
    }

    #[tokio::test]
    async fn partial_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (good, _) = write_png(dir.path(), "good.png");
        let args = EncryptArgs {
            images: vec![good, dir.path().join("missing.png")],
            key: None,
            password: None,
            salt: None,
            out: Some(dir.path().to_path_buf()),
            bind_metadata: false,
        };
        let err = handle_encrypt(args, &ImageCryptConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 2"));
        assert!(dir.path().join("encrypted_good.png.enc").is_file());
    }
}
