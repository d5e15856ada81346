mod config_commands;
mod image_commands;
mod key_commands;

use std::{fs::File, path::PathBuf, sync::Mutex};

use {
    clap::{Parser, Subcommand},
    imagecrypt_config::ImageCryptConfig,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "imagecrypt", about = "Encrypt and decrypt images with AES-256-GCM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/imagecrypt/).
    #[arg(long, global = true, env = "IMAGECRYPT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Key generation, derivation and validation.
    Key {
        #[command(subcommand)]
        action: key_commands::KeyAction,
    },
    /// Encrypt one or more images into packages.
    Encrypt(image_commands::EncryptArgs),
    /// Decrypt a package back into an image file.
    Decrypt(image_commands::DecryptArgs),
    /// Show package metadata without decrypting.
    Inspect { package: PathBuf },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Open `imagecrypt_<timestamp>.log` in the logs directory.
fn open_log_file(config: &ImageCryptConfig) -> std::io::Result<(PathBuf, File)> {
    let dir = config.paths.logs_dir();
    std::fs::create_dir_all(&dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("imagecrypt_{stamp}.log"));
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Initialise tracing on stderr, plus a plain-text copy in `log_file` when
/// file logging is enabled.
fn init_telemetry(cli: &Cli, log_file: Option<File>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
    });

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Apply directory override before loading config
    if let Some(ref dir) = cli.config_dir {
        imagecrypt_config::set_config_dir(dir.clone());
    }
    let config = imagecrypt_config::discover_and_load();

    let mut log_file_error = None;
    let log_file = if config.logging.file {
        match open_log_file(&config) {
            Ok(opened) => Some(opened),
            Err(e) => {
                log_file_error = Some(e);
                None
            },
        }
    } else {
        None
    };
    let log_path = log_file.as_ref().map(|(path, _)| path.clone());

    init_telemetry(&cli, log_file.map(|(_, file)| file));

    if let Some(e) = log_file_error {
        warn!(error = %e, "failed to open log file, logging to stderr only");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?log_path,
        "imagecrypt starting"
    );

    match cli.command {
        Commands::Key { action } => key_commands::handle_key(action),
        Commands::Encrypt(args) => image_commands::handle_encrypt(args, &config).await,
        Commands::Decrypt(args) => image_commands::handle_decrypt(args, &config).await,
        Commands::Inspect { package } => image_commands::handle_inspect(&package),
        Commands::Config { action } => config_commands::handle_config(action, &config),
    }
}
