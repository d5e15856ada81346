use {
    anyhow::{Result, bail},
    clap::Subcommand,
};

use imagecrypt_config::{ImageCryptConfig, find_or_default_config_path, save_config};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default config file and create the working directories.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as TOML.
    Show,
}

pub fn handle_config(action: ConfigAction, config: &ImageCryptConfig) -> Result<()> {
    match action {
        ConfigAction::Init { force } => init(force),
        ConfigAction::Show => show(config),
    }
}

fn init(force: bool) -> Result<()> {
    let path = find_or_default_config_path();
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    let config = ImageCryptConfig::default();
    let path = save_config(&config)?;
    config.create_directories()?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn show(config: &ImageCryptConfig) -> Result<()> {
    let path = find_or_default_config_path();
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# no config file found; showing defaults");
    }
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
