use {
    anyhow::{Context, Result},
    clap::Subcommand,
    imagecrypt_crypto::{
        Key, Salt, derive_key_from_password, generate_random_key, key_to_string, string_to_key,
    },
    secrecy::{ExposeSecret, SecretString},
};

#[derive(Subcommand)]
pub enum KeyAction {
    /// Print a new random key (base64).
    Generate,
    /// Derive a key from a password with PBKDF2-HMAC-SHA256.
    Derive {
        /// Password to derive from.
        #[arg(long, env = "IMAGECRYPT_PASSWORD", hide_env_values = true)]
        password: String,
        /// Base64 salt from an earlier derivation; random when omitted.
        #[arg(long)]
        salt: Option<String>,
    },
    /// Check that a textual key decodes to a 32-byte key.
    Check { key: String },
}

pub fn handle_key(action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Generate => {
            let key = generate_random_key()?;
            println!("{}", key_to_string(&key));
        },
        KeyAction::Derive { password, salt } => {
            let password = SecretString::new(password);
            let (key, salt) = derive(&password, salt.as_deref())?;
            println!("key:  {}", key_to_string(&key));
            println!("salt: {}", salt.to_base64());
        },
        KeyAction::Check { key } => {
            string_to_key(&key).context("invalid key")?;
            println!("key is valid");
        },
    }
    Ok(())
}

/// Derive from `password`, reusing `salt` (base64) when given.
pub fn derive(password: &SecretString, salt: Option<&str>) -> Result<(Key, Salt)> {
    let salt = salt
        .map(Salt::from_base64)
        .transpose()
        .context("invalid salt")?;
    Ok(derive_key_from_password(
        password.expose_secret(),
        salt.as_ref(),
    )?)
}

/// Parse a key given on the command line without leaving a plain copy around.
pub fn parse_key(text: String) -> Result<Key> {
    let text = SecretString::new(text);
    string_to_key(text.expose_secret()).context("invalid key")
}
