// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::path::Path;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use tessera_core::AuthConfig;
use tessera_core::auth::jwt::{
    SigningKey, TokenIssuer, default_secret_path, generate_secret, resolve_signing_secret_with,
    write_secret,
};
use tessera_core::models::auth::Identity;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();
    let secret_file = args.secret_file.clone().unwrap_or_else(default_secret_path);

    match args.command {
        Commands::Keygen { out, force } => {
            let path = out.unwrap_or(secret_file);
            keygen(&path, force)?;
            println!("{}", path.display());
        }
        Commands::Issue { id, username } => {
            let issuer = issuer(&secret_file)?;
            let identity = Identity {
                id,
                username,
                email: String::new(),
                created_at: Utc::now(),
            };
            let pair = issuer.issue(&identity)?;
            println!("{}", serde_json::to_string_pretty(&pair)?);
        }
        Commands::Inspect { token, kind } => {
            let issuer = issuer(&secret_file)?;
            let claims = issuer.verify(&token, kind.into())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn keygen(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Custom(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    write_secret(path, &generate_secret())?;
    log::info!("wrote signing secret to {}", path.display());
    Ok(())
}

fn issuer(secret_file: &Path) -> Result<TokenIssuer> {
    let key: SigningKey = resolve_signing_secret_with(|var| std::env::var(var).ok(), secret_file)?;
    let config = AuthConfig::from_env();
    Ok(TokenIssuer::new(&key, config.access_ttl_secs, config.refresh_ttl_secs))
}
