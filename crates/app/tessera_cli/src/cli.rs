use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tessera_core::models::auth::TokenKind;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "tessera", version, about = "Tessera signing keys and tokens")]
pub struct Cli {
    /// Signing secret file (defaults to the per-user data directory).
    #[arg(long, global = true, env = "TESSERA_SECRET_FILE")]
    pub secret_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate and persist a new signing secret.
    Keygen {
        /// Where to write the secret.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Overwrite an existing secret.
        #[arg(long)]
        force: bool,
    },

    /// Mint an access/refresh pair and print it as JSON.
    Issue {
        #[arg(long)]
        id: Uuid,

        #[arg(long)]
        username: String,
    },

    /// Verify a token and print its claims as JSON.
    Inspect {
        token: String,

        #[arg(long, value_enum, default_value_t = KindArg::Access)]
        kind: KindArg,
    },

    /// Print the version.
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Access,
    Refresh,
}

impl From<KindArg> for TokenKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Access => TokenKind::Access,
            KindArg::Refresh => TokenKind::Refresh,
        }
    }
}
