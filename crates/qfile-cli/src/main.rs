//! QFile CLI - per-user asymmetric file encryption
//!
//! Command-line front end for `qfile-core`: manage key pairs, encrypt files
//! for a recipient and decrypt them again.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::constants::LOG_ENV;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(errors::exit_code(&err));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init(args) => commands::handle_init(&cli, args),
        Commands::Completions { shell } => commands::handle_completions(*shell),
        Commands::GenKey(args) => {
            let app = AppContext::open(&cli)?;
            commands::handle_gen_key(&app, args).await
        }
        Commands::Encrypt(args) => {
            let app = AppContext::open(&cli)?;
            commands::handle_encrypt(&app, args).await
        }
        Commands::Decrypt(args) => {
            let app = AppContext::open(&cli)?;
            commands::handle_decrypt(&app, args).await
        }
        Commands::List(args) => {
            let app = AppContext::open(&cli)?;
            commands::handle_list(&app, args)
        }
        Commands::Revoke(args) => {
            let app = AppContext::open(&cli)?;
            commands::handle_revoke(&app, args).await
        }
    }
}
