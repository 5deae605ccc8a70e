//! Command handlers.

use anyhow::Context;
use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::app::{resolve_config_path, AppContext};
use crate::cli::{Cli, DecryptArgs, EncryptArgs, GenKeyArgs, InitArgs, ListArgs, RevokeArgs};
use crate::config::{write_config, QfeConfig};
use crate::helpers::{default_output_path, prompt_new_passphrase, prompt_passphrase};
use crate::output::{files_json, files_table, format_size};

pub fn handle_init(cli: &Cli, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli)?;
    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }

    let config = QfeConfig::with_default_paths()?;
    write_config(&config_path, &config)?;
    if !cli.quiet {
        println!("Wrote config to {}", config_path.display());
    }
    Ok(())
}

pub async fn handle_gen_key(app: &AppContext, args: &GenKeyArgs) -> anyhow::Result<()> {
    let passphrase = prompt_new_passphrase()?;
    let username = args.username.clone();
    let recipient = args.recipient.clone();
    let info = app
        .pool
        .run(move |service, cancel| {
            service.generate_key_pair_cancellable(
                &username,
                recipient.as_deref(),
                &passphrase,
                cancel,
            )
        })
        .await
        .with_context(|| format!("Failed to generate key pair for {}", args.username))?;

    if !app.quiet {
        println!(
            "Generated key pair for {} (recipient {})",
            info.username, info.recipient_id
        );
        println!("Public key: {}", info.public_key);
    }
    Ok(())
}

pub async fn handle_encrypt(app: &AppContext, args: &EncryptArgs) -> anyhow::Result<()> {
    let record = app
        .pool
        .encrypt_file(
            args.file.clone(),
            args.username.clone(),
            args.recipient.clone(),
        )
        .await
        .with_context(|| format!("Failed to encrypt {}", args.file.display()))?;

    if app.quiet {
        println!("{}", record.unique_filename);
    } else {
        println!(
            "Encrypted {} ({}) for {}",
            record.original_name,
            format_size(record.size_bytes),
            record.recipient_id
        );
        println!("ID: {}", record.unique_filename);
    }
    Ok(())
}

pub async fn handle_decrypt(app: &AppContext, args: &DecryptArgs) -> anyhow::Result<()> {
    let passphrase = prompt_passphrase()?;
    let decrypted = app
        .pool
        .decrypt_file(args.id.clone(), args.username.clone(), passphrase)
        .await
        .with_context(|| format!("Failed to decrypt {}", args.id))?;

    let destination = match &args.output {
        Some(path) => path.clone(),
        None => default_output_path(decrypted.original_name())?,
    };
    let size = decrypted.size_bytes();
    decrypted
        .persist(&destination)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    if !app.quiet {
        println!(
            "Decrypted {} to {}",
            format_size(size),
            destination.display()
        );
    }
    Ok(())
}

pub fn handle_list(app: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let files = app.service().list_files(&args.username)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&files_json(&files))?);
    } else if files.is_empty() {
        if !app.quiet {
            println!("No files for {}", args.username);
        }
    } else {
        println!("{}", files_table(&files));
    }
    Ok(())
}

pub async fn handle_revoke(app: &AppContext, args: &RevokeArgs) -> anyhow::Result<()> {
    let passphrase = prompt_passphrase()?;
    let username = args.username.clone();
    app.pool
        .run(move |service, cancel| {
            service.revoke_key_pair_cancellable(&username, &passphrase, cancel)
        })
        .await
        .with_context(|| format!("Failed to revoke key pair for {}", args.username))?;

    if !app.quiet {
        println!("Revoked key pair for {}", args.username);
    }
    Ok(())
}

pub fn handle_completions(shell: Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "qfe", &mut std::io::stdout());
    Ok(())
}
