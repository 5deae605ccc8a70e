//! Application wiring: config resolution and service construction.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use qfile_core::{FileEncryptionService, LocalBlobStore, SqliteStore, WorkerPool};

use crate::cli::Cli;
use crate::config::{default_config_path, load_config, QfeConfig};

/// Resolved config path: `--config`/`QFE_CONFIG`, else the XDG default.
pub fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => default_config_path(),
    }
}

/// Everything a command needs to talk to the service.
pub struct AppContext {
    pub pool: WorkerPool,
    pub quiet: bool,
}

impl AppContext {
    pub fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = resolve_config_path(cli)?;
        let config = load_config(&config_path)?;
        let pool = build_pool(&config)?;
        Ok(Self {
            pool,
            quiet: cli.quiet,
        })
    }

    pub fn service(&self) -> &FileEncryptionService {
        self.pool.service()
    }
}

fn build_pool(config: &QfeConfig) -> anyhow::Result<WorkerPool> {
    let catalog_path = config.catalog_path()?;
    if let Some(parent) = catalog_path.parent() {
        qfile_core::fs::create_private_dir_all(parent).with_context(|| {
            format!("Failed to create data directory {}", parent.display())
        })?;
    }
    let store = Arc::new(
        SqliteStore::open(&catalog_path)
            .with_context(|| format!("Failed to open catalog {}", catalog_path.display()))?,
    );
    let blobs = LocalBlobStore::open(config.blob_dir()?)?;

    let service = FileEncryptionService::with_default_crypto(
        store.clone(),
        store,
        Arc::new(blobs),
        config.service.clone(),
    )?;
    tracing::debug!(catalog = %catalog_path.display(), "service ready");
    Ok(WorkerPool::new(Arc::new(service)))
}
