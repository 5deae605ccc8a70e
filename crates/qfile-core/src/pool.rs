//! Bounded async front for the blocking service.
//!
//! Each request runs on tokio's blocking thread pool while holding one
//! semaphore permit. A request that exceeds the operation timeout, or whose
//! caller stops awaiting it, has its [`CancelFlag`] raised; the job stops at
//! the next chunk boundary and only then releases its permit. A job that has
//! already passed its commit point cannot be cancelled, so a late timeout
//! waits for it and reports its real outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use age::secrecy::SecretString;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::crypto::CancelFlag;
use crate::error::{QfeError, Result};
use crate::service::{DecryptedFile, FileEncryptionService, KeyPairInfo};
use crate::storage::EncryptedFile;

/// Raises a cancel flag unless disarmed before drop.
struct CancelOnDrop {
    flag: CancelFlag,
    armed: bool,
}

impl CancelOnDrop {
    fn new(flag: CancelFlag) -> Self {
        Self { flag, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.cancel();
        }
    }
}

/// Runs service operations with bounded parallelism and a per-request timeout.
#[derive(Clone)]
pub struct WorkerPool {
    service: Arc<FileEncryptionService>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl WorkerPool {
    /// Pool sized from the service's configuration.
    pub fn new(service: Arc<FileEncryptionService>) -> Self {
        let concurrency = service.config().effective_concurrency();
        let timeout = service.config().operation_timeout();
        Self::with_limits(service, concurrency, timeout)
    }

    pub fn with_limits(
        service: Arc<FileEncryptionService>,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
        }
    }

    pub fn service(&self) -> &Arc<FileEncryptionService> {
        &self.service
    }

    /// Permits not currently held by a running job.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn generate_key_pair(
        &self,
        identity: String,
        passphrase: SecretString,
    ) -> Result<KeyPairInfo> {
        self.run(move |service, cancel| {
            service.generate_key_pair_cancellable(&identity, None, &passphrase, cancel)
        })
        .await
    }

    pub async fn encrypt_file(
        &self,
        path: PathBuf,
        owner: String,
        recipient_id: String,
    ) -> Result<EncryptedFile> {
        self.run(move |service, cancel| {
            service.encrypt_file_cancellable(&path, &owner, &recipient_id, cancel)
        })
        .await
    }

    pub async fn decrypt_file(
        &self,
        unique_filename: String,
        requester: String,
        passphrase: SecretString,
    ) -> Result<DecryptedFile> {
        self.run(move |service, cancel| {
            service.decrypt_file_cancellable(&unique_filename, &requester, &passphrase, cancel)
        })
        .await
    }

    /// Run an arbitrary blocking job under the pool's limits.
    ///
    /// # Errors
    ///
    /// Returns `QfeError::Timeout` if the job outlives the pool timeout, and
    /// `QfeError::Other` if it panics.
    pub async fn run<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&FileEncryptionService, &CancelFlag) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| QfeError::Other("Worker pool is closed".to_string()))?;

        let cancel = CancelFlag::new();
        let mut guard = CancelOnDrop::new(cancel.clone());
        let service = Arc::clone(&self.service);
        let job_cancel = cancel.clone();

        let mut handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(&service, &job_cancel)
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => {
                guard.disarm();
                finish(joined)
            }
            Err(_) if cancel.cancel() => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "operation timed out");
                Err(QfeError::Timeout(self.timeout))
            }
            Err(_) => {
                debug!("timeout after commit point, waiting for the job");
                let joined = handle.await;
                guard.disarm();
                finish(joined)
            }
        }
    }
}

fn finish<T>(joined: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    joined.unwrap_or_else(|e| {
        warn!(error = %e, "worker job failed");
        Err(QfeError::Other(format!("Worker job failed: {}", e)))
    })
}
