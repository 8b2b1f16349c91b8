//! Shipping a staged pair to the remote data and count directories.

use std::path::Path;
use std::sync::Arc;

use super::error::{HandoffError, HandoffFailure};
use super::sftp::OpenSshTransport;
use crate::config::RemoteConfig;
use crate::sanitize::redact_path;

/// Opens authenticated remote-copy sessions.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> Result<Box<dyn TransferSession>, HandoffFailure>;
}

/// One open remote-copy session.
#[async_trait::async_trait]
pub trait TransferSession: Send {
    /// Copies `local` into `remote_dir`, keeping its file name.
    async fn put(&mut self, local: &Path, remote_dir: &str) -> Result<(), HandoffFailure>;

    async fn close(&mut self) -> Result<(), HandoffFailure>;
}

#[derive(Clone)]
pub struct RemoteHandoff {
    transport: Arc<dyn Transport>,
    data_directory: String,
    count_directory: String,
}

impl RemoteHandoff {
    pub fn new(
        transport: Arc<dyn Transport>,
        data_directory: impl Into<String>,
        count_directory: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            data_directory: data_directory.into(),
            count_directory: count_directory.into(),
        }
    }

    /// Handoff over OpenSSH using the configured remote account.
    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self::new(
            Arc::new(OpenSshTransport::new(remote.clone())),
            remote.data_directory.clone(),
            remote.count_directory.clone(),
        )
    }

    /// Sends the data file, then the count file, over one session.
    ///
    /// On failure the error lists which file names reached the remote side.
    /// A failed close after both puts succeeded is only logged: the remote
    /// poller already has a complete pair.
    #[tracing::instrument(skip_all, fields(data_file = %redact_path(data_file)))]
    pub async fn send(&self, data_file: &Path, count_file: &Path) -> Result<(), HandoffError> {
        let data_name = redact_path(data_file);
        let count_name = redact_path(count_file);

        let mut session = self.transport.open().await.map_err(|reason| HandoffError {
            completed: Vec::new(),
            pending: vec![data_name.clone(), count_name.clone()],
            reason,
        })?;

        if let Err(reason) = session.put(data_file, &self.data_directory).await {
            close_quietly(session.as_mut()).await;
            return Err(HandoffError {
                completed: Vec::new(),
                pending: vec![data_name, count_name],
                reason,
            });
        }
        tracing::debug!(file = %data_name, "Data file sent");

        if let Err(reason) = session.put(count_file, &self.count_directory).await {
            close_quietly(session.as_mut()).await;
            return Err(HandoffError {
                completed: vec![data_name],
                pending: vec![count_name],
                reason,
            });
        }
        tracing::debug!(file = %count_name, "Count file sent");

        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "Remote session did not close cleanly after transfer");
        }

        tracing::info!("Handoff completed");
        Ok(())
    }
}

async fn close_quietly(session: &mut dyn TransferSession) {
    if let Err(e) = session.close().await {
        tracing::debug!(error = %e, "Ignoring close failure after aborted transfer");
    }
}
