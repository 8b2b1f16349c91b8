//! One transfer cycle: stage, send, release.

use chrono::{DateTime, Local};
use tokio::sync::Mutex;

use super::error::DispatchError;
use super::handoff::RemoteHandoff;
use super::staging::{StagedFilePair, TransferStaging};
use crate::config::Config;
use crate::db::transfer_repo::{self, TransferOutcome};
use crate::db::{request_repo, Database};
use crate::record::ScanRequestRecord;

/// Runs transfer cycles against one staging directory.
///
/// Cycles are serialized by an in-process lock. Several processes sharing
/// one staging directory are not coordinated beyond the emptiness check in
/// [`TransferStaging::stage`], so a deployment runs a single worker per
/// staging directory.
pub struct Dispatcher {
    staging: TransferStaging,
    handoff: RemoteHandoff,
    db: Database,
    cycle: Mutex<()>,
}

impl Dispatcher {
    pub fn new(staging: TransferStaging, handoff: RemoteHandoff, db: Database) -> Self {
        Self {
            staging,
            handoff,
            db,
            cycle: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, db: Database) -> Self {
        Self::new(
            TransferStaging::new(config.staging.resolved_directory()),
            RemoteHandoff::from_config(&config.remote),
            db,
        )
    }

    pub fn staging(&self) -> &TransferStaging {
        &self.staging
    }

    /// Ships the stored export line of `record`. Every attempt, successful
    /// or not, is appended to the transfer log.
    #[tracing::instrument(skip_all, fields(request_id = record.id()))]
    pub async fn dispatch(
        &self,
        record: &ScanRequestRecord,
    ) -> Result<StagedFilePair, DispatchError> {
        let _guard = self.cycle.lock().await;
        let attempted_at = Local::now();

        let result = self
            .run_cycle(record.created_at(), record.export_line())
            .await;

        let (outcome, stem, detail) = match &result {
            Ok(pair) => (TransferOutcome::Sent, Some(pair.stem().to_string()), None),
            Err(DispatchError::Handoff { stem, source }) => (
                TransferOutcome::Failed,
                Some(stem.clone()),
                Some(source.to_string()),
            ),
            // The remote side has the complete pair; resending would duplicate it.
            Err(DispatchError::Release { stem, source }) => (
                TransferOutcome::Sent,
                Some(stem.clone()),
                Some(source.to_string()),
            ),
            Err(e) => (TransferOutcome::Failed, None, Some(e.to_string())),
        };

        if let Err(e) = transfer_repo::insert_attempt(
            &self.db,
            record.id(),
            attempted_at,
            stem.as_deref(),
            outcome,
            detail.as_deref(),
        ) {
            tracing::warn!(error = %e, "Failed to record transfer attempt");
        }

        match &result {
            Ok(pair) => tracing::info!(stem = %pair.stem(), "Scan request transferred"),
            Err(e) => tracing::error!(error = %e, "Scan request transfer failed"),
        }

        result
    }

    /// Re-sends an existing record, using its original creation timestamp
    /// for the file names. The record itself is not modified.
    pub async fn resend(&self, record_id: i64) -> Result<StagedFilePair, DispatchError> {
        let record = request_repo::find_by_id(&self.db, record_id)?
            .ok_or(DispatchError::RecordNotFound(record_id))?;
        tracing::info!(request_id = record_id, "Resending scan request");
        self.dispatch(&record).await
    }

    async fn run_cycle(
        &self,
        timestamp: DateTime<Local>,
        payload: &str,
    ) -> Result<StagedFilePair, DispatchError> {
        let pair = self.staging.stage(timestamp, payload)?;

        self.handoff
            .send(pair.data_file(), pair.count_file())
            .await
            .map_err(|source| DispatchError::Handoff {
                stem: pair.stem().to_string(),
                source,
            })?;

        self.staging
            .release(&pair)
            .map_err(|source| DispatchError::Release {
                stem: pair.stem().to_string(),
                source,
            })?;
        Ok(pair)
    }
}
