use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use super::bundle::{DataType, StudyBundle};
use super::document::{export_document, import_document, ImportReport, SyncDocument, SyncError};
use super::history::{SyncHistory, SyncOutcome, SyncStatus};
use super::storage::{
    self, KeyValueStore, StorageError, BUNDLE_KEY, DEVICE_ID_KEY, HISTORY_KEY, LAST_SYNC_KEY,
};
use super::transport::{SyncTransport, TransportError};
use crate::core::time::format_offset;

#[derive(Debug, Error)]
pub(crate) enum SyncRunError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Document(#[from] SyncError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SyncRun {
    Finished(SyncOutcome),
    /// Another round was already in flight.
    Skipped,
}

struct RoundSummary {
    pulled: usize,
    pushed: usize,
    errors: Vec<String>,
}

/// Releases the in-flight flag when a round ends, including on early return.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) struct SyncManager {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn SyncTransport>,
    types: Vec<DataType>,
    in_flight: AtomicBool,
}

impl SyncManager {
    pub(crate) fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn SyncTransport>) -> Self {
        Self { store, transport, types: DataType::ALL.to_vec(), in_flight: AtomicBool::new(false) }
    }

    pub(crate) fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether the server currently answers.
    pub(crate) async fn probe(&self) -> bool {
        match self.transport.probe().await {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "Sync server probe failed");
                false
            }
        }
    }

    /// Stored device id, generated and persisted on first use.
    pub(crate) async fn device_id(&self) -> Result<String, StorageError> {
        if let Some(existing) = storage::load::<String>(self.store.as_ref(), DEVICE_ID_KEY).await? {
            if !existing.is_empty() {
                return Ok(existing);
            }
        }

        let generated = format!("device-{}", uuid::Uuid::new_v4());
        storage::save(self.store.as_ref(), DEVICE_ID_KEY, &generated).await?;
        tracing::info!(device_id = %generated, "Generated sync device id");
        Ok(generated)
    }

    pub(crate) async fn bundle(&self) -> Result<StudyBundle, StorageError> {
        Ok(storage::load(self.store.as_ref(), BUNDLE_KEY).await?.unwrap_or_default())
    }

    pub(crate) async fn history(&self) -> Result<SyncHistory, StorageError> {
        Ok(storage::load(self.store.as_ref(), HISTORY_KEY).await?.unwrap_or_default())
    }

    pub(crate) async fn last_sync_time(&self) -> Result<Option<String>, StorageError> {
        storage::load(self.store.as_ref(), LAST_SYNC_KEY).await
    }

    /// Exports the local bundle, e.g. for a manual transfer to another device.
    pub(crate) async fn export_local(&self) -> Result<SyncDocument, SyncRunError> {
        let device_id = self.device_id().await?;
        let bundle = self.bundle().await?;
        Ok(export_document(&bundle, &device_id, &self.types, OffsetDateTime::now_utc())?)
    }

    /// Merges a document into the local bundle. Nothing is stored when the
    /// document is invalid.
    pub(crate) async fn import_local(
        &self,
        document: &SyncDocument,
    ) -> Result<ImportReport, SyncRunError> {
        let mut bundle = self.bundle().await?;
        let report = import_document(&mut bundle, document)?;
        storage::save(self.store.as_ref(), BUNDLE_KEY, &bundle).await?;
        Ok(report)
    }

    /// One pull/merge/push round. Returns [`SyncRun::Skipped`] when a round
    /// is already running; failures end up in the stored history.
    pub(crate) async fn sync_now(&self) -> SyncRun {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Sync already in flight; dropping request");
            return SyncRun::Skipped;
        };

        let now = OffsetDateTime::now_utc();
        let outcome = match self.run_round(now).await {
            Ok(summary) => {
                let status = if summary.errors.is_empty() {
                    SyncStatus::Success
                } else {
                    SyncStatus::Partial
                };
                tracing::info!(
                    pulled = summary.pulled,
                    pushed = summary.pushed,
                    errors = summary.errors.len(),
                    "Sync round finished"
                );
                SyncOutcome {
                    time: format_offset(now),
                    status,
                    pulled: summary.pulled,
                    pushed: summary.pushed,
                    message: (!summary.errors.is_empty()).then(|| summary.errors.join("; ")),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Sync round failed");
                SyncOutcome {
                    time: format_offset(now),
                    status: SyncStatus::Failed,
                    pulled: 0,
                    pushed: 0,
                    message: Some(err.to_string()),
                }
            }
        };

        metrics::counter!("sync_runs_total", "status" => status_label(outcome.status))
            .increment(1);

        if let Err(err) = self.record(outcome.clone()).await {
            tracing::error!(error = %err, "Failed to store sync history");
        }

        SyncRun::Finished(outcome)
    }

    async fn run_round(&self, now: OffsetDateTime) -> Result<RoundSummary, SyncRunError> {
        let device_id = self.device_id().await?;
        let mut bundle = self.bundle().await?;

        let remote = self.transport.pull(&self.types).await?;
        let pulled = import_document(&mut bundle, &remote)?;
        storage::save(self.store.as_ref(), BUNDLE_KEY, &bundle).await?;

        let outgoing = export_document(&bundle, &device_id, &self.types, now)?;
        let pushed = self.transport.push(&outgoing).await?;

        storage::save(self.store.as_ref(), LAST_SYNC_KEY, &format_offset(now)).await?;

        let errors = pulled
            .errors
            .iter()
            .map(|failure| format!("local {}: {}", failure.data_type.as_str(), failure.message))
            .chain(pushed.errors.iter().map(|failure| {
                format!("server {}: {}", failure.data_type.as_str(), failure.message)
            }))
            .collect();

        Ok(RoundSummary { pulled: pulled.added(), pushed: pushed.added(), errors })
    }

    async fn record(&self, outcome: SyncOutcome) -> Result<(), StorageError> {
        let mut history = self.history().await?;
        history.push(outcome);
        storage::save(self.store.as_ref(), HISTORY_KEY, &history).await
    }
}

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Success => "success",
        SyncStatus::Partial => "partial",
        SyncStatus::Failed => "failed",
    }
}
