//! One synchronization pass: fetch, resolve, apply, report progress.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{mpsc, Mutex};

use super::conflict::ConflictResolver;
use super::network::NetworkMonitor;
use crate::error::Result;
use crate::models::{LocalMessage, MessageId, SyncPatch, SyncStatus};
use crate::store::{LocalStore, RemoteStore};

/// Error detail reported when a pass is attempted without connectivity
pub const NO_CONNECTIVITY: &str = "no connectivity";

/// Error detail reported when a pass dies from an unexpected fault
pub const UNEXPECTED_FAILURE: &str = "unexpected sync failure";

/// Ordered, finite status sequence of one pass
pub type SyncStatusStream = BoxStream<'static, SyncStatus>;

/// Anything that can run sync passes. Implemented by [`SyncService`]; the
/// background worker depends only on this.
pub trait Synchronizer: Send + Sync {
    fn is_online(&self) -> bool;

    /// Start an independent pass and observe its statuses
    fn sync_data(&self) -> SyncStatusStream;
}

/// Counts of records applied by a successful pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PassSummary {
    pulled: usize,
    pushed: usize,
}

/// Orchestrates sync passes between the local and remote stores.
///
/// Cloning is cheap; clones share the stores and the pass lock, so at most
/// one pass touches the stores at any time.
#[derive(Clone)]
pub struct SyncService {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    monitor: NetworkMonitor,
    resolver: ConflictResolver,
    pass_lock: Arc<Mutex<()>>,
}

impl SyncService {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: NetworkMonitor,
    ) -> Self {
        Self {
            local,
            remote,
            monitor,
            resolver: ConflictResolver::new(),
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Start a pass on the tokio runtime and return its status stream.
    ///
    /// The pass runs to `Success` or `Error` even if the stream is dropped.
    /// A pass started while another one runs waits for it before emitting
    /// `Started`.
    pub fn sync_data(&self) -> SyncStatusStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = self.clone();

        tokio::spawn(async move {
            let pass_tx = tx.clone();
            let pass = tokio::spawn(async move { service.run_pass(&pass_tx).await });

            if let Err(error) = pass.await {
                tracing::error!("Sync pass aborted: {error}");
                let _ = tx.send(SyncStatus::Error(UNEXPECTED_FAILURE.to_string()));
            }
        });

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|status| (status, rx))
        })
        .boxed()
    }

    /// Run one pass and return its terminal status
    pub async fn run_to_completion(&self) -> SyncStatus {
        last_status(self.sync_data()).await
    }

    async fn run_pass(&self, tx: &mpsc::UnboundedSender<SyncStatus>) {
        let _pass = self.pass_lock.lock().await;
        let emit = |status: SyncStatus| {
            let _ = tx.send(status);
        };

        emit(SyncStatus::Started);

        if !self.is_online() {
            tracing::info!("Skipping sync pass: device is offline");
            emit(SyncStatus::Error(NO_CONNECTIVITY.to_string()));
            return;
        }

        match self.apply_pass(&emit).await {
            Ok(summary) => {
                tracing::info!(
                    "Sync pass succeeded: pulled={}, pushed={}",
                    summary.pulled,
                    summary.pushed
                );
                emit(SyncStatus::Success);
            }
            Err(error) => {
                tracing::error!("Sync pass failed: {error}");
                emit(SyncStatus::Error(error.to_string()));
            }
        }
    }

    async fn apply_pass(&self, emit: &impl Fn(SyncStatus)) -> Result<PassSummary> {
        emit(SyncStatus::InProgress(0));
        let unsynced = self.local.read_unsynced().await?;

        emit(SyncStatus::InProgress(20));
        let remote = self.remote.fetch_all().await?;

        emit(SyncStatus::InProgress(40));
        let mut patch = self.resolver.resolve(&unsynced, &remote);
        if !patch.pull.is_empty() {
            self.skip_applied_pulls(&mut patch).await?;
        }
        tracing::debug!(
            "Resolved sync patch: unsynced={}, remote={}, records={} (pull={}, push={})",
            unsynced.len(),
            remote.len(),
            patch.len(),
            patch.pull.len(),
            patch.push.len()
        );

        emit(SyncStatus::InProgress(60));
        for remote_message in &patch.pull {
            self.local
                .upsert(&LocalMessage::from_remote(remote_message.clone()))
                .await?;
        }

        emit(SyncStatus::InProgress(80));
        for message in &patch.push {
            self.remote.send(&message.to_remote()).await?;
            self.local.mark_synced(&message.id).await?;
        }

        Ok(PassSummary {
            pulled: patch.pull.len(),
            pushed: patch.push.len(),
        })
    }

    /// The resolver only sees unsynced local records, so remote records that
    /// were pulled by an earlier pass show up as pull candidates again. Drop
    /// the ones whose local copy is already at least as new.
    async fn skip_applied_pulls(&self, patch: &mut SyncPatch) -> Result<()> {
        let applied: HashMap<MessageId, i64> = self
            .local
            .read_all()
            .await?
            .into_iter()
            .filter(|message| message.is_synced)
            .map(|message| (message.id, message.timestamp))
            .collect();

        patch.pull.retain(|remote| {
            !applied
                .get(&remote.id)
                .is_some_and(|timestamp| *timestamp >= remote.timestamp)
        });
        Ok(())
    }
}

impl Synchronizer for SyncService {
    fn is_online(&self) -> bool {
        Self::is_online(self)
    }

    fn sync_data(&self) -> SyncStatusStream {
        Self::sync_data(self)
    }
}

/// Drain a status stream and return its last status.
///
/// A stream that ends without any status counts as an unexpected failure.
pub async fn last_status(statuses: SyncStatusStream) -> SyncStatus {
    statuses
        .fold(None, |_, status| async move { Some(status) })
        .await
        .unwrap_or_else(|| SyncStatus::Error(UNEXPECTED_FAILURE.to_string()))
}
