//! Background job that drives one sync pass

use std::sync::Arc;

use async_trait::async_trait;

use super::scheduler::{Job, WorkResult};
use super::service::{last_status, Synchronizer};
use crate::models::SyncStatus;

/// Adapts a [`Synchronizer`] to the scheduler's [`Job`] seam.
///
/// Backoff between retries belongs to the scheduler.
pub struct SyncWorker {
    synchronizer: Arc<dyn Synchronizer>,
}

impl SyncWorker {
    pub fn new(synchronizer: Arc<dyn Synchronizer>) -> Self {
        Self { synchronizer }
    }
}

#[async_trait]
impl Job for SyncWorker {
    async fn execute(&self) -> WorkResult {
        if !self.synchronizer.is_online() {
            tracing::debug!("Background sync deferred: offline");
            return WorkResult::Retry;
        }

        match last_status(self.synchronizer.sync_data()).await {
            SyncStatus::Success => WorkResult::Success,
            SyncStatus::Error(detail) => {
                tracing::warn!("Background sync failed, will retry: {detail}");
                WorkResult::Retry
            }
            status => {
                tracing::warn!("Background sync ended without a result (last status: {status})");
                WorkResult::Retry
            }
        }
    }
}
