use std::sync::Arc;

use chatsync_core::sync::{
    ManualConnectivity, NetworkMonitor, SyncService, TcpProbe, UNEXPECTED_FAILURE,
};
use chatsync_core::SyncStatus;
use futures::StreamExt;

use crate::commands::common::{format_status, Context, SyncLock};
use crate::error::CliError;

pub async fn build_service(context: &Context, online: bool) -> Result<SyncService, CliError> {
    let local = context.open_local().await?;
    let remote = context.open_remote()?;
    let monitor = NetworkMonitor::new(Arc::new(ManualConnectivity::new(online)));
    Ok(SyncService::new(Arc::new(local), Arc::new(remote), monitor))
}

pub async fn run_sync(as_json: bool, context: &Context) -> Result<(), CliError> {
    let _lock = SyncLock::acquire(&context.db_path)?;
    let probe = &context.settings.probe;
    let online = TcpProbe::check(&probe.address, context.settings.probe_timeout()).await;
    tracing::debug!("Connectivity probe to {}: online={online}", probe.address);

    let service = build_service(context, online).await?;
    let last = report_pass(&service, as_json).await?;

    match last {
        SyncStatus::Success => Ok(()),
        SyncStatus::Error(detail) => Err(CliError::SyncFailed(detail)),
        _ => Err(CliError::SyncFailed(UNEXPECTED_FAILURE.to_string())),
    }
}

/// Print every status of one pass and return the last one
pub async fn report_pass(service: &SyncService, as_json: bool) -> Result<SyncStatus, CliError> {
    let mut statuses = service.sync_data();
    let mut last = SyncStatus::Error(UNEXPECTED_FAILURE.to_string());

    while let Some(status) = statuses.next().await {
        if as_json {
            println!("{}", serde_json::to_string(&status)?);
        } else if !matches!(status, SyncStatus::Error(_)) {
            println!("{}", format_status(&status));
        }
        last = status;
    }
    Ok(last)
}
