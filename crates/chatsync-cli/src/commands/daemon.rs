use std::sync::Arc;

use chatsync_core::sync::{NetworkMonitor, SyncManager, SyncService, TcpProbe, TokioJobScheduler};

use crate::commands::common::{Context, SyncLock};
use crate::error::CliError;

pub async fn run_daemon(context: &Context) -> Result<(), CliError> {
    let _lock = SyncLock::acquire(&context.db_path)?;
    let settings = &context.settings;
    let probe = TcpProbe::spawn(
        settings.probe.address.clone(),
        settings.probe_interval(),
        settings.probe_timeout(),
    );
    let monitor = NetworkMonitor::new(Arc::new(probe));

    let local = context.open_local().await?;
    let remote = context.open_remote()?;
    let service = SyncService::new(Arc::new(local), Arc::new(remote), monitor.clone());
    let scheduler = TokioJobScheduler::new(monitor.clone());
    let manager = SyncManager::new(Arc::new(service), monitor, Arc::new(scheduler), settings);

    manager.initialize();
    println!(
        "Syncing {} with {} (Ctrl-C to stop)",
        context.db_path.display(),
        settings.remote_base_url
    );

    let mut state = manager.state();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                tracing::info!("Sync state: {current:?}");
            }
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    manager.cancel_sync();
    println!("Stopped");
    Ok(())
}
