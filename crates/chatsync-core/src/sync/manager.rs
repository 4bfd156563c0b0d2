//! Sync manager: network-reactive triggering, periodic background sync and
//! on-demand passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::network::{NetworkMonitor, Subscription};
use super::scheduler::{JobScheduler, PeriodicJobRequest, RetryPolicy};
use super::service::{Synchronizer, UNEXPECTED_FAILURE};
use super::worker::SyncWorker;
use crate::config::SyncSettings;
use crate::models::SyncStatus;
use crate::state::SyncState;

/// Name of the periodic background sync job
pub const SYNC_WORK_NAME: &str = "sync_work";

/// Owns every sync trigger of the application.
///
/// Cheap to clone. All clones share the same reactive task and in-flight
/// guard. Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    service: Arc<dyn Synchronizer>,
    monitor: NetworkMonitor,
    scheduler: Arc<dyn JobScheduler>,
    interval: Duration,
    retry: RetryPolicy,
    state: watch::Sender<SyncState>,
    in_flight: AtomicBool,
    initialized: AtomicBool,
    reactive: Mutex<Option<JoinHandle<()>>>,
}

impl SyncManager {
    pub fn new(
        service: Arc<dyn Synchronizer>,
        monitor: NetworkMonitor,
        scheduler: Arc<dyn JobScheduler>,
        settings: &SyncSettings,
    ) -> Self {
        let initial = if monitor.is_online() {
            SyncState::Idle
        } else {
            SyncState::Offline
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(ManagerInner {
                service,
                monitor,
                scheduler,
                interval: settings.sync_interval(),
                retry: settings.retry_policy(),
                state,
                in_flight: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                reactive: Mutex::new(None),
            }),
        }
    }

    /// Start network-reactive sync and register the periodic background job.
    ///
    /// Calling this more than once has no further effect.
    pub fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            tracing::debug!("Sync manager already initialized");
            return;
        }

        let reactive = spawn_reactive(Arc::downgrade(&self.inner), self.inner.monitor.subscribe());
        *self
            .inner
            .reactive
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reactive);

        let request = PeriodicJobRequest::new(SYNC_WORK_NAME, self.inner.interval)
            .requires_network()
            .with_retry(self.inner.retry);
        let worker = SyncWorker::new(Arc::clone(&self.inner.service));
        self.inner.scheduler.register_periodic(request, Arc::new(worker));

        tracing::info!(
            "Sync manager initialized (background interval {:?})",
            self.inner.interval
        );
    }

    /// Start a pass now if online and no manager-triggered pass is running.
    ///
    /// Returns whether a pass was started. Requests are never queued.
    pub fn sync_now(&self) -> bool {
        tracing::debug!("Manual sync requested");
        self.inner.start_pass()
    }

    /// Cancel the periodic background job. A pass already running is not
    /// interrupted.
    pub fn cancel_sync(&self) -> bool {
        let cancelled = self.inner.scheduler.cancel(SYNC_WORK_NAME);
        if cancelled {
            tracing::info!("Background sync cancelled");
        }
        cancelled
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Watch the coarse sync state
    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }
}

fn spawn_reactive(inner: Weak<ManagerInner>, mut online: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(is_online) = online.next().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };

            if is_online {
                tracing::info!("Network available, starting sync");
                inner.start_pass();
            } else {
                tracing::info!("Network lost");
                inner.state.send_replace(SyncState::Offline);
            }
        }
    })
}

impl ManagerInner {
    fn start_pass(self: &Arc<Self>) -> bool {
        if !self.service.is_online() {
            tracing::debug!("Not starting sync: offline");
            self.state.send_replace(SyncState::Offline);
            return false;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Not starting sync: a pass is already running");
            return false;
        }

        self.state.send_replace(SyncState::Syncing);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let in_flight = InFlight(&inner.in_flight);

            let mut statuses = inner.service.sync_data();
            let mut last = None;
            while let Some(status) = statuses.next().await {
                match &status {
                    SyncStatus::Error(detail) => tracing::warn!("Sync failed: {detail}"),
                    status => tracing::debug!("Sync status: {status}"),
                }
                last = Some(status);
            }

            let last = last.unwrap_or_else(|| SyncStatus::Error(UNEXPECTED_FAILURE.to_string()));
            drop(in_flight);
            let state = if inner.service.is_online() {
                SyncState::after(&last).unwrap_or(SyncState::Error)
            } else {
                SyncState::Offline
            };
            inner.state.send_replace(state);
        });
        true
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        if let Some(task) = self
            .reactive
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

/// Clears the in-flight flag when a manager-driven pass ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::network::ManualConnectivity;
    use crate::sync::scheduler::Job;
    use crate::sync::service::SyncStatusStream;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// Synchronizer whose passes finish only when the gate has permits
    struct GatedSynchronizer {
        monitor: NetworkMonitor,
        gate: Arc<Semaphore>,
        outcome: SyncStatus,
        passes: AtomicUsize,
    }

    impl GatedSynchronizer {
        fn passes(&self) -> usize {
            self.passes.load(Ordering::SeqCst)
        }
    }

    impl Synchronizer for GatedSynchronizer {
        fn is_online(&self) -> bool {
            self.monitor.is_online()
        }

        fn sync_data(&self) -> SyncStatusStream {
            self.passes.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&self.gate);
            let outcome = self.outcome.clone();
            stream::iter([SyncStatus::Started])
                .chain(stream::once(async move {
                    let _permit = gate.acquire().await;
                    outcome
                }))
                .boxed()
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        registered: Mutex<Vec<PeriodicJobRequest>>,
        cancelled: Mutex<Vec<String>>,
    }

    impl JobScheduler for RecordingScheduler {
        fn register_periodic(&self, request: PeriodicJobRequest, _job: Arc<dyn Job>) {
            self.registered.lock().unwrap().push(request);
        }

        fn cancel(&self, name: &str) -> bool {
            self.cancelled.lock().unwrap().push(name.to_string());
            self.registered
                .lock()
                .unwrap()
                .iter()
                .any(|request| request.name == name)
        }

        fn is_registered(&self, name: &str) -> bool {
            self.registered
                .lock()
                .unwrap()
                .iter()
                .any(|request| request.name == name)
        }
    }

    struct Fixture {
        connectivity: Arc<ManualConnectivity>,
        sync: Arc<GatedSynchronizer>,
        scheduler: Arc<RecordingScheduler>,
        manager: SyncManager,
    }

    fn fixture(online: bool, permits: usize, outcome: SyncStatus) -> Fixture {
        let connectivity = Arc::new(ManualConnectivity::new(online));
        let monitor = NetworkMonitor::new(connectivity.clone());
        let sync = Arc::new(GatedSynchronizer {
            monitor: monitor.clone(),
            gate: Arc::new(Semaphore::new(permits)),
            outcome,
            passes: AtomicUsize::new(0),
        });
        let scheduler = Arc::new(RecordingScheduler::default());
        let manager = SyncManager::new(
            sync.clone(),
            monitor,
            scheduler.clone(),
            &SyncSettings::default(),
        );
        Fixture {
            connectivity,
            sync,
            scheduler,
            manager,
        }
    }

    async fn wait_for_state(manager: &SyncManager, expected: SyncState) {
        let mut state = manager.state();
        tokio::time::timeout(Duration::from_secs(1), state.wait_for(|s| *s == expected))
            .await
            .expect("state not reached in time")
            .unwrap();
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_initialize_registers_periodic_job_once() {
        let f = fixture(false, 10, SyncStatus::Success);

        f.manager.initialize();
        f.manager.initialize();

        let registered = f.scheduler.registered.lock().unwrap().clone();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].name, SYNC_WORK_NAME);
        assert_eq!(registered[0].interval, Duration::from_secs(3600));
        assert!(registered[0].constraints.requires_network);
        assert_eq!(registered[0].retry, SyncSettings::default().retry_policy());
    }

    #[tokio::test]
    async fn test_online_at_start_triggers_one_pass() {
        let f = fixture(true, 10, SyncStatus::Success);
        assert_eq!(*f.manager.state().borrow(), SyncState::Idle);

        f.manager.initialize();

        wait_for_state(&f.manager, SyncState::Synced).await;
        assert_eq!(f.sync.passes(), 1);
    }

    #[tokio::test]
    async fn test_each_transition_to_online_triggers_a_pass() {
        let f = fixture(false, 10, SyncStatus::Success);
        assert_eq!(*f.manager.state().borrow(), SyncState::Offline);

        f.manager.initialize();
        settle().await;
        assert_eq!(f.sync.passes(), 0);

        f.connectivity.set_connected(true);
        wait_for_state(&f.manager, SyncState::Synced).await;
        assert_eq!(f.sync.passes(), 1);

        f.connectivity.set_connected(false);
        wait_for_state(&f.manager, SyncState::Offline).await;
        assert_eq!(f.sync.passes(), 1);

        f.connectivity.set_connected(true);
        wait_for_state(&f.manager, SyncState::Synced).await;
        assert_eq!(f.sync.passes(), 2);
    }

    #[tokio::test]
    async fn test_sync_now_is_refused_while_offline() {
        let f = fixture(false, 10, SyncStatus::Success);

        assert!(!f.manager.sync_now());
        settle().await;
        assert_eq!(f.sync.passes(), 0);
        assert_eq!(*f.manager.state().borrow(), SyncState::Offline);
    }

    #[tokio::test]
    async fn test_sync_now_does_not_overlap_or_queue() {
        let f = fixture(true, 0, SyncStatus::Success);

        assert!(f.manager.sync_now());
        assert!(f.manager.is_syncing());
        assert!(!f.manager.sync_now());
        assert!(!f.manager.sync_now());
        assert_eq!(*f.manager.state().borrow(), SyncState::Syncing);

        f.sync.gate.add_permits(1);
        wait_for_state(&f.manager, SyncState::Synced).await;
        assert_eq!(f.sync.passes(), 1);
        assert!(!f.manager.is_syncing());

        assert!(f.manager.sync_now());
        wait_for_state(&f.manager, SyncState::Synced).await;
        assert_eq!(f.sync.passes(), 2);
    }

    #[tokio::test]
    async fn test_connectivity_lost_mid_pass_leaves_offline_state() {
        let f = fixture(true, 0, SyncStatus::Success);

        f.manager.initialize();
        wait_for_state(&f.manager, SyncState::Syncing).await;

        f.connectivity.set_connected(false);
        wait_for_state(&f.manager, SyncState::Offline).await;

        f.sync.gate.add_permits(1);
        settle().await;
        assert!(!f.manager.is_syncing());
        assert_eq!(f.sync.passes(), 1);
        assert_eq!(*f.manager.state().borrow(), SyncState::Offline);
    }

    #[tokio::test]
    async fn test_failed_pass_publishes_error_state() {
        let f = fixture(true, 10, SyncStatus::Error("fetch rejected".to_string()));

        assert!(f.manager.sync_now());

        wait_for_state(&f.manager, SyncState::Error).await;
        assert!(!f.manager.is_syncing());
    }

    #[tokio::test]
    async fn test_cancel_sync_cancels_periodic_job_by_name() {
        let f = fixture(true, 10, SyncStatus::Success);
        assert!(!f.manager.cancel_sync());

        f.manager.initialize();
        assert!(f.manager.cancel_sync());
        assert_eq!(
            f.scheduler.cancelled.lock().unwrap().as_slice(),
            [SYNC_WORK_NAME.to_string(), SYNC_WORK_NAME.to_string()]
        );
    }
}
