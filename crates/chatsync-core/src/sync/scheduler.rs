//! Periodic background jobs with network constraints and retry backoff

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::network::NetworkMonitor;

/// Outcome of one job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    Success,
    /// Run again after a backoff delay
    Retry,
}

/// Unit of background work
#[async_trait]
pub trait Job: Send + Sync {
    async fn execute(&self) -> WorkResult;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobConstraints {
    /// Only execute while the device is online
    pub requires_network: bool,
}

/// Exponential backoff applied when a job asks to be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Executions per period, including the first one
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(15 * 60),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicJobRequest {
    pub name: String,
    pub interval: Duration,
    pub constraints: JobConstraints,
    pub retry: RetryPolicy,
}

impl PeriodicJobRequest {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            constraints: JobConstraints::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn requires_network(mut self) -> Self {
        self.constraints.requires_network = true;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Host scheduler for named periodic jobs
pub trait JobScheduler: Send + Sync {
    /// Register `job` under `request.name`, replacing any job with that name
    fn register_periodic(&self, request: PeriodicJobRequest, job: Arc<dyn Job>);

    /// Cancel the named job. Returns whether a job was registered.
    fn cancel(&self, name: &str) -> bool;

    fn is_registered(&self, name: &str) -> bool;
}

/// Scheduler running each job on its own tokio task.
///
/// Jobs are registered from within a tokio runtime. Dropping the scheduler
/// aborts every job task.
pub struct TokioJobScheduler {
    monitor: NetworkMonitor,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioJobScheduler {
    pub fn new(monitor: NetworkMonitor) -> Self {
        Self {
            monitor,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobScheduler for TokioJobScheduler {
    fn register_periodic(&self, request: PeriodicJobRequest, job: Arc<dyn Job>) {
        let name = request.name.clone();
        tracing::info!(
            "Scheduling periodic job '{}' every {:?} (requires_network={})",
            name,
            request.interval,
            request.constraints.requires_network
        );

        let task = tokio::spawn(run_periodic(request, job, self.monitor.clone()));
        if let Some(previous) = self.jobs().insert(name.clone(), task) {
            tracing::debug!("Replaced existing job '{name}'");
            previous.abort();
        }
    }

    fn cancel(&self, name: &str) -> bool {
        match self.jobs().remove(name) {
            Some(task) => {
                task.abort();
                tracing::info!("Cancelled periodic job '{name}'");
                true
            }
            None => false,
        }
    }

    fn is_registered(&self, name: &str) -> bool {
        self.jobs()
            .get(name)
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TokioJobScheduler {
    fn drop(&mut self) {
        for (_, task) in self.jobs().drain() {
            task.abort();
        }
    }
}

async fn run_periodic(request: PeriodicJobRequest, job: Arc<dyn Job>, monitor: NetworkMonitor) {
    let mut ticker = tokio::time::interval_at(Instant::now() + request.interval, request.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        run_with_retry(&request, job.as_ref(), &monitor).await;
    }
}

async fn run_with_retry(request: &PeriodicJobRequest, job: &dyn Job, monitor: &NetworkMonitor) {
    let mut attempt = 0;
    loop {
        if request.constraints.requires_network {
            wait_for_network(monitor).await;
        }

        match job.execute().await {
            WorkResult::Success => {
                tracing::debug!("Job '{}' succeeded", request.name);
                return;
            }
            WorkResult::Retry if attempt + 1 >= request.retry.max_attempts => {
                tracing::warn!(
                    "Job '{}' still failing after {} attempts, waiting for next period",
                    request.name,
                    attempt + 1
                );
                return;
            }
            WorkResult::Retry => {
                let delay = request.retry.delay_for(attempt);
                tracing::debug!("Job '{}' asked to retry in {:?}", request.name, delay);
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn wait_for_network(monitor: &NetworkMonitor) {
    let mut online = monitor.subscribe();
    while let Some(is_online) = online.next().await {
        if is_online {
            return;
        }
    }
}
