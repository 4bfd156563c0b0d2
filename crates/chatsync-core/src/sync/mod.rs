//! Synchronization subsystem
//!
//! [`SyncService`] runs one pass between the local and remote stores.
//! [`SyncManager`] decides when passes run: on connectivity changes, on
//! demand, and periodically through a [`JobScheduler`] running [`SyncWorker`].

mod conflict;
mod manager;
mod network;
mod scheduler;
mod service;
mod worker;

pub use conflict::ConflictResolver;
pub use manager::{SyncManager, SYNC_WORK_NAME};
pub use network::{
    ConnectivityListener, ConnectivitySource, ManualConnectivity, NetworkMonitor, RegistrationId,
    Subscription, TcpProbe,
};
pub use scheduler::{
    Job, JobConstraints, JobScheduler, PeriodicJobRequest, RetryPolicy, TokioJobScheduler,
    WorkResult,
};
pub use service::{
    last_status, SyncService, SyncStatusStream, Synchronizer, NO_CONNECTIVITY, UNEXPECTED_FAILURE,
};
pub use worker::SyncWorker;
