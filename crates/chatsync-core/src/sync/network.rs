//! Connectivity monitoring
//!
//! A [`ConnectivitySource`] is the platform seam that delivers raw
//! "network available / lost" notifications. [`NetworkMonitor`] turns it into
//! independent [`Subscription`] streams that start with the current value and
//! then yield one item per state transition.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Callback invoked by a source with the new connectivity value
pub type ConnectivityListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Handle for one listener registration on a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// Platform notification mechanism for internet-capable connectivity.
pub trait ConnectivitySource: Send + Sync {
    /// Current connectivity, read synchronously
    fn is_connected(&self) -> bool;

    /// Start delivering notifications to `listener`
    fn register(&self, listener: ConnectivityListener) -> RegistrationId;

    /// Stop delivering notifications for `id`. Unknown ids are ignored.
    fn unregister(&self, id: RegistrationId);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ManualState {
    connected: bool,
    next_id: u64,
    listeners: HashMap<RegistrationId, ConnectivityListener>,
}

/// Source whose state is set programmatically, e.g. from platform callbacks
/// forwarded by an embedding application.
pub struct ManualConnectivity {
    state: Mutex<ManualState>,
}

impl ManualConnectivity {
    pub fn new(connected: bool) -> Self {
        Self {
            state: Mutex::new(ManualState {
                connected,
                next_id: 0,
                listeners: HashMap::new(),
            }),
        }
    }

    /// Record a new connectivity value and notify every listener
    pub fn set_connected(&self, connected: bool) {
        let listeners: Vec<ConnectivityListener> = {
            let mut state = lock(&self.state);
            state.connected = connected;
            state.listeners.values().cloned().collect()
        };

        for listener in listeners {
            listener(connected);
        }
    }

    /// Number of live registrations
    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

impl ConnectivitySource for ManualConnectivity {
    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn register(&self, listener: ConnectivityListener) -> RegistrationId {
        let mut state = lock(&self.state);
        let id = RegistrationId(state.next_id);
        state.next_id += 1;
        state.listeners.insert(id, listener);
        id
    }

    fn unregister(&self, id: RegistrationId) {
        lock(&self.state).listeners.remove(&id);
    }
}

/// Source that periodically opens a TCP connection to a well-known endpoint.
///
/// Reports offline until the first probe succeeds. The probe task stops when
/// the source is dropped.
pub struct TcpProbe {
    inner: Arc<ManualConnectivity>,
    task: JoinHandle<()>,
}

impl TcpProbe {
    /// Start probing `address` (`host:port`) every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(address: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        let address = address.into();
        let inner = Arc::new(ManualConnectivity::new(false));
        let state = Arc::clone(&inner);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe(&address, timeout).await;
                if reachable != state.is_connected() {
                    tracing::info!(
                        "Connectivity changed: {} is {}",
                        address,
                        if reachable { "reachable" } else { "unreachable" }
                    );
                }
                state.set_connected(reachable);
            }
        });

        Self { inner, task }
    }

    /// Probe `address` once
    pub async fn check(address: &str, timeout: Duration) -> bool {
        probe(address, timeout).await
    }
}

async fn probe(address: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(address)).await,
        Ok(Ok(_))
    )
}

impl Drop for TcpProbe {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConnectivitySource for TcpProbe {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn register(&self, listener: ConnectivityListener) -> RegistrationId {
        self.inner.register(listener)
    }

    fn unregister(&self, id: RegistrationId) {
        self.inner.unregister(id);
    }
}

/// Live "device is online" signal.
#[derive(Clone)]
pub struct NetworkMonitor {
    source: Arc<dyn ConnectivitySource>,
}

impl NetworkMonitor {
    pub fn new(source: Arc<dyn ConnectivitySource>) -> Self {
        Self { source }
    }

    /// Current connectivity snapshot
    pub fn is_online(&self) -> bool {
        self.source.is_connected()
    }

    /// Subscribe to connectivity changes.
    ///
    /// The stream yields the current value first, then one value per
    /// transition. It never ends and never errors; dropping it releases the
    /// registration on the source.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.source.register(Arc::new(move |online| {
            // Receiver gone means the subscription is being dropped
            let _ = tx.send(online);
        }));
        let initial = self.source.is_connected();

        Subscription {
            source: Arc::clone(&self.source),
            id,
            rx,
            initial: Some(initial),
            last: None,
        }
    }
}

/// One independent connectivity subscription. See [`NetworkMonitor::subscribe`].
pub struct Subscription {
    source: Arc<dyn ConnectivitySource>,
    id: RegistrationId,
    rx: mpsc::UnboundedReceiver<bool>,
    initial: Option<bool>,
    last: Option<bool>,
}

impl Stream for Subscription {
    type Item = bool;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<bool>> {
        let this = &mut *self;

        if let Some(initial) = this.initial.take() {
            this.last = Some(initial);
            return Poll::Ready(Some(initial));
        }

        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(online)) if this.last == Some(online) => {}
                Poll::Ready(Some(online)) => {
                    this.last = Some(online);
                    return Poll::Ready(Some(online));
                }
                // The source dropped our listener; the signal holds its last value.
                Poll::Ready(None) | Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.source.unregister(self.id);
        tracing::debug!("Released connectivity registration {:?}", self.id);
    }
}
