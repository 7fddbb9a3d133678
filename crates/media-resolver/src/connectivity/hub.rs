use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{ConnectivityListener, ConnectivityMonitor, SubscriptionHandle};
use crate::error::ConnectivityError;

static GLOBAL_HUB: LazyLock<Arc<ConnectivityHub>> =
    LazyLock::new(|| Arc::new(ConnectivityHub::new()));

/// In-process connectivity monitor.
///
/// The hub starts uninitialized: snapshot queries fail until the first
/// [`set_connected`](Self::set_connected) call, so an absent state is never
/// mistaken for a real one. Listeners only hear about actual transitions.
#[derive(Default)]
pub struct ConnectivityHub {
    // Held across a report and its notifications so listeners see reports in
    // the order the state took them
    reporting: Mutex<()>,
    state: Mutex<Option<bool>>,
    listeners: Mutex<HashMap<u64, ConnectivityListener>>,
    next_id: AtomicU64,
}

impl ConnectivityHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide hub shared by every controller that does not bring its own
    pub fn global() -> Arc<ConnectivityHub> {
        Arc::clone(&GLOBAL_HUB)
    }

    /// Last reported state, `None` before the first report
    pub fn snapshot(&self) -> Option<bool> {
        *self.state.lock()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Report the current connectivity. Listeners are notified when the value
    /// changes; the first report initializes the hub without notifying.
    ///
    /// Listeners must not report from within their callback.
    pub fn set_connected(&self, connected: bool) {
        let _reporting = self.reporting.lock();
        let previous = self.state.lock().replace(connected);
        match previous {
            Some(prev) if prev == connected => return,
            None => {
                debug!(connected, "Connectivity initialized");
                return;
            }
            Some(_) => debug!(connected, "Connectivity changed"),
        }

        // Notify outside the listener lock so listeners may unsubscribe from the callback
        let listeners: Vec<ConnectivityListener> =
            self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(connected);
        }
    }
}

#[async_trait]
impl ConnectivityMonitor for ConnectivityHub {
    fn subscribe(&self, listener: ConnectivityListener) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener);
        SubscriptionHandle::new(id)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if self.listeners.lock().remove(&handle.id()).is_none() {
            debug!(%handle, "Unsubscribe for unknown handle ignored");
        }
    }

    async fn current_state(&self) -> Result<bool, ConnectivityError> {
        self.snapshot().ok_or(ConnectivityError::Uninitialized)
    }
}
