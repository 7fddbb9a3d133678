//! # Connectivity
//!
//! Reachability tracking consumed by the resolution controller. A
//! [`ConnectivityMonitor`] hands out subscriptions for change notifications and
//! answers snapshot queries. [`ConnectivityHub`] is the in-process
//! implementation, optionally fed by a [`ConnectivityProbe`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConnectivityError;

mod hub;
mod probe;

pub use hub::ConnectivityHub;
pub use probe::{ConnectivityProbe, ProbeConfig, ProbeHandle};

/// Callback invoked with the new state on every connectivity transition
pub type ConnectivityListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Token identifying one listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    /// Register a listener for connectivity transitions
    fn subscribe(&self, listener: ConnectivityListener) -> SubscriptionHandle;

    /// Remove a listener. Unknown handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Current connectivity snapshot
    async fn current_state(&self) -> Result<bool, ConnectivityError>;
}
