use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

use crate::cache::{CacheKey, CacheStore, HeaderResolver, LocalPath, is_remote_url};
use crate::connectivity::{
    ConnectivityHub, ConnectivityListener, ConnectivityMonitor, SubscriptionHandle,
};
use crate::controller::ResolutionController;
use crate::error::{CacheError, CacheResult, ConnectivityError};
use crate::state::ResolutionState;

/// Macro to initialize tracing for tests
///
/// Usage:
/// - `init_test_tracing!()` - uses DEBUG level (default)
/// - `init_test_tracing!(INFO)` - uses specified level
#[macro_export]
macro_rules! init_test_tracing {
    () => {
        init_test_tracing!(DEBUG);
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}

pub use crate::init_test_tracing;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

#[derive(Default, Clone)]
struct Script {
    lookup: Option<LocalPath>,
    populate: Option<LocalPath>,
    gate: Option<Arc<Notify>>,
}

/// Cache store whose answers are scripted per source URL.
///
/// Unscripted URLs miss on lookup and fail on populate.
#[derive(Default)]
pub struct ScriptedStore {
    scripts: Mutex<HashMap<String, Script>>,
    uncacheable: Mutex<HashSet<String>>,
    lookups: AtomicUsize,
    populates: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self, url: &str, edit: impl FnOnce(&mut Script)) {
        edit(self.scripts.lock().entry(url.to_string()).or_default());
    }

    /// Lookup finds the given path
    pub fn hit(&self, url: &str, path: &str) {
        self.script(url, |s| s.lookup = Some(LocalPath::from(path)));
    }

    /// Lookup misses, populate yields the given path
    pub fn populates(&self, url: &str, path: &str) {
        self.script(url, |s| {
            s.lookup = None;
            s.populate = Some(LocalPath::from(path));
        });
    }

    pub fn uncacheable(&self, url: &str) {
        self.uncacheable.lock().insert(url.to_string());
    }

    /// Hold every lookup of `url` until the returned gate is notified once per lookup
    pub fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        let handle = gate.clone();
        self.script(url, |s| s.gate = Some(handle));
        gate
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn populate_calls(&self) -> usize {
        self.populates.load(Ordering::SeqCst)
    }

    fn script_for(&self, key: &CacheKey) -> Script {
        self.scripts
            .lock()
            .get(&key.source_url)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CacheStore for ScriptedStore {
    fn is_cacheable(&self, url: Option<&str>) -> bool {
        is_remote_url(url) && url.is_some_and(|u| !self.uncacheable.lock().contains(u))
    }

    async fn lookup(&self, key: &CacheKey) -> CacheResult<LocalPath> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let gate = self.script_for(key).gate;
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.script_for(key).lookup.ok_or_else(|| CacheError::miss(key))
    }

    async fn populate(&self, key: &CacheKey, headers: HeaderResolver) -> CacheResult<LocalPath> {
        self.populates.fetch_add(1, Ordering::SeqCst);
        headers.resolve().await?;
        self.script_for(key)
            .populate
            .ok_or_else(|| CacheError::Populate(format!("no copy of {}", key.source_url)))
    }
}

/// Connectivity hub wrapper counting subscription traffic
pub struct CountingMonitor {
    pub hub: Arc<ConnectivityHub>,
    subscribes: AtomicUsize,
    unsubscribes: AtomicUsize,
    snapshots: AtomicUsize,
    snapshot_gate: Mutex<Option<Arc<Notify>>>,
}

impl CountingMonitor {
    pub fn new(initial: Option<bool>) -> Arc<Self> {
        let hub = Arc::new(ConnectivityHub::new());
        if let Some(connected) = initial {
            hub.set_connected(connected);
        }
        Arc::new(Self {
            hub,
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
            snapshots: AtomicUsize::new(0),
            snapshot_gate: Mutex::new(None),
        })
    }

    /// Hold snapshot answers until the returned gate is notified. The answer
    /// is read from the hub before waiting.
    pub fn gate_snapshot(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.snapshot_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityMonitor for CountingMonitor {
    fn subscribe(&self, listener: ConnectivityListener) -> SubscriptionHandle {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        self.hub.subscribe(listener)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.hub.unsubscribe(handle);
    }

    async fn current_state(&self) -> Result<bool, ConnectivityError> {
        let state = self.hub.current_state().await;
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        let gate = self.snapshot_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        state
    }
}

/// Wait until the published state satisfies `pred`
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ResolutionState>,
    pred: impl FnMut(&ResolutionState) -> bool,
) -> ResolutionState {
    tokio::time::timeout(WAIT_LIMIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for resolution state")
        .expect("controller state channel closed")
        .clone()
}

/// Wait until every task the controller spawned has finished
pub async fn settle(controller: &ResolutionController) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while controller.outstanding_tasks() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("controller tasks did not settle");
}
