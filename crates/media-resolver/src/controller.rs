//! # Resolution Controller
//!
//! Owns the mapping from the consumer's current [`ResourceIdentity`] to the
//! published [`ResolutionState`]. For every accepted identity the controller
//! checks cacheability, publishes the pending state synchronously, then looks
//! the resource up in the cache store and falls back to populating it.
//!
//! Every write to the published state, the current identity, the lifecycle and
//! the generation counter happens under a single mutex. Asynchronous work
//! captures the generation it was started for and is discarded when the
//! generation has moved on, either because a newer identity superseded it or
//! because the controller was stopped.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore, LocalPath};
use crate::config::ResolverConfig;
use crate::connectivity::{ConnectivityListener, ConnectivityMonitor, SubscriptionHandle};
use crate::error::{CacheError, ResolverError};
use crate::identity::ResourceIdentity;
use crate::presenter::{Presentation, Presenter, present};
use crate::state::{ResolutionPhase, ResolutionState};

/// Counter identifying one resolution attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Active,
    Stopped,
}

enum Outcome {
    Hit(LocalPath),
    Populated(LocalPath),
    Failed(CacheError),
}

struct Core {
    lifecycle: Lifecycle,
    identity: Option<ResourceIdentity>,
    generation: Generation,
    state: watch::Sender<ResolutionState>,
    subscription: Option<SubscriptionHandle>,
    in_flight: Option<JoinHandle<()>>,
    // Bumped by every listener callback, lets a late snapshot see it is stale
    connectivity_events: u64,
}

impl Core {
    fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    fn publish(&self, update: impl FnOnce(&mut ResolutionState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            update(state);
            *state != before
        });
    }
}

struct Shared {
    store: Arc<dyn CacheStore>,
    monitor: Arc<dyn ConnectivityMonitor>,
    config: ResolverConfig,
    runtime: Handle,
    tasks: TaskTracker,
    core: Mutex<Core>,
}

/// Drives resolution of one consumer's media resource.
///
/// Dropping the controller stops it.
pub struct ResolutionController {
    shared: Arc<Shared>,
}

impl ResolutionController {
    /// Create an idle controller bound to the current tokio runtime
    pub fn new(
        store: Arc<dyn CacheStore>,
        monitor: Arc<dyn ConnectivityMonitor>,
        config: ResolverConfig,
    ) -> Result<Self, ResolverError> {
        let runtime = Handle::try_current().map_err(|_| ResolverError::NoRuntime)?;
        let (state, _) = watch::channel(ResolutionState::default());

        Ok(Self {
            shared: Arc::new(Shared {
                store,
                monitor,
                config,
                runtime,
                tasks: TaskTracker::new(),
                core: Mutex::new(Core {
                    lifecycle: Lifecycle::Idle,
                    identity: None,
                    generation: Generation::default(),
                    state,
                    subscription: None,
                    in_flight: None,
                    connectivity_events: 0,
                }),
            }),
        })
    }

    /// Activate the controller and resolve the initial identity
    pub fn start(&self, identity: ResourceIdentity) -> Result<(), ResolverError> {
        {
            let mut core = self.shared.core.lock();
            match core.lifecycle {
                Lifecycle::Active => return Err(ResolverError::AlreadyStarted),
                Lifecycle::Stopped => return Err(ResolverError::Stopped),
                Lifecycle::Idle => core.lifecycle = Lifecycle::Active,
            }
            info!(url = ?identity.url(), "Resolution controller started");
            // Resolved in the same critical section as activation, so an
            // identity change arriving later always supersedes it
            self.shared.resolve(&mut core, identity);
        }

        // Subscribe outside the core lock, a monitor may call back synchronously
        let handle = self.shared.monitor.subscribe(self.connectivity_listener());
        let mut core = self.shared.core.lock();
        if !core.is_active() {
            drop(core);
            self.shared.monitor.unsubscribe(handle);
            return Err(ResolverError::Stopped);
        }
        core.subscription = Some(handle);

        let seen_events = core.connectivity_events;
        let shared = Arc::clone(&self.shared);
        self.shared.spawn(async move {
            match shared.monitor.current_state().await {
                Ok(connected) => shared.apply_snapshot(connected, seen_events),
                Err(e) => warn!(error = %e, "Connectivity snapshot failed, keeping last known state"),
            }
        });
        Ok(())
    }

    /// Resolve `identity` if it differs from the current one
    pub fn on_identity_changed(&self, identity: ResourceIdentity) {
        let mut core = self.shared.core.lock();
        if !core.is_active() {
            debug!(url = ?identity.url(), "Identity change ignored, controller not active");
            return;
        }
        if core.identity.as_ref() == Some(&identity) {
            debug!(url = ?identity.url(), "Identity unchanged");
            return;
        }
        self.shared.resolve(&mut core, identity);
    }

    /// Record a connectivity transition
    pub fn on_connectivity_changed(&self, connected: bool) {
        self.shared.on_connectivity_changed(connected);
    }

    /// Deactivate the controller. No state is published afterwards.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Stop the controller and wait for every task it spawned to finish
    pub async fn shutdown(self) {
        self.shared.stop();
        self.shared.tasks.wait().await;
    }

    pub fn is_active(&self) -> bool {
        self.shared.core.lock().is_active()
    }

    /// Snapshot of the published state
    pub fn state(&self) -> ResolutionState {
        self.shared.core.lock().state.borrow().clone()
    }

    /// Receiver for state updates
    pub fn subscribe(&self) -> watch::Receiver<ResolutionState> {
        self.shared.core.lock().state.subscribe()
    }

    pub fn identity(&self) -> Option<ResourceIdentity> {
        self.shared.core.lock().identity.clone()
    }

    pub fn generation(&self) -> Generation {
        self.shared.core.lock().generation
    }

    pub fn phase(&self) -> ResolutionPhase {
        let core = self.shared.core.lock();
        core.state.borrow().phase(core.identity.is_some())
    }

    /// Number of spawned tasks still running, superseded ones included
    pub fn outstanding_tasks(&self) -> usize {
        self.shared.tasks.len()
    }

    /// What the presenter should show right now
    pub fn presentation(&self) -> Presentation {
        let core = self.shared.core.lock();
        let state = core.state.borrow();
        present(&state, core.identity.as_ref(), &self.shared.config.display)
    }

    pub fn render<P: Presenter>(&self, presenter: &P) -> P::Output {
        presenter.render(&self.presentation())
    }

    fn connectivity_listener(&self) -> ConnectivityListener {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        Arc::new(move |connected| {
            if let Some(shared) = shared.upgrade() {
                shared.on_connectivity_changed(connected);
            }
        })
    }
}

impl Drop for ResolutionController {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl Shared {
    fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn_on(task, &self.runtime)
    }

    /// Start a resolution attempt for `identity`, superseding the current one
    fn resolve(self: &Arc<Self>, core: &mut Core, identity: ResourceIdentity) {
        core.generation = core.generation.next();
        let generation = core.generation;
        if let Some(task) = core.in_flight.take() {
            if self.config.abort_stale_work {
                task.abort();
            }
        }

        let key = if self.store.is_cacheable(identity.url()) {
            CacheKey::derive(&identity)
        } else {
            None
        };
        let url = identity.url().map(str::to_owned);
        core.identity = Some(identity);

        let Some(key) = key else {
            debug!(url = ?url, %generation, "Resource is not cacheable");
            core.publish(|state| state.uncacheable(false));
            return;
        };

        core.publish(|state| state.pending());
        debug!(key = %key, %generation, "Resolving cached copy");

        let shared = Arc::clone(self);
        let task = self.spawn(async move {
            let outcome = shared.fetch(&key).await;
            shared.complete(generation, &key, outcome);
        });
        core.in_flight = Some(task);
    }

    /// Lookup, then populate on failure. No retries beyond that.
    async fn fetch(&self, key: &CacheKey) -> Outcome {
        match self.store.lookup(key).await {
            Ok(path) => return Outcome::Hit(path),
            Err(e) if e.is_miss() => debug!(key = %key, "Cache miss, populating"),
            Err(e) => debug!(key = %key, error = %e, "Cache lookup failed, populating"),
        }

        match self
            .store
            .populate(key, self.config.header_resolver.clone())
            .await
        {
            Ok(path) => Outcome::Populated(path),
            Err(e) => Outcome::Failed(e),
        }
    }

    fn complete(&self, generation: Generation, key: &CacheKey, outcome: Outcome) {
        let mut core = self.core.lock();
        if !core.is_active() || core.generation != generation {
            debug!(
                key = %key,
                %generation,
                current = %core.generation,
                "Discarding result of superseded resolution"
            );
            return;
        }
        core.in_flight = None;

        match outcome {
            Outcome::Hit(path) => {
                debug!(key = %key, path = %path, "Serving cached copy");
                core.publish(|state| state.resolved(path));
            }
            Outcome::Populated(path) => {
                debug!(key = %key, path = %path, "Serving freshly cached copy");
                core.publish(|state| state.resolved(path));
            }
            Outcome::Failed(e) => {
                warn!(key = %key, error = %e, "Caching failed, serving remote resource");
                core.publish(|state| state.uncacheable(true));
            }
        }
    }

    fn on_connectivity_changed(self: &Arc<Self>, connected: bool) {
        let mut core = self.core.lock();
        if !core.is_active() {
            return;
        }
        core.connectivity_events += 1;
        self.apply_connectivity(&mut core, connected);
    }

    fn apply_snapshot(self: &Arc<Self>, connected: bool, seen_events: u64) {
        let mut core = self.core.lock();
        if !core.is_active() {
            return;
        }
        if core.connectivity_events != seen_events {
            debug!(connected, "Connectivity snapshot overtaken by a change notification");
            return;
        }
        self.apply_connectivity(&mut core, connected);
    }

    fn apply_connectivity(self: &Arc<Self>, core: &mut Core, connected: bool) {
        let was_connected = core.state.borrow().network_available;
        core.publish(|state| state.network_available = connected);

        let degraded = core.state.borrow().degraded;
        if self.config.retry_on_reconnect && connected && !was_connected && degraded {
            if let Some(identity) = core.identity.clone() {
                info!(url = ?identity.url(), "Connectivity restored, retrying resolution");
                self.resolve(core, identity);
            }
        }
    }

    fn stop(&self) {
        let (subscription, in_flight) = {
            let mut core = self.core.lock();
            if core.lifecycle == Lifecycle::Stopped {
                return;
            }
            core.lifecycle = Lifecycle::Stopped;
            core.generation = core.generation.next();
            (core.subscription.take(), core.in_flight.take())
        };

        if let Some(handle) = subscription {
            self.monitor.unsubscribe(handle);
        }
        if let Some(task) = in_flight {
            if self.config.abort_stale_work {
                task.abort();
            }
        }
        self.tasks.close();
        info!(outstanding = self.tasks.len(), "Resolution controller stopped");
    }
}
