//! # Resolution State
//!
//! The state a controller publishes for its current resource.

use crate::cache::LocalPath;

/// Published resolution state. Only the controller writes it; presenters and
/// observers read snapshots through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionState {
    /// Whether the current identity is eligible for caching
    pub cacheable: bool,
    /// Local copy of the current identity, once available
    pub resolved_local_path: Option<LocalPath>,
    /// Last known connectivity
    pub network_available: bool,
    /// Lookup and populate both failed; the remote resource is served instead
    pub degraded: bool,
}

impl Default for ResolutionState {
    fn default() -> Self {
        Self {
            cacheable: false,
            resolved_local_path: None,
            // Optimistic until the first snapshot arrives
            network_available: true,
            degraded: false,
        }
    }
}

/// Where the current identity sits in its resolution lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPhase {
    /// No identity has been resolved yet
    Unresolved,
    /// Cacheable, local copy not yet available
    Pending,
    /// Local copy available
    Resolved(LocalPath),
    /// Not eligible for caching
    Uncacheable,
    /// Cache attempts failed, serving the remote resource
    Degraded,
}

impl ResolutionState {
    pub(crate) fn uncacheable(&mut self, degraded: bool) {
        self.cacheable = false;
        self.resolved_local_path = None;
        self.degraded = degraded;
    }

    pub(crate) fn pending(&mut self) {
        self.cacheable = true;
        self.resolved_local_path = None;
        self.degraded = false;
    }

    pub(crate) fn resolved(&mut self, path: LocalPath) {
        self.cacheable = true;
        self.resolved_local_path = Some(path);
        self.degraded = false;
    }

    /// Phase of the current identity. `has_identity` is false before the first
    /// identity reaches the controller.
    pub fn phase(&self, has_identity: bool) -> ResolutionPhase {
        if !has_identity {
            return ResolutionPhase::Unresolved;
        }
        match (&self.resolved_local_path, self.cacheable, self.degraded) {
            (Some(path), _, _) => ResolutionPhase::Resolved(path.clone()),
            (None, true, _) => ResolutionPhase::Pending,
            (None, false, true) => ResolutionPhase::Degraded,
            (None, false, false) => ResolutionPhase::Uncacheable,
        }
    }

    /// Whether a presenter should show a loading view
    pub fn is_loading(&self) -> bool {
        self.cacheable && self.resolved_local_path.is_none()
    }
}
