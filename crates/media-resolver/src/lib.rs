//! # Media Resolver
//!
//! Resolves the remote media resource a consumer currently displays to a
//! locally cached copy, and tells the presenter what to show meanwhile.
//!
//! ## Features
//!
//! - Cache key derivation with configurable query parameter policies
//! - Lookup-then-populate resolution with stale result suppression
//! - Connectivity tracking, optionally fed by an HTTP reachability probe
//! - A pure presenter contract mapping state to a loading or player view

pub mod builder;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod identity;
pub mod presenter;
pub mod state;

#[cfg(test)]
mod test_utils;

pub use builder::ResolverConfigBuilder;
pub use cache::{
    CacheKey, CacheStore, HeaderResolver, LocalPath, MemoryCacheStore, MemoryStoreConfig,
    Populator,
};
pub use config::ResolverConfig;
pub use connectivity::{
    ConnectivityHub, ConnectivityListener, ConnectivityMonitor, ConnectivityProbe, ProbeConfig,
    ProbeHandle, SubscriptionHandle,
};
pub use controller::{Generation, ResolutionController};
pub use error::{CacheError, CacheResult, ConnectivityError, ResolverError};
pub use identity::{CacheOptions, QueryKeyPolicy, ResourceIdentity};
pub use presenter::{
    DisplayConfig, IndicatorConfig, IndicatorSize, Layout, PlayerProps, PlayerSource,
    Presentation, Presenter, present,
};
pub use state::{ResolutionPhase, ResolutionState};
