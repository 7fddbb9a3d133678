//! # Cache Store
//!
//! This module defines the cache store trait the resolution controller drives,
//! along with the value types that cross it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use url::Url;

use crate::cache::key::CacheKey;
use crate::error::CacheResult;

/// Location of a cached copy on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalPath(PathBuf);

impl LocalPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// `file://` URI a player can open
    pub fn to_file_uri(&self) -> String {
        format!("file://{}", self.0.display())
    }
}

impl From<PathBuf> for LocalPath {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for LocalPath {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

type ResolveHeadersFn = dyn Fn() -> BoxFuture<'static, CacheResult<HeaderMap>> + Send + Sync;

/// Async callback producing the request headers used when populating the cache,
/// e.g. for authenticated media URLs.
#[derive(Clone)]
pub struct HeaderResolver(Arc<ResolveHeadersFn>);

impl HeaderResolver {
    pub fn new<F, Fut>(resolve: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CacheResult<HeaderMap>> + Send + 'static,
    {
        Self(Arc::new(move || resolve().boxed()))
    }

    /// A resolver that always yields the given headers
    pub fn fixed(headers: HeaderMap) -> Self {
        Self::new(move || {
            let headers = headers.clone();
            async move { Ok(headers) }
        })
    }

    pub async fn resolve(&self) -> CacheResult<HeaderMap> {
        (self.0)().await
    }
}

impl Default for HeaderResolver {
    fn default() -> Self {
        Self::fixed(HeaderMap::new())
    }
}

impl fmt::Debug for HeaderResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderResolver").finish_non_exhaustive()
    }
}

/// A store that keeps local copies of remote media, addressed by [`CacheKey`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a URL is eligible for caching at all
    fn is_cacheable(&self, url: Option<&str>) -> bool;

    /// Path of an existing cached copy, or [`CacheError::Miss`](crate::CacheError::Miss)
    async fn lookup(&self, key: &CacheKey) -> CacheResult<LocalPath>;

    /// Fetch the resource into the cache and return the path of the new copy
    async fn populate(&self, key: &CacheKey, headers: HeaderResolver) -> CacheResult<LocalPath>;
}

/// Default cacheability rule: an absolute `http` or `https` URL.
pub fn is_remote_url(url: Option<&str>) -> bool {
    url.and_then(|u| Url::parse(u).ok())
        .is_some_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}
