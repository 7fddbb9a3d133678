use std::sync::Arc;

use crate::cache::CacheKey;

/// Errors produced by a cache store.
#[derive(Debug, thiserror::Error, Clone)]
pub enum CacheError {
    #[error("Cache miss for {key}")]
    Miss { key: String },
    #[error("Failed to populate cache: {0}")]
    Populate(String),
    #[error("Failed to resolve request headers: {0}")]
    HeaderResolution(String),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: Arc<std::io::Error>,
    },
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Shared(Arc<CacheError>),
}

impl CacheError {
    pub fn miss(key: &CacheKey) -> Self {
        CacheError::Miss {
            key: key.key_url.clone(),
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self.root(), CacheError::Miss { .. })
    }

    /// The underlying error, looking through coalesced failures
    pub fn root(&self) -> &CacheError {
        match self {
            CacheError::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

// Manual implementation of From<std::io::Error> for CacheError
// because of the Arc wrapping.
impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            source: Arc::new(err),
        }
    }
}

impl From<Arc<CacheError>> for CacheError {
    fn from(err: Arc<CacheError>) -> Self {
        match Arc::try_unwrap(err) {
            Ok(err) => err,
            Err(shared) => CacheError::Shared(shared),
        }
    }
}

/// Result of a cache store operation
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors produced by a connectivity monitor.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("Connectivity state has not been initialized")]
    Uninitialized,
    #[error("Connectivity probe failed: {0}")]
    Probe(String),
}

/// Errors returned by the resolution controller API.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("No tokio runtime available to drive resolution")]
    NoRuntime,
    #[error("Controller has already been started")]
    AlreadyStarted,
    #[error("Controller has been stopped")]
    Stopped,
}
