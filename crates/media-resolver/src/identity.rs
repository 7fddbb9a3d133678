//! # Resource Identity
//!
//! The immutable description of what is being resolved: a media URL plus the
//! options that contribute to its cache key. Two identities that compare equal
//! name the same logical resource, and the controller only re-resolves when
//! the identity it is given actually changes.

use serde::{Deserialize, Serialize};

/// Which query parameters of a URL participate in its cache key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "QueryKeyRepr", into = "QueryKeyRepr")]
pub enum QueryKeyPolicy {
    /// Drop the whole query string
    #[default]
    Ignore,
    /// Keep every query parameter
    All,
    /// Keep only the named query parameters
    Only(Vec<String>),
}

impl QueryKeyPolicy {
    /// Whether a query parameter with this name is part of the key
    pub fn keeps(&self, name: &str) -> bool {
        match self {
            QueryKeyPolicy::Ignore => false,
            QueryKeyPolicy::All => true,
            QueryKeyPolicy::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

impl From<bool> for QueryKeyPolicy {
    fn from(use_query: bool) -> Self {
        if use_query {
            QueryKeyPolicy::All
        } else {
            QueryKeyPolicy::Ignore
        }
    }
}

impl From<Vec<String>> for QueryKeyPolicy {
    fn from(names: Vec<String>) -> Self {
        QueryKeyPolicy::Only(names)
    }
}

// Wire shape: `false`, `true` or a list of parameter names.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum QueryKeyRepr {
    Flag(bool),
    Names(Vec<String>),
}

impl From<QueryKeyRepr> for QueryKeyPolicy {
    fn from(repr: QueryKeyRepr) -> Self {
        match repr {
            QueryKeyRepr::Flag(flag) => flag.into(),
            QueryKeyRepr::Names(names) => names.into(),
        }
    }
}

impl From<QueryKeyPolicy> for QueryKeyRepr {
    fn from(policy: QueryKeyPolicy) -> Self {
        match policy {
            QueryKeyPolicy::Ignore => QueryKeyRepr::Flag(false),
            QueryKeyPolicy::All => QueryKeyRepr::Flag(true),
            QueryKeyPolicy::Only(names) => QueryKeyRepr::Names(names),
        }
    }
}

/// Options that contribute to the cache key of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Query parameters kept in the key
    pub query_params: QueryKeyPolicy,
    /// Optional cache partition tag
    pub group: Option<String>,
}

impl CacheOptions {
    pub fn with_query_params(mut self, policy: impl Into<QueryKeyPolicy>) -> Self {
        self.query_params = policy.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// A media resource as seen by the consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Remote URL, absent when the consumer has no source yet
    pub url: Option<String>,
    #[serde(default)]
    pub options: CacheOptions,
}

impl ResourceIdentity {
    pub fn new(url: impl Into<String>, options: CacheOptions) -> Self {
        Self {
            url: Some(url.into()),
            options,
        }
    }

    /// An identity without a source URL
    pub fn empty(options: CacheOptions) -> Self {
        Self { url: None, options }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}
