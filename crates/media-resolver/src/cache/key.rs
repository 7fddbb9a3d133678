//! # Cache Keys
//!
//! Derivation of the key a cache store is addressed with. The key is built from
//! the resource URL with the query string filtered by [`QueryKeyPolicy`], plus the
//! optional partition tag.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use sha2::{Digest, Sha256};
use url::Url;

use crate::identity::{QueryKeyPolicy, ResourceIdentity};

/// Cache key for identifying a media resource.
///
/// Equality and hashing cover `key_url` and `group` only, so URLs differing
/// in ignored query parameters address the same entry.
#[derive(Debug, Clone)]
pub struct CacheKey {
    /// URL the resource is fetched from when the cache is populated
    pub source_url: String,
    /// URL after query filtering, the part that identifies the resource
    pub key_url: String,
    /// Optional partition tag
    pub group: Option<String>,
}

impl CacheKey {
    /// Derive the key for an identity.
    ///
    /// Returns `None` when the identity has no URL or the URL does not parse.
    pub fn derive(identity: &ResourceIdentity) -> Option<Self> {
        let source_url = identity.url()?;
        let parsed = Url::parse(source_url).ok()?;

        Some(Self {
            source_url: source_url.to_string(),
            key_url: filter_query(parsed, &identity.options.query_params).into(),
            group: identity.options.group.clone(),
        })
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        let mut hasher = Sha256::new();
        if let Some(group) = &self.group {
            hasher.update(group);
            hasher.update(":");
        }
        hasher.update(&self.key_url);

        let hash = hasher.finalize();
        match self.extension() {
            Some(ext) => format!("{hash:x}.{ext}"),
            None => format!("{hash:x}"),
        }
    }

    /// File extension of the last path segment, if any
    pub fn extension(&self) -> Option<String> {
        let url = Url::parse(&self.key_url).ok()?;
        let segment = url.path_segments()?.next_back()?;
        Path::new(segment)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_url == other.key_url && self.group == other.group
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_url.hash(state);
        self.group.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{group}:{}", self.key_url),
            None => f.write_str(&self.key_url),
        }
    }
}

fn filter_query(mut url: Url, policy: &QueryKeyPolicy) -> Url {
    url.set_fragment(None);

    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| policy.keeps(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
        return url;
    }

    // Parameter order must not change the key
    kept.sort_by(|a, b| a.0.cmp(&b.0));
    url.query_pairs_mut().clear().extend_pairs(kept.iter());
    url
}
