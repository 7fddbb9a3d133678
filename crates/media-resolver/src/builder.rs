//! # Builder for ResolverConfig
//!
//! Fluent construction of [`ResolverConfig`] instances.
//!
//! # Example
//!
//! ```
//! use media_resolver::{DisplayConfig, HeaderResolver, ResolverConfig};
//!
//! let config = ResolverConfig::builder()
//!     .with_display(DisplayConfig {
//!         placeholder: Some("asset://loading.mp4".to_string()),
//!         ..Default::default()
//!     })
//!     .with_header("Authorization", "Bearer token")
//!     .with_retry_on_reconnect(true)
//!     .build();
//!
//! assert!(config.retry_on_reconnect);
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::cache::HeaderResolver;
use crate::config::ResolverConfig;
use crate::presenter::{DisplayConfig, IndicatorConfig, Layout};

/// Builder for creating ResolverConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
    // Static headers collected by `with_header`, turned into a resolver on build
    headers: HeaderMap,
}

impl ResolverConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_display(mut self, display: DisplayConfig) -> Self {
        self.config.display = display;
        self
    }

    pub fn with_placeholder(mut self, uri: impl Into<String>) -> Self {
        self.config.display.placeholder = Some(uri.into());
        self
    }

    pub fn with_indicator(mut self, indicator: IndicatorConfig) -> Self {
        self.config.display.indicator = indicator;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.config.display.layout = layout;
        self
    }

    /// Set the async header callback used when populating the cache.
    /// Replaces any headers added with [`with_header`](Self::with_header).
    pub fn with_header_resolver(mut self, resolver: HeaderResolver) -> Self {
        self.config.header_resolver = resolver;
        self.headers.clear();
        self
    }

    /// Add a static header sent when populating the cache
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_retry_on_reconnect(mut self, retry: bool) -> Self {
        self.config.retry_on_reconnect = retry;
        self
    }

    pub fn with_abort_stale_work(mut self, abort: bool) -> Self {
        self.config.abort_stale_work = abort;
        self
    }

    /// Build the ResolverConfig instance
    pub fn build(mut self) -> ResolverConfig {
        if !self.headers.is_empty() {
            self.config.header_resolver = HeaderResolver::fixed(self.headers);
        }
        self.config
    }
}

impl Default for ResolverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
