use crate::cache::HeaderResolver;
use crate::presenter::DisplayConfig;

/// Configurable options for a resolution controller
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Options handed to the presenter
    pub display: DisplayConfig,

    /// Headers for cache population requests
    pub header_resolver: HeaderResolver,

    /// Re-run resolution of a degraded identity when connectivity comes back
    pub retry_on_reconnect: bool,

    /// Abort superseded and torn-down cache work instead of letting it finish
    /// in the background
    pub abort_stale_work: bool,
}

impl ResolverConfig {
    pub fn builder() -> crate::builder::ResolverConfigBuilder {
        crate::builder::ResolverConfigBuilder::new()
    }
}
