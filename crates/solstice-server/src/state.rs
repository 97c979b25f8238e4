//! Application state management
//!
//! Shared state across request handlers: the route registry, the plugin
//! host driving it, and the dynamic snapshot router.

use std::sync::Arc;

use solstice_host::PluginHost;
use solstice_routing::RouteRegistry;

use crate::binding::EndpointBinding;
use crate::config::ServerConfig;
use crate::dynamic::DynamicRouter;
use crate::error::ServerResult;

/// Shared application state
///
/// This struct is cloned for each request handler and contains
/// Arc-wrapped resources for efficient sharing.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Plugin route registry
    pub registry: Arc<RouteRegistry>,

    /// Plugin lifecycle engine
    pub host: PluginHost<EndpointBinding>,

    /// Snapshot router kept in sync with the registry
    pub dynamic: DynamicRouter,
}

impl AppState {
    /// Create a new application state with the given configuration.
    /// Must be called from within a Tokio runtime.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let registry = Arc::new(RouteRegistry::new());
        let host = PluginHost::new(
            config.plugins.clone(),
            EndpointBinding::new(Arc::clone(&registry)),
        );
        let dynamic = DynamicRouter::new(Arc::clone(&registry));

        Ok(Self {
            config: Arc::new(config),
            registry,
            host,
            dynamic,
        })
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
