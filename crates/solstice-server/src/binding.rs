//! Endpoint-module binding: how the web host loads and publishes
//! route-providing plugins.

use std::path::Path;
use std::sync::Arc;

use libloading::Symbol;
use solstice_contracts::{EndpointModule, EndpointsCreateFn, ENDPOINTS_ENTRY_SYMBOL};
use solstice_host::path::file_stem;
use solstice_host::{HostError, HostResult, PluginBinding, PluginDomain};
use solstice_routing::{PluginRouteTable, RouteRegistry};

/// Binds [`EndpointModule`] plugins to the route registry.
pub struct EndpointBinding {
    registry: Arc<RouteRegistry>,
}

impl EndpointBinding {
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        Self { registry }
    }
}

impl PluginBinding for EndpointBinding {
    type Instance = dyn EndpointModule;

    fn instantiate(&self, domain: &PluginDomain) -> HostResult<Arc<dyn EndpointModule>> {
        let create: Symbol<'_, EndpointsCreateFn> = unsafe {
            domain.get(ENDPOINTS_ENTRY_SYMBOL)
        }
        .map_err(|_| HostError::NoCompatibleType {
            path: domain.artifact().to_path_buf(),
        })?;

        let raw = unsafe { create() };
        let boxed: Box<dyn EndpointModule> = unsafe { Box::from_raw(raw) };
        Ok(Arc::from(boxed))
    }

    fn publish(&self, instance: &Arc<dyn EndpointModule>, artifact: &Path) -> HostResult<String> {
        let fallback = file_stem(artifact);
        let mut table = PluginRouteTable::new(instance.name(), &fallback);

        instance
            .register(&mut table)
            .map_err(|e| HostError::Construction {
                plugin: fallback.clone(),
                stage: "register",
                reason: e.to_string(),
            })?;

        // All-or-nothing: a bad pattern fails the load before anything
        // reaches the registry.
        let committed = table
            .commit(&self.registry)
            .map_err(|e| HostError::Construction {
                plugin: fallback,
                stage: "register",
                reason: e.to_string(),
            })?;

        tracing::debug!(
            plugin = %committed.plugin_name,
            routes = committed.route_count,
            "endpoint module published"
        );
        Ok(committed.plugin_name)
    }

    fn unpublish(&self, name: &str) {
        self.registry.remove_plugin(name);
    }

    fn dispose(&self, name: &str, instance: &dyn EndpointModule) {
        if let Err(error) = instance.dispose() {
            tracing::warn!(plugin = name, %error, "plugin dispose failed");
        }
    }
}
