//! Capability-specific load steps.
//!
//! The lifecycle engine is generic over a [`PluginBinding`]: the binding
//! knows which entry symbol to look for, how to activate an instance and
//! how to retire it. The console host uses [`FeatureBinding`]; the web
//! host supplies a binding that publishes routes into its registry.

use std::path::Path;
use std::sync::Arc;

use libloading::Symbol;
use solstice_contracts::{Feature, FeatureCreateFn, FEATURE_ENTRY_SYMBOL};

use crate::domain::PluginDomain;
use crate::error::{HostError, HostResult};
use crate::path::file_stem;

/// The capability-specific steps of the load/unload pipeline.
pub trait PluginBinding: Send + Sync + 'static {
    /// The live plugin object. Shared: the registry handle, in-flight
    /// consumers and the pending-disposal queue all hold clones.
    type Instance: ?Sized + Send + Sync + 'static;

    /// Find the entry point in the domain and construct the instance.
    /// Must fail with [`HostError::NoCompatibleType`] when the module
    /// exposes no matching entry point.
    fn instantiate(&self, domain: &PluginDomain) -> HostResult<Arc<Self::Instance>>;

    /// Activate the instance (invoke `start`, or `register` its routes)
    /// and return the name it is published under. On error the caller
    /// rolls the whole load back; implementations must not leave partial
    /// registrations behind.
    fn publish(&self, instance: &Arc<Self::Instance>, artifact: &Path) -> HostResult<String>;

    /// Withdraw the instance from the host surface (remove its routes).
    /// New consumers stop seeing the plugin; existing holders of the
    /// instance are unaffected.
    fn unpublish(&self, name: &str);

    /// Invoke the instance's dispose. Failures are logged, never
    /// propagated; an uncooperative plugin must not block others.
    fn dispose(&self, name: &str, instance: &Self::Instance);
}

/// Binding for [`Feature`] lifecycle plugins (console host).
pub struct FeatureBinding;

impl PluginBinding for FeatureBinding {
    type Instance = dyn Feature;

    fn instantiate(&self, domain: &PluginDomain) -> HostResult<Arc<dyn Feature>> {
        let create: Symbol<'_, FeatureCreateFn> = unsafe { domain.get(FEATURE_ENTRY_SYMBOL) }
            .map_err(|_| HostError::NoCompatibleType {
                path: domain.artifact().to_path_buf(),
            })?;

        // The entry point hands over a Box::into_raw allocation.
        let raw = unsafe { create() };
        let boxed: Box<dyn Feature> = unsafe { Box::from_raw(raw) };
        Ok(Arc::from(boxed))
    }

    fn publish(&self, instance: &Arc<dyn Feature>, artifact: &Path) -> HostResult<String> {
        let declared = instance.name().trim().to_string();
        let name = if declared.is_empty() {
            file_stem(artifact)
        } else {
            declared
        };

        instance.start().map_err(|e| HostError::Construction {
            plugin: name.clone(),
            stage: "start",
            reason: e.to_string(),
        })?;

        Ok(name)
    }

    fn unpublish(&self, _name: &str) {}

    fn dispose(&self, name: &str, instance: &dyn Feature) {
        if let Err(error) = instance.dispose() {
            tracing::warn!(plugin = name, %error, "plugin dispose failed");
        }
    }
}
