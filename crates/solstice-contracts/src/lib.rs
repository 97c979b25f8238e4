//! Shared capability contracts between the Solstice host and its plugins.
//!
//! This crate is linked statically into the host **and** into every plugin
//! library, so trait objects created inside a plugin can be used by the host
//! directly. That only works when both sides were compiled against the same
//! contracts revision with the same toolchain; [`ABI_VERSION`] is the tag the
//! host checks before touching any other symbol. Bump it on every breaking
//! change to the types in this crate.
//!
//! Plugins implement one of two capability traits:
//!
//! - [`Feature`]: a lifecycle object hosted by the console host.
//! - [`EndpointModule`]: publishes HTTP route handlers into the web host's
//!   route table.
//!
//! Use [`export_feature!`] or [`export_endpoint_module!`] to emit the entry
//! points the host looks for.

use std::sync::Arc;

use serde_json::Value;

/// Boxed error type carried across the plugin boundary.
///
/// Plugins bring their own error types; the host only ever logs them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Contract revision tag. The host refuses plugins built against a
/// different revision.
pub const ABI_VERSION: u32 = 1;

/// File stem of this crate when built as a library. Artifacts with this
/// stem are never treated as plugins and never staged into a plugin's
/// domain; the statically linked copy is the single source of type
/// identity.
pub const CONTRACTS_MODULE_STEM: &str = "solstice_contracts";

/// Symbol exporting the [`ABI_VERSION`] a plugin was built against.
pub const ABI_VERSION_SYMBOL: &[u8] = b"solstice_abi_version";

/// Symbol exporting the plugin crate's own version string.
pub const PLUGIN_VERSION_SYMBOL: &[u8] = b"solstice_plugin_version";

/// Entry point symbol for [`Feature`] plugins.
pub const FEATURE_ENTRY_SYMBOL: &[u8] = b"solstice_feature_create";

/// Entry point symbol for [`EndpointModule`] plugins.
pub const ENDPOINTS_ENTRY_SYMBOL: &[u8] = b"solstice_endpoints_create";

/// Signature of the `solstice_abi_version` symbol.
pub type AbiVersionFn = extern "C" fn() -> u32;

/// Signature of the `solstice_plugin_version` symbol.
pub type PluginVersionFn = fn() -> &'static str;

/// Signature of the `solstice_feature_create` symbol.
///
/// The returned pointer is a `Box::into_raw` allocation; the host takes
/// ownership.
pub type FeatureCreateFn = unsafe fn() -> *mut dyn Feature;

/// Signature of the `solstice_endpoints_create` symbol.
pub type EndpointsCreateFn = unsafe fn() -> *mut dyn EndpointModule;

/// A lifecycle plugin hosted by the console host.
///
/// `dispose` must release every external resource the plugin holds
/// (timers, sockets, caches, HTTP clients) and detach all event
/// subscriptions; after it returns the host drops its last reference and
/// the plugin's code may be unmapped.
pub trait Feature: Send + Sync {
    /// Self-declared plugin name, used in logs and the loaded-plugin
    /// snapshot. May be empty; the host then derives a name from the
    /// artifact file name.
    fn name(&self) -> &str;

    /// Called once after a successful load.
    fn start(&self) -> Result<(), BoxError>;

    /// Called once when the plugin is unloaded or the host shuts down.
    fn dispose(&self) -> Result<(), BoxError>;
}

/// A plugin that publishes HTTP route handlers into the web host.
///
/// The same dispose contract as [`Feature`] applies. `register` must not
/// hand out references to host-level storage other than the handlers it
/// registers; anything else pins the plugin's domain and defeats unload.
pub trait EndpointModule: Send + Sync {
    /// Self-declared plugin name. May be empty; the host then groups the
    /// routes under the first non-empty segment of the first registered
    /// pattern.
    fn name(&self) -> &str {
        ""
    }

    /// Register this module's routes. All routes registered by one call
    /// become visible as a single snapshot change.
    fn register(&self, routes: &mut dyn RouteTable) -> Result<(), BoxError>;

    /// Called after the grace period following a hot-swap, on explicit
    /// unload, or at host shutdown.
    fn dispose(&self) -> Result<(), BoxError>;
}

/// The registration surface handed to [`EndpointModule::register`].
///
/// Patterns use `{name}` segments with optional `int`/`bool` constraints,
/// e.g. `/sum/{x:int}/{y:int}`. A constrained segment that does not parse
/// behaves as a route miss.
pub trait RouteTable {
    /// Register a GET route.
    fn add_get(&mut self, pattern: &str, handler: Arc<dyn RouteHandler>);

    /// Register a POST route.
    fn add_post(&mut self, pattern: &str, handler: Arc<dyn RouteHandler>);
}

/// A route handler supplied by a plugin.
///
/// Handlers are synchronous; the web host runs them on blocking workers
/// and serializes the returned value as JSON.
pub trait RouteHandler: Send + Sync {
    /// Handle one request.
    fn call(&self, request: RouteRequest) -> Result<Value, BoxError>;
}

impl<F> RouteHandler for F
where
    F: Fn(RouteRequest) -> Result<Value, BoxError> + Send + Sync,
{
    fn call(&self, request: RouteRequest) -> Result<Value, BoxError> {
        self(request)
    }
}

/// The request view a handler receives: the matched route's method and
/// pattern plus the bound path parameters.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: String,
    pattern: String,
    params: RouteParams,
}

impl RouteRequest {
    /// Build a request. Called by the host when dispatching.
    pub fn new(method: impl Into<String>, pattern: impl Into<String>, params: RouteParams) -> Self {
        Self {
            method: method.into(),
            pattern: pattern.into(),
            params,
        }
    }

    /// HTTP method of the matched route.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The route pattern that matched.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Bound path parameters.
    pub fn params(&self) -> &RouteParams {
        &self.params
    }
}

/// Path parameters bound by name, with typed accessors mirroring the
/// pattern constraint syntax.
#[derive(Debug, Clone, Default)]
pub struct RouteParams {
    values: Vec<(String, String)>,
}

impl RouteParams {
    /// Build from already-matched `(name, value)` pairs.
    pub fn new(values: Vec<(String, String)>) -> Self {
        Self { values }
    }

    /// Raw string value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Required string parameter.
    pub fn require(&self, name: &str) -> Result<&str, ParamError> {
        self.get(name).ok_or_else(|| ParamError::Missing {
            name: name.to_string(),
        })
    }

    /// Required `{name:int}` parameter.
    pub fn require_i64(&self, name: &str) -> Result<i64, ParamError> {
        self.require(name)?
            .parse()
            .map_err(|_| ParamError::Invalid {
                name: name.to_string(),
                expected: "int",
            })
    }

    /// Required `{name:bool}` parameter.
    pub fn require_bool(&self, name: &str) -> Result<bool, ParamError> {
        self.require(name)?
            .parse()
            .map_err(|_| ParamError::Invalid {
                name: name.to_string(),
                expected: "bool",
            })
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no parameters were bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Errors from typed parameter access.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// The route did not bind a parameter with this name.
    #[error("missing path parameter '{name}'")]
    Missing { name: String },

    /// The bound value did not parse as the requested type.
    #[error("path parameter '{name}' is not a valid {expected}")]
    Invalid { name: String, expected: &'static str },
}

/// Emit the entry points for a [`Feature`] plugin.
///
/// The type must implement [`Feature`] and [`Default`]; the host
/// constructs it through `Default` (the parameterless-constructor
/// contract).
///
/// ```ignore
/// struct Uptime;
/// impl solstice_contracts::Feature for Uptime { /* ... */ }
/// solstice_contracts::export_feature!(Uptime);
/// ```
#[macro_export]
macro_rules! export_feature {
    ($plugin:ty) => {
        $crate::__export_common!();

        #[no_mangle]
        pub unsafe fn solstice_feature_create() -> *mut dyn $crate::Feature {
            let instance: Box<dyn $crate::Feature> = Box::new(<$plugin as Default>::default());
            Box::into_raw(instance)
        }
    };
}

/// Emit the entry points for an [`EndpointModule`] plugin.
#[macro_export]
macro_rules! export_endpoint_module {
    ($plugin:ty) => {
        $crate::__export_common!();

        #[no_mangle]
        pub unsafe fn solstice_endpoints_create() -> *mut dyn $crate::EndpointModule {
            let instance: Box<dyn $crate::EndpointModule> =
                Box::new(<$plugin as Default>::default());
            Box::into_raw(instance)
        }
    };
}

/// Symbols shared by both export macros. Not part of the public API.
#[doc(hidden)]
#[macro_export]
macro_rules! __export_common {
    () => {
        #[no_mangle]
        pub extern "C" fn solstice_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        #[no_mangle]
        pub fn solstice_plugin_version() -> &'static str {
            env!("CARGO_PKG_VERSION")
        }
    };
}
