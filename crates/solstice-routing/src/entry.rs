//! Route entries as stored in the registry.

use std::fmt;
use std::sync::Arc;

use http::Method;
use solstice_contracts::RouteHandler;

use crate::pattern::RoutePattern;

/// Fixed prefix of every plugin route's display label. External tools
/// (introspection endpoints, documentation builders) use it to tell
/// plugin routes from host routes.
pub const DISPLAY_LABEL_PREFIX: &str = "Plugin:";

/// One plugin-published route.
#[derive(Clone)]
pub struct RouteEntry {
    /// Group the entry belongs to in the registry.
    pub plugin_name: String,

    /// HTTP method metadata.
    pub method: Method,

    /// The parsed pattern.
    pub pattern: RoutePattern,

    /// The plugin-supplied handler.
    pub handler: Arc<dyn RouteHandler>,

    /// `Plugin:`-prefixed label, see [`DISPLAY_LABEL_PREFIX`].
    pub display_label: String,
}

impl RouteEntry {
    /// Build an entry; the display label is derived from the pattern.
    pub fn new(
        plugin_name: impl Into<String>,
        method: Method,
        pattern: RoutePattern,
        handler: Arc<dyn RouteHandler>,
    ) -> Self {
        let display_label = format!("{DISPLAY_LABEL_PREFIX}{}", pattern.raw());
        Self {
            plugin_name: plugin_name.into(),
            method,
            pattern,
            handler,
            display_label,
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("plugin_name", &self.plugin_name)
            .field("method", &self.method)
            .field("pattern", &self.pattern.raw())
            .field("display_label", &self.display_label)
            .finish_non_exhaustive()
    }
}
