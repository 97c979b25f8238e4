//! The plugin-facing registration surface.

use std::sync::Arc;

use http::Method;
use solstice_contracts::{RouteHandler, RouteTable};
use thiserror::Error;

use crate::entry::RouteEntry;
use crate::pattern::{PatternError, RoutePattern};
use crate::registry::RouteRegistry;

/// Errors surfaced when a module's registered routes are committed.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A pattern handed to `add_get`/`add_post` did not parse.
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
}

/// Result of committing one `register` call.
#[derive(Debug, Clone)]
pub struct CommittedRoutes {
    /// The group name the entries were published under.
    pub plugin_name: String,

    /// Number of routes published.
    pub route_count: usize,
}

/// Collects the routes of one [`register`](solstice_contracts::EndpointModule::register)
/// call and publishes them to the [`RouteRegistry`] as a single grouped
/// snapshot change.
///
/// The group name is the module's declared name when non-empty, else the
/// first non-empty literal segment of the first registered pattern, else
/// the fallback (usually the artifact's file stem).
pub struct PluginRouteTable {
    declared_name: String,
    fallback_name: String,
    staged: Vec<(Method, RoutePattern, Arc<dyn RouteHandler>)>,
    errors: Vec<RoutingError>,
}

impl PluginRouteTable {
    pub fn new(declared_name: &str, fallback_name: &str) -> Self {
        Self {
            declared_name: declared_name.trim().to_string(),
            fallback_name: fallback_name.to_string(),
            staged: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn add(&mut self, method: Method, pattern: &str, handler: Arc<dyn RouteHandler>) {
        match RoutePattern::parse(pattern) {
            Ok(parsed) => self.staged.push((method, parsed, handler)),
            Err(source) => self.errors.push(RoutingError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }),
        }
    }

    /// The group name the staged routes will be published under.
    pub fn plugin_name(&self) -> String {
        if !self.declared_name.is_empty() {
            return self.declared_name.clone();
        }

        self.staged
            .iter()
            .find_map(|(_, pattern, _)| pattern.first_segment())
            .unwrap_or(self.fallback_name.as_str())
            .to_string()
    }

    /// Publish the staged routes as one grouped change. Any bad pattern
    /// fails the whole call so a module is either fully published or
    /// leaves no side effects.
    pub fn commit(mut self, registry: &RouteRegistry) -> Result<CommittedRoutes, RoutingError> {
        if let Some(error) = self.errors.drain(..).next() {
            return Err(error);
        }

        let plugin_name = self.plugin_name();
        let entries: Vec<Arc<RouteEntry>> = self
            .staged
            .into_iter()
            .map(|(method, pattern, handler)| {
                Arc::new(RouteEntry::new(&plugin_name, method, pattern, handler))
            })
            .collect();

        let route_count = entries.len();
        registry.add_for_plugin(&plugin_name, entries);

        Ok(CommittedRoutes {
            plugin_name,
            route_count,
        })
    }
}

impl RouteTable for PluginRouteTable {
    fn add_get(&mut self, pattern: &str, handler: Arc<dyn RouteHandler>) {
        self.add(Method::GET, pattern, handler);
    }

    fn add_post(&mut self, pattern: &str, handler: Arc<dyn RouteHandler>) {
        self.add(Method::POST, pattern, handler);
    }
}
