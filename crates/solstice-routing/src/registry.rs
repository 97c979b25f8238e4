//! The mutable route registry consumed by the router.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::entry::RouteEntry;
use crate::token::ChangeToken;

/// Mutable endpoint data source with per-plugin grouping and change
/// notification.
///
/// Mutations apply the structural change first and then rotate the
/// change token: the current signal is swapped for a fresh one under the
/// rotation lock and the captured one is tripped only after the new
/// state is visible. Observers that subscribe between capture and
/// rotation see the new token and learn of the new state on their next
/// read.
pub struct RouteRegistry {
    routes: DashMap<String, Vec<Arc<RouteEntry>>>,
    token: Mutex<ChangeToken>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
            token: Mutex::new(ChangeToken::new()),
        }
    }

    /// Append entries under a plugin group and signal the change.
    pub fn add_for_plugin(&self, plugin_name: &str, entries: Vec<Arc<RouteEntry>>) {
        if entries.is_empty() {
            return;
        }

        tracing::debug!(
            plugin = plugin_name,
            routes = entries.len(),
            "publishing plugin routes"
        );

        self.routes
            .entry(plugin_name.to_string())
            .or_default()
            .extend(entries);
        self.rotate();
    }

    /// Remove every route of a plugin group; returns how many entries
    /// were dropped. Removing an absent group is a no-op and does not
    /// rotate the token.
    pub fn remove_plugin(&self, plugin_name: &str) -> usize {
        let removed = self
            .routes
            .remove(plugin_name)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0);

        if removed > 0 {
            tracing::debug!(
                plugin = plugin_name,
                routes = removed,
                "removed plugin routes"
            );
            self.rotate();
        }

        removed
    }

    /// Flat snapshot of every registered entry.
    pub fn endpoints(&self) -> Vec<Arc<RouteEntry>> {
        self.routes
            .iter()
            .flat_map(|group| group.value().clone())
            .collect()
    }

    /// Snapshot of the per-plugin grouping, for introspection.
    pub fn plugins(&self) -> Vec<(String, Vec<Arc<RouteEntry>>)> {
        self.routes
            .iter()
            .map(|group| (group.key().clone(), group.value().clone()))
            .collect()
    }

    /// The signal for the current endpoint-snapshot generation.
    pub fn change_token(&self) -> ChangeToken {
        self.token.lock().clone()
    }

    /// Number of registered plugin groups.
    pub fn plugin_count(&self) -> usize {
        self.routes.len()
    }

    /// Total number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.iter().map(|group| group.value().len()).sum()
    }

    /// Capture the current token, install a fresh one, then expire the
    /// captured token. The swap happens under the rotation lock so no
    /// concurrent mutation's signal is lost; the trip happens after the
    /// structural change is visible.
    fn rotate(&self) {
        let previous = {
            let mut current = self.token.lock();
            std::mem::replace(&mut *current, ChangeToken::new())
        };
        previous.trip();
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
