//! Plugin introspection endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Document served at `/_plugins`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PluginsDocument {
    pub count: usize,
    pub plugins: Vec<PluginSummary>,
}

/// One loaded plugin and its published routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct PluginSummary {
    pub name: String,
    pub route: String,
    pub metadata: Vec<String>,
}

/// List every loaded plugin with its routes' display labels. The labels
/// carry the `Plugin:` prefix, so clients can tell plugin routes from
/// host routes.
pub async fn list_plugins(State(state): State<AppState>) -> Json<PluginsDocument> {
    let mut plugins: Vec<PluginSummary> = state
        .registry
        .plugins()
        .into_iter()
        .map(|(name, entries)| PluginSummary {
            route: entries
                .first()
                .map(|entry| entry.pattern.raw().to_string())
                .unwrap_or_else(|| format!("/{name}")),
            metadata: entries
                .iter()
                .map(|entry| entry.display_label.clone())
                .collect(),
            name,
        })
        .collect();

    plugins.sort_by(|a, b| a.name.cmp(&b.name));

    Json(PluginsDocument {
        count: plugins.len(),
        plugins,
    })
}
