//! Host route definitions
//!
//! Routes owned by the host itself, as opposed to the plugin-published
//! routes served through the dynamic snapshot router.

pub mod health;
pub mod plugins;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the host's own routes.
pub fn host_routes() -> Router<AppState> {
    Router::new()
        .route("/_plugins", get(plugins::list_plugins))
        .nest("/health", health::routes())
}
