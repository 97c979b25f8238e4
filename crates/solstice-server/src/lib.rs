//! Solstice Server - web host for dynamically loaded plugins
//!
//! Serves HTTP routes published by plugins discovered in a watched
//! directory. Plugin routes are hot-swapped without dropping traffic:
//! the route snapshot is rebuilt whenever the registry's change token
//! expires, while in-flight requests keep their captured handlers for a
//! configurable grace period.

pub mod binding;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Request;
use axum::response::IntoResponse;
use axum::Router;
use tower::ServiceExt;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{info, warn};

pub use binding::EndpointBinding;
pub use config::ServerConfig;
pub use dynamic::DynamicRouter;
pub use error::{ServerError, ServerResult};
pub use state::AppState;

/// Initialize the Solstice server with the given configuration
///
/// Builds the application state, starts the plugin host (which creates
/// the plugin directory, loads any artifacts already present and begins
/// watching) and assembles the router.
pub async fn init_server(config: ServerConfig) -> ServerResult<(Router, AppState)> {
    info!("Initializing Solstice Server v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::new(config.clone()).await?;

    // Watcher construction and directory creation are the only plugin
    // failures that abort startup; per-artifact failures just log.
    state.host.start()?;

    let app = build_router(state.clone(), &config)?;

    info!("Solstice Server initialized successfully");
    Ok((app, state))
}

/// Build the main application router with all routes and middleware
fn build_router(state: AppState, config: &ServerConfig) -> ServerResult<Router> {
    let cors = build_cors_layer(config)?;

    let dynamic = state.dynamic.clone();
    let app = Router::new()
        // Host-owned routes
        .merge(routes::host_routes())
        // Everything else goes to the current plugin route snapshot
        .fallback(move |request: Request| {
            let dynamic = dynamic.clone();
            async move {
                match dynamic.snapshot().oneshot(request).await {
                    Ok(response) => response.into_response(),
                    Err(infallible) => match infallible {},
                }
            }
        })
        // Add application state
        .with_state(state)
        // Add middleware layers directly
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(cors);

    Ok(app)
}

/// Build CORS layer from configuration
fn build_cors_layer(config: &ServerConfig) -> ServerResult<CorsLayer> {
    use tower_http::cors::{AllowOrigin, Any};

    let mut cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors.allow_any_origin {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<http::HeaderValue> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors = cors.allow_origin(AllowOrigin::list(origins));
    }

    Ok(cors)
}

/// Start the server and listen on the configured address
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Configuration(format!("Invalid host/port: {}", e)))?;

    info!("Starting Solstice Server on {}", addr);

    let (app, state) = init_server(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::IoError(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::IoError(format!("Server error: {}", e)))?;

    // Stop watching, dispose every plugin, flush the pending queue.
    state.host.dispose();

    warn!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config(dir: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.plugins.directory = dir.join("plugins");
        config
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn empty_host_serves_an_empty_plugin_list() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = init_server(test_config(dir.path())).await.unwrap();

        let (status, body) = get_json(&app, "/_plugins").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        state.host.dispose();
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = init_server(test_config(dir.path())).await.unwrap();

        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        state.host.dispose();
    }

    #[tokio::test]
    async fn plugin_routes_are_served_through_the_fallback() {
        use http::Method;
        use serde_json::json;
        use solstice_routing::{RouteEntry, RoutePattern};

        let dir = tempfile::tempdir().unwrap();
        let (app, state) = init_server(test_config(dir.path())).await.unwrap();

        state.registry.add_for_plugin(
            "a",
            vec![Arc::new(RouteEntry::new(
                "a",
                Method::GET,
                RoutePattern::parse("/a/ping").unwrap(),
                Arc::new(|_req: solstice_contracts::RouteRequest| Ok(json!({ "pong": true }))),
            ))],
        );

        // Give the rebuild task a moment to install the new snapshot.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (status, body) = get_json(&app, "/a/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "pong": true }));

        let (status, body) = get_json(&app, "/_plugins").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["plugins"][0]["name"], "a");
        assert_eq!(body["plugins"][0]["metadata"][0], "Plugin:/a/ping");

        state.host.dispose();
    }
}
