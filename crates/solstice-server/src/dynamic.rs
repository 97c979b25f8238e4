//! Snapshot router rebuilt on change-token expiry.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::RawPathParams;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::MethodFilter;
use axum::{Json, Router};
use http::Method;
use parking_lot::RwLock;
use serde_json::json;
use solstice_contracts::{RouteParams, RouteRequest};
use solstice_routing::{RouteEntry, RouteRegistry};

/// Holds the current snapshot router for plugin routes and keeps it in
/// sync with the registry.
///
/// A background task follows the change-token protocol: take the token,
/// read the endpoint snapshot, build and install the router, then await
/// the token. One token generation therefore corresponds to exactly one
/// installed snapshot, and a rotation during the build is caught by the
/// immediate next iteration.
#[derive(Clone)]
pub struct DynamicRouter {
    current: Arc<RwLock<Router>>,
}

impl DynamicRouter {
    /// Build the initial snapshot and spawn the rebuild task. Must be
    /// called from within a Tokio runtime.
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        let current = Arc::new(RwLock::new(Router::new()));

        let slot = Arc::clone(&current);
        tokio::spawn(async move {
            loop {
                // Token first, endpoints second.
                let token = registry.change_token();
                let snapshot = build_snapshot(&registry);
                *slot.write() = snapshot;
                token.changed().await;
            }
        });

        Self { current }
    }

    /// Cheap clone of the current snapshot router.
    pub fn snapshot(&self) -> Router {
        self.current.read().clone()
    }
}

/// Build a router from the registry's current endpoint snapshot.
fn build_snapshot(registry: &RouteRegistry) -> Router {
    let mut router = Router::new();
    let mut seen: HashSet<(String, Method)> = HashSet::new();

    for entry in registry.endpoints() {
        let path = entry.pattern.to_router_path();

        if !seen.insert((path.clone(), entry.method.clone())) {
            tracing::warn!(
                route = %entry.display_label,
                plugin = %entry.plugin_name,
                "duplicate method and path; keeping the first registration"
            );
            continue;
        }

        let filter = if entry.method == Method::GET {
            MethodFilter::GET
        } else if entry.method == Method::POST {
            MethodFilter::POST
        } else {
            tracing::warn!(
                method = %entry.method,
                route = %entry.display_label,
                "unsupported method"
            );
            continue;
        };

        let captured = Arc::clone(&entry);
        let handler = move |params: RawPathParams| {
            let entry = Arc::clone(&captured);
            async move { dispatch(entry, params).await }
        };

        router = router.route(&path, axum::routing::on(filter, handler));
    }

    router
}

/// Bind path parameters, run the plugin handler on a blocking worker and
/// serialize its result.
async fn dispatch(entry: Arc<RouteEntry>, params: RawPathParams) -> Response {
    let raw: Vec<(String, String)> = params
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    // A failing typed constraint is a route miss, not a client error.
    if !entry.pattern.accepts(&raw) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let request = RouteRequest::new(
        entry.method.as_str(),
        entry.pattern.raw(),
        RouteParams::new(raw),
    );
    let handler = Arc::clone(&entry.handler);
    let label = entry.display_label.clone();

    match tokio::task::spawn_blocking(move || handler.call(request)).await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(error)) => {
            tracing::warn!(route = %label, %error, "plugin handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "plugin handler failed" })),
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!(route = %label, %error, "plugin handler panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "plugin handler failed" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use solstice_contracts::RouteHandler;
    use solstice_routing::RoutePattern;
    use std::time::Duration;
    use tower::ServiceExt;

    fn entry(method: Method, pattern: &str, handler: Arc<dyn RouteHandler>) -> Arc<RouteEntry> {
        Arc::new(RouteEntry::new(
            "test",
            method,
            RoutePattern::parse(pattern).unwrap(),
            handler,
        ))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn typed_parameters_are_bound_by_name() {
        let registry = Arc::new(RouteRegistry::new());
        registry.add_for_plugin(
            "b",
            vec![entry(
                Method::GET,
                "/b/sum/{x:int}/{y:int}",
                Arc::new(
                    |req: RouteRequest| -> Result<serde_json::Value, solstice_contracts::BoxError> {
                        let x = req.params().require_i64("x")?;
                        let y = req.params().require_i64("y")?;
                        Ok(json!({ "sum": x + y }))
                    },
                ),
            )],
        );

        let router = build_snapshot(&registry);
        let (status, body) = get_json(router, "/b/sum/3/4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "sum": 7 }));
    }

    #[tokio::test]
    async fn constraint_misses_are_not_found() {
        let registry = Arc::new(RouteRegistry::new());
        registry.add_for_plugin(
            "b",
            vec![entry(
                Method::GET,
                "/b/sum/{x:int}/{y:int}",
                Arc::new(|_req: RouteRequest| Ok(json!({}))),
            )],
        );

        let router = build_snapshot(&registry);
        let (status, _) = get_json(router, "/b/sum/three/4").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn handler_errors_are_contained() {
        let registry = Arc::new(RouteRegistry::new());
        registry.add_for_plugin(
            "a",
            vec![entry(
                Method::GET,
                "/a/broken",
                Arc::new(
                    |_req: RouteRequest| -> Result<serde_json::Value, solstice_contracts::BoxError> {
                        Err("database is on fire".into())
                    },
                ),
            )],
        );

        let router = build_snapshot(&registry);
        let (status, body) = get_json(router, "/a/broken").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "plugin handler failed" }));
    }

    #[tokio::test]
    async fn rebuild_follows_registry_changes() {
        let registry = Arc::new(RouteRegistry::new());
        let dynamic = DynamicRouter::new(Arc::clone(&registry));

        // Nothing registered yet.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (status, _) = get_json(dynamic.snapshot(), "/a/ping").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        registry.add_for_plugin(
            "a",
            vec![entry(
                Method::GET,
                "/a/ping",
                Arc::new(|_req: RouteRequest| Ok(json!({ "pong": true }))),
            )],
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let (status, body) = get_json(dynamic.snapshot(), "/a/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "pong": true }));

        // Removal drops the route from the next snapshot.
        registry.remove_plugin("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (status, _) = get_json(dynamic.snapshot(), "/a/ping").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
