//! Sample endpoint module. Drop the built library into the watched
//! plugin directory and the host serves `/ping/status` and
//! `/ping/sum/{x:int}/{y:int}`.

use std::sync::Arc;

use serde_json::json;
use solstice_contracts::{BoxError, EndpointModule, RouteRequest, RouteTable};

#[derive(Default)]
pub struct PingRoutes;

impl EndpointModule for PingRoutes {
    fn register(&self, routes: &mut dyn RouteTable) -> Result<(), BoxError> {
        routes.add_get(
            "/ping/status",
            Arc::new(|_req: RouteRequest| Ok(json!({ "pong": true }))),
        );

        routes.add_get(
            "/ping/sum/{x:int}/{y:int}",
            Arc::new(
                |req: RouteRequest| -> Result<serde_json::Value, BoxError> {
                    let x = req.params().require_i64("x")?;
                    let y = req.params().require_i64("y")?;
                    Ok(json!({ "sum": x + y }))
                },
            ),
        );

        Ok(())
    }

    fn dispose(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

solstice_contracts::export_endpoint_module!(PingRoutes);
