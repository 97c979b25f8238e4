//! Mutable endpoint data source for plugin-published HTTP routes.
//!
//! The registry exposes two faces:
//!
//! - **Plugin-facing**: [`PluginRouteTable`] implements the contracts
//!   [`RouteTable`](solstice_contracts::RouteTable) and collects the routes
//!   of one `register` call so they become visible as a single snapshot
//!   change.
//! - **Router-facing**: [`RouteRegistry::endpoints`] returns a flat
//!   snapshot and [`RouteRegistry::change_token`] a single-shot signal
//!   whose expiry tells the router to rebuild its route table. Consumers
//!   must take the token *before* reading the endpoint list and re-read
//!   both when it fires.

pub mod entry;
pub mod pattern;
pub mod registry;
pub mod table;
pub mod token;

pub use entry::{RouteEntry, DISPLAY_LABEL_PREFIX};
pub use pattern::{ParamKind, PatternError, RoutePattern, Segment};
pub use registry::RouteRegistry;
pub use table::{CommittedRoutes, PluginRouteTable, RoutingError};
pub use token::ChangeToken;
