//! # Solstice plugin host
//!
//! The lifecycle engine of the Solstice platform: it watches a directory
//! for native plugin libraries, loads each artifact into an isolated,
//! independently unloadable domain, and replaces live plugins in place
//! when their artifact changes.
//!
//! ## Architecture
//!
//! - **Domain** ([`domain`]): per-artifact load container. The artifact
//!   and its private dependencies are staged into a scratch directory so
//!   the watched file is never mapped and stays replaceable.
//! - **Debouncer** ([`debounce`]): coalesces bursty filesystem events per
//!   canonical path; only the latest event within the window survives.
//! - **Watcher** ([`watcher`]): normalizes raw filesystem notifications
//!   into reload/unload events for the engine.
//! - **Lifecycle** ([`lifecycle`]): owns the loaded-plugin registry and
//!   the pending-disposal queue, drives load, unload and hot-swap.
//! - **Bindings** ([`binding`]): the capability-specific steps. The
//!   console host binds [`Feature`](solstice_contracts::Feature) plugins;
//!   the web host supplies its own binding that publishes routes.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use solstice_host::{FeatureBinding, PluginHost, PluginHostConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = PluginHost::new(PluginHostConfig::default(), FeatureBinding);
//!     host.start()?;
//!
//!     // ... run ...
//!
//!     host.dispose();
//!     Ok(())
//! }
//! ```

pub mod binding;
pub mod config;
pub mod debounce;
pub mod disposal;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod path;
pub mod watcher;

pub use binding::{FeatureBinding, PluginBinding};
pub use config::PluginHostConfig;
pub use debounce::Debouncer;
pub use disposal::DisposalQueue;
pub use domain::PluginDomain;
pub use error::{HostError, HostResult};
pub use lifecycle::{PluginHandle, PluginHost};
pub use path::CanonicalKey;
pub use watcher::{ArtifactEvent, PluginWatcher};
