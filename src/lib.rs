//! Library crate backing the `prism-daemon` binary, split out so integration
//! tests can drive the real [`axum::Router`] in-process via `tower::ServiceExt::oneshot`.

pub mod config;
pub mod error;
pub mod indexer;
pub mod lang;
pub mod metrics;
pub mod probe;
pub mod routes;
pub mod server;
pub mod state;
pub mod walker;
pub mod watcher;
