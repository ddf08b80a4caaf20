#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! HTTP boundary of SOMA.
//!
//! Every route turns into one request envelope: the adapter authorizes it
//! against the permission cache, hands it to the responsible handler and
//! serializes the reply. Middleware in front of the routes refuses traffic
//! during shutdown, assigns request ids and performs basic authentication.

pub mod adapter;
pub mod config;
pub mod context;
pub mod dto;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod send;
pub mod server;
pub mod state;
pub mod validate;

pub use config::{Mode, RestConfig, TlsConfig};
pub use error::RestError;
pub use metrics::Metrics;
pub use server::{ServerError, router, serve};
pub use state::AppState;
