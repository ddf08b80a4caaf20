#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static supervisor
//!
//! Development grade credential authority. Accounts come from configuration,
//! tokens are minted in memory and encrypted payloads are plain UTF-8 JSON.
//!
//! ## Configuration
//!
//! ```yaml
//! supervisor:
//!   tokens:
//!     root: "s3cr3t-root-token"
//!     admin_ops: "s3cr3t-admin-token"
//!   activation:
//!     pending: ["carol"]
//!     min_password_length: 12
//!   kex_ttl: 5m
//! ```

pub mod config;
pub mod domain;
pub mod handler;

pub use config::SupervisorConfig;
pub use domain::error::SupervisorError;
pub use domain::service::Service;
pub use handler::SupervisorWorker;
