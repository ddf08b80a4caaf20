//! Identity and access management.
//!
//! Serves the permission vocabulary, permissions, rights, teams and logins.
//! Reads come from the permission cache; writes are validated here and then
//! applied through the cache's update dispatcher.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod convert;
pub mod error;
pub mod handler;
pub mod service;

pub use error::IamError;
pub use handler::IamWorker;
pub use service::IamService;
