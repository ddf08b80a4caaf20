//! Permission cache and authorization engine.
//!
//! An in-memory copy of every identity, permission and grant, kept current
//! by a stream of update events and queried once per request before any
//! business logic runs.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod cache;
pub mod catalog;
pub mod domain;
pub mod handler;

pub use cache::PermCache;
pub use domain::data::CacheData;
pub use domain::error::CacheError;
pub use domain::evaluator::{AUTHORIZE_KEY, Decision, OMNIPOTENCE_ID, Verdict};
pub use domain::grants::{Assessment, Scope};
pub use handler::CacheUpdater;
