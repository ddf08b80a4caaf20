//! Inventory of the object tree.
//!
//! Repositories hold buckets, buckets hold clusters and groups, nodes are
//! owned by a team and may be assigned into one bucket. Every change is
//! mirrored into the permission cache so that authorization sees the same
//! tree. Administrative `system` operations arrive on the priority intake.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod error;
pub mod handler;
pub mod service;
pub mod store;

pub use error::InventoryError;
pub use handler::InventoryWorker;
pub use service::{Handled, InventoryService};
pub use store::Inventory;
