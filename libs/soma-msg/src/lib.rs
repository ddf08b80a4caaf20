//! SOMA message fabric.
//!
//! Every REST adapter builds a [`Request`] envelope, hands it to the handler
//! returned by [`HandlerMap::must_lookup`] and awaits the [`Reply`] on the
//! envelope's one-shot reply channel. Handlers never see HTTP.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod duration;
pub mod handler;
pub mod proto;
pub mod reply;
pub mod request;
pub mod section;
pub mod worker;

pub use handler::{Handler, HandlerMap, RegistryError, handler_names, route};
pub use reply::{AuditTrail, Body, Reply, SupervisorReply, codes};
pub use request::{
    Authorization, ObjectIds, Payload, Pending, ReplyError, Request, Supervisor, SupervisorTask,
};
pub use section::{Action, Category, ParseNameError, Section, SubjectKind};
pub use worker::{Process, Worker};
