//! Handler registry.
//!
//! The map is filled once during start-up and shared read-only afterwards.
//! [`HandlerMap::must_lookup`] is the single place that knows which handler
//! serves a (section, action) tuple.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::request::Request;
use crate::section::{Action, Section};

/// Symbolic names of the in-process handlers.
pub mod handler_names {
    pub const SUPERVISOR: &str = "supervisor";
    pub const IAM: &str = "iam";
    pub const INVENTORY: &str = "inventory";
    pub const PERMISSION_CACHE: &str = "permission_cache";
}

/// Something that consumes request envelopes.
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Normal queue.
    fn intake(&self) -> mpsc::Sender<Request>;

    /// Queue drained ahead of [`Handler::intake`], if the handler has one.
    fn priority_intake(&self) -> Option<mpsc::Sender<Request>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no handler implements {section}::{action}")]
    NotImplemented { section: Section, action: Action },

    #[error("handler '{0}' is not registered")]
    Unavailable(&'static str),
}

#[derive(Default, Clone)]
pub struct HandlerMap {
    handlers: HashMap<&'static str, Arc<dyn Handler>>,
}

impl fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort_unstable();
        f.debug_struct("HandlerMap").field("handlers", &names).finish()
    }
}

impl HandlerMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its own name, replacing any previous one.
    pub fn add(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.name(), handler);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Resolves the queue that must receive `request`.
    ///
    /// System operations go to the priority queue of their handler when it
    /// has one.
    ///
    /// # Errors
    /// [`RegistryError::NotImplemented`] for tuples no handler serves and
    /// [`RegistryError::Unavailable`] when the responsible handler is not
    /// registered.
    pub fn must_lookup(&self, request: &Request) -> Result<mpsc::Sender<Request>, RegistryError> {
        let name = route(request.section, request.action).ok_or(RegistryError::NotImplemented {
            section: request.section,
            action: request.action,
        })?;
        let handler = self.get(name).ok_or(RegistryError::Unavailable(name))?;

        if request.section == Section::System
            && let Some(priority) = handler.priority_intake()
        {
            return Ok(priority);
        }
        Ok(handler.intake())
    }
}

/// Static routing table from (section, action) to a handler name.
#[must_use]
pub fn route(section: Section, action: Action) -> Option<&'static str> {
    use handler_names::{IAM, INVENTORY, SUPERVISOR};

    let name = match (section, action) {
        (
            Section::Supervisor,
            Action::Authenticate
            | Action::Kex
            | Action::Token
            | Action::Password
            | Action::Activate
            | Action::Invalidate,
        ) => SUPERVISOR,

        // Every system request reaches the handler; unknown operations are
        // rejected there and masked by the serializer.
        (Section::System, _) => INVENTORY,

        (Section::Category, Action::List | Action::Show | Action::Add | Action::Remove)
        | (
            Section::Section | Section::Action,
            Action::List | Action::Show | Action::Search | Action::Add | Action::Remove,
        )
        | (
            Section::Permission,
            Action::List
            | Action::Show
            | Action::Search
            | Action::Add
            | Action::Remove
            | Action::Map
            | Action::Unmap,
        )
        | (Section::Right, Action::List | Action::Show | Action::Grant | Action::Revoke)
        | (
            Section::Team,
            Action::List
            | Action::Show
            | Action::Search
            | Action::Add
            | Action::Remove
            | Action::Update,
        )
        | (
            Section::User,
            Action::List
            | Action::Show
            | Action::Search
            | Action::Add
            | Action::Remove
            | Action::Purge
            | Action::Update,
        )
        | (
            Section::Admin | Section::Tool,
            Action::List | Action::Show | Action::Add | Action::Remove,
        ) => IAM,

        (
            Section::Repository,
            Action::List
            | Action::Show
            | Action::Search
            | Action::Create
            | Action::Destroy
            | Action::Tree,
        )
        | (
            Section::Bucket | Section::Cluster | Section::Group,
            Action::List | Action::Show | Action::Create | Action::Destroy,
        )
        | (
            Section::Node | Section::Monitoring,
            Action::List | Action::Show | Action::Search | Action::Add | Action::Remove,
        )
        | (Section::NodeConfig, Action::Assign | Action::Unassign) => INVENTORY,

        _ => return None,
    };
    Some(name)
}
