//! The lock around the cache data.

use parking_lot::RwLock;
use soma_msg::{Action, Payload, Request, Section};

use crate::domain::data::CacheData;
use crate::domain::dispatch;
use crate::domain::error::CacheError;
use crate::domain::evaluator::{self, Decision};

/// Permission cache shared by every handler and adapter.
///
/// Mutations take the write lock for the whole event; authorization takes
/// the read lock. There is exactly one lock, so there is no lock order.
#[derive(Debug, Default)]
pub struct PermCache {
    data: RwLock<CacheData>,
}

impl PermCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the update event carried by `request`.
    ///
    /// # Errors
    /// See [`dispatch::apply`].
    pub fn perform(&self, request: &Request) -> Result<(), CacheError> {
        self.apply(request.section, request.action, &request.payload)
    }

    /// Applies one update event without an envelope.
    ///
    /// # Errors
    /// See [`dispatch::apply`].
    #[tracing::instrument(skip(self, payload))]
    pub fn apply(&self, section: Section, action: Action, payload: &Payload) -> Result<(), CacheError> {
        let mut data = self.data.write();
        dispatch::apply(&mut data, section, action, payload)
    }

    /// Runs several primitives under one write lock.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut CacheData) -> R) -> R {
        let mut data = self.data.write();
        f(&mut data)
    }

    pub fn read<R>(&self, f: impl FnOnce(&CacheData) -> R) -> R {
        let data = self.data.read();
        f(&data)
    }

    /// Decides the request's [`soma_msg::Authorization`] block.
    #[must_use]
    pub fn authorize(&self, request: &Request) -> Decision {
        let data = self.data.read();
        let decision = evaluator::evaluate(&data, &request.auth);
        drop(data);
        tracing::debug!(
            parent: &request.log,
            subject = %request.auth.subject,
            section = %request.auth.section,
            action = %request.auth.action,
            verdict = decision.verdict.as_str(),
            "authorization decided"
        );
        decision
    }

    /// Repository containing a bucket.
    #[must_use]
    pub fn bucket_repository(&self, bucket_id: &str) -> Option<String> {
        self.read(|d| d.objects().get_bucket_repository(bucket_id).map(str::to_owned))
    }

    /// Bucket a cluster, group or node is placed in.
    #[must_use]
    pub fn member_bucket(&self, object_id: &str) -> Option<String> {
        self.read(|d| d.objects().get_member_bucket(object_id).map(str::to_owned))
    }

    /// Team owning a repository, node or monitoring system.
    #[must_use]
    pub fn object_team(&self, object_id: &str) -> Option<String> {
        self.read(|d| d.objects().get_team(object_id).map(str::to_owned))
    }

    /// Id of a login, by name.
    #[must_use]
    pub fn user_id(&self, user_name: &str) -> Option<String> {
        self.read(|d| d.users().get_by_name(user_name).map(|u| u.id.clone()))
    }
}
