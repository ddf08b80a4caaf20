//! `permission_cache` handler: applies update events from its intake.

use std::sync::Arc;

use async_trait::async_trait;
use soma_msg::{Process, Reply, Request};

use crate::PermCache;

pub struct CacheUpdater {
    cache: Arc<PermCache>,
}

impl CacheUpdater {
    #[must_use]
    pub const fn new(cache: Arc<PermCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Process for CacheUpdater {
    async fn process(&mut self, mut request: Request) {
        let result = self.cache.perform(&request);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "cache update rejected");
        }
        if request.expects_reply() {
            let reply = Reply::for_request(&request);
            let reply = match result {
                Ok(()) => reply.ok(None),
                Err(err) => reply.fail(err.code(), err.to_string()),
            };
            request.reply(reply);
        }
    }
}
