//! `inventory` handler.

use async_trait::async_trait;
use soma_msg::{Process, Reply, Request};

use crate::{Handled, InventoryService};

pub struct InventoryWorker {
    service: InventoryService,
}

impl InventoryWorker {
    #[must_use]
    pub const fn new(service: InventoryService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Process for InventoryWorker {
    async fn process(&mut self, mut request: Request) {
        let reply = Reply::for_request(&request);
        let reply = match self.service.handle(&request) {
            Ok(Handled {
                body,
                job_id: Some(job_id),
            }) => reply.accepted(job_id, body),
            Ok(Handled { body, job_id: None }) => reply.ok(body),
            Err(err) => {
                tracing::info!(code = err.code(), error = %err, "inventory request refused");
                reply.fail(err.code(), err.to_string())
            }
        };
        request.reply(reply);
    }
}
