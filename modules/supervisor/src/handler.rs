//! `supervisor` handler.

use std::sync::Arc;

use async_trait::async_trait;
use soma_msg::{Process, Reply, Request, SupervisorReply};

use crate::Service;

pub struct SupervisorWorker {
    service: Arc<Service>,
}

impl SupervisorWorker {
    #[must_use]
    pub const fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Process for SupervisorWorker {
    async fn process(&mut self, mut request: Request) {
        let reply = Reply::for_request(&request);
        let reply = match self.service.handle(&request) {
            Ok(outcome) => reply.ok(None).with_supervisor(outcome),
            Err(err) => {
                tracing::info!(task = ?request.supervisor.task, error = %err, "supervisor task refused");
                let code = err.code();
                reply.fail(code, err.to_string()).with_supervisor(SupervisorReply {
                    verdict: code,
                    ..SupervisorReply::default()
                })
            }
        };
        request.reply(reply);
    }
}
