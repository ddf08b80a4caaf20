//! `iam` handler.

use async_trait::async_trait;
use soma_msg::{Process, Reply, Request};

use crate::IamService;

pub struct IamWorker {
    service: IamService,
}

impl IamWorker {
    #[must_use]
    pub const fn new(service: IamService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Process for IamWorker {
    async fn process(&mut self, mut request: Request) {
        let reply = Reply::for_request(&request);
        let reply = match self.service.handle(&request) {
            Ok(body) => reply.ok(body),
            Err(err) => {
                tracing::info!(code = err.code(), error = %err, "iam request refused");
                reply.fail(err.code(), err.to_string())
            }
        };
        request.reply(reply);
    }
}
