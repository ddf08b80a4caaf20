//! Queue-consuming worker shared by every in-process handler.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::handler::Handler;
use crate::request::Request;

/// Business logic of a handler. Called once per envelope, in queue order.
#[async_trait]
pub trait Process: Send + 'static {
    async fn process(&mut self, request: Request);
}

/// A running handler: a normal and a priority queue drained by one task.
#[derive(Debug, Clone)]
pub struct Worker {
    name: &'static str,
    intake: mpsc::Sender<Request>,
    priority: mpsc::Sender<Request>,
}

impl Worker {
    /// Spawns the consumer task on the current runtime.
    ///
    /// The priority queue is always drained before the normal one; within
    /// a queue requests are processed in the order they were sent. The task
    /// ends when `cancel` fires.
    #[must_use]
    pub fn spawn<P: Process>(
        name: &'static str,
        capacity: usize,
        mut processor: P,
        cancel: CancellationToken,
    ) -> Self {
        let (intake, mut normal_rx) = mpsc::channel::<Request>(capacity);
        let (priority, mut priority_rx) = mpsc::channel::<Request>(capacity);

        tokio::spawn(
            async move {
                tracing::debug!("worker started");
                loop {
                    let request = tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        Some(request) = priority_rx.recv() => request,
                        Some(request) = normal_rx.recv() => request,
                        else => break,
                    };
                    let span = request.log.clone();
                    processor.process(request).instrument(span).await;
                }
                tracing::debug!("worker stopped");
            }
            .instrument(tracing::info_span!("worker", handler = name)),
        );

        Self {
            name,
            intake,
            priority,
        }
    }
}

impl Handler for Worker {
    fn name(&self) -> &'static str {
        self.name
    }

    fn intake(&self) -> mpsc::Sender<Request> {
        self.intake.clone()
    }

    fn priority_intake(&self) -> Option<mpsc::Sender<Request>> {
        Some(self.priority.clone())
    }
}
