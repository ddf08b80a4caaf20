//! Shared state handed to every middleware and adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use perm_cache::PermCache;
use soma_msg::HandlerMap;

use crate::config::RestConfig;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RestConfig>,
    pub handlers: Arc<HandlerMap>,
    pub cache: Arc<PermCache>,
    pub metrics: Arc<Metrics>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("shutting_down", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

impl AppState {
    #[must_use]
    pub fn new(config: RestConfig, handlers: HandlerMap, cache: Arc<PermCache>) -> Self {
        Self {
            config: Arc::new(config),
            handlers: Arc::new(handlers),
            cache,
            metrics: Arc::new(Metrics::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every new request answer 503. Set before the listener stops.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
