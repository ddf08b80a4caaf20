//! SOMA server binary.
//!
//! Loads the configuration, starts the in-process handlers, replays the
//! built-in vocabulary and root account into the permission cache and
//! serves the REST boundary until interrupted.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use iam::{IamService, IamWorker};
use inventory::{InventoryService, InventoryWorker};
use perm_cache::{CacheUpdater, PermCache, catalog};
use rest_gateway::AppState;
use soma_msg::{Handler, HandlerMap, Request, Worker, handler_names};
use supervisor::{Service, SupervisorWorker};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use crate::config::{AppConfig, LogFormat, LoggingConfig, Overrides};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Queue depth of every handler.
const QUEUE_CAPACITY: usize = 1024;

/// How long start-up waits for the cache replay to be applied.
const REPLAY_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "soma-server", version, about = "SOMA configuration system server")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address, overrides `rest.bind_addr`
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Log filter directive, overrides `logging.level`
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Refuse every state-changing request
    #[arg(long)]
    read_only: bool,

    /// Read-only, and refuse supervisor writes
    #[arg(long)]
    observer: bool,
}

fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .with_context(|| format!("invalid log filter '{}'", cfg.level))?;
    let registry = tracing_subscriber::registry().with(filter);
    match cfg.format {
        LogFormat::Text => registry.with(fmt::layer().compact()).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true))
            .try_init()?,
    }
    Ok(())
}

/// Feeds the start-up events through the cache's intake and waits until
/// every one of them has been applied. Any rejected event aborts start-up.
async fn replay(cache: &Worker, events: Vec<Request>) -> Result<()> {
    let intake = cache.intake();
    let mut replies = Vec::with_capacity(events.len());
    for event in events {
        let (request, pending) = Request::new(Uuid::new_v4(), event.section, event.action);
        intake
            .send(request.with_payload(event.payload))
            .await
            .context("permission cache intake closed")?;
        replies.push(pending);
    }

    let count = replies.len();
    let mut rejected = 0_usize;
    for pending in replies {
        let reply = pending.wait(REPLAY_DEADLINE).await?;
        if !reply.is_success() {
            rejected += 1;
            tracing::error!(
                section = %reply.section,
                action = %reply.action,
                code = reply.code,
                error = reply.error.as_deref().unwrap_or_default(),
                "start-up event rejected"
            );
        }
    }
    if rejected > 0 {
        bail!("cache replay failed: {rejected} of {count} events rejected");
    }
    tracing::info!(events = count, "permission cache bootstrapped");
    Ok(())
}

fn spawn_handlers(cfg: &AppConfig, cache: &Arc<PermCache>, cancel: &CancellationToken) -> (HandlerMap, Worker) {
    let updater = Worker::spawn(
        handler_names::PERMISSION_CACHE,
        QUEUE_CAPACITY,
        CacheUpdater::new(cache.clone()),
        cancel.clone(),
    );

    let mut handlers = HandlerMap::new();
    handlers.add(Arc::new(updater.clone()));
    handlers.add(Arc::new(Worker::spawn(
        handler_names::SUPERVISOR,
        QUEUE_CAPACITY,
        SupervisorWorker::new(Arc::new(Service::from_config(&cfg.supervisor))),
        cancel.clone(),
    )));
    handlers.add(Arc::new(Worker::spawn(
        handler_names::IAM,
        QUEUE_CAPACITY,
        IamWorker::new(IamService::new(cache.clone())),
        cancel.clone(),
    )));
    handlers.add(Arc::new(Worker::spawn(
        handler_names::INVENTORY,
        QUEUE_CAPACITY,
        InventoryWorker::new(InventoryService::new(cache.clone())),
        cancel.clone(),
    )));
    (handlers, updater)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let overrides = Overrides {
        config: args.config,
        bind_addr: args.bind,
        log_level: args.log_level,
        read_only: args.read_only,
        observer: args.observer,
    };
    let cfg = config::load(&overrides).context("failed to load configuration")?;
    init_logging(&cfg.logging)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = cfg.rest.mode().as_str(),
        "starting soma-server"
    );
    if cfg.rest.open_instance {
        tracing::warn!("open instance: authentication and authorization are disabled");
    }

    let cache = Arc::new(PermCache::new());
    let workers = CancellationToken::new();
    let (handlers, updater) = spawn_handlers(&cfg, &cache, &workers);
    replay(&updater, catalog::bootstrap(&cfg.bootstrap.root_account())).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "cannot listen for interrupts");
                return;
            }
            tracing::info!("interrupt received");
            shutdown.cancel();
        }
    });

    let state = AppState::new(cfg.rest, handlers, cache);
    let served = rest_gateway::serve(state, shutdown).await;
    // Handlers stop only after in-flight requests have drained.
    workers.cancel();
    served.context("REST server failed")?;
    tracing::info!("soma-server stopped");
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use perm_cache::catalog::RootAccount;
    use soma_msg::{Action, Payload, Section, proto};

    fn updater(cache: &Arc<PermCache>, cancel: &CancellationToken) -> Worker {
        Worker::spawn(
            handler_names::PERMISSION_CACHE,
            QUEUE_CAPACITY,
            CacheUpdater::new(cache.clone()),
            cancel.clone(),
        )
    }

    fn root() -> RootAccount {
        RootAccount {
            user_id: "u-root".to_owned(),
            user_name: "root".to_owned(),
            team_id: "t-root".to_owned(),
            team_name: "wheel".to_owned(),
        }
    }

    #[tokio::test]
    async fn replay_applies_every_event() {
        let cache = Arc::new(PermCache::new());
        let cancel = CancellationToken::new();
        let worker = updater(&cache, &cancel);

        replay(&worker, catalog::bootstrap(&root())).await.unwrap();
        assert!(cache.read(|d| d.teams().get_by_id("t-root").is_some()));
        cancel.cancel();
    }

    #[tokio::test]
    async fn rejected_event_before_the_last_aborts_replay() {
        let cache = Arc::new(PermCache::new());
        let cancel = CancellationToken::new();
        let worker = updater(&cache, &cancel);

        let mut events = catalog::bootstrap(&root());
        let orphan = Request::cache_update(
            Section::NodeConfig,
            Action::Assign,
            Payload::NodeConfig(proto::NodeConfig {
                node_id: "n-missing".to_owned(),
                repository_id: "r-missing".to_owned(),
                bucket_id: "b-missing".to_owned(),
            }),
        );
        events.insert(1, orphan);

        let err = replay(&worker, events).await.unwrap_err();
        assert!(err.to_string().contains("1 of"), "{err}");
        cancel.cancel();
    }
}
