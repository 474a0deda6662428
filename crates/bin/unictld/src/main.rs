//! # unictld — unictl daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`unictl.toml` plus `UNICTL_*` environment overrides)
//! - Initialise structured logging
//! - Open the `SQLite` pool and run migrations
//! - Construct the host integration, script runtime, scheduler and services
//! - Restore persisted entities and arm their timers
//! - Build the axum router and serve until SIGTERM/SIGINT
//! - On shutdown, cancel every timer and flush pending writes
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod host;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use unictl_adapter_http_axum::state::AppState;
use unictl_adapter_script_rhai::RhaiRuntime;
use unictl_app::event_bus::InProcessEventBus;
use unictl_app::execution_context::{ActionHandle, ContextBuilder};
use unictl_app::outbox::Outbox;
use unictl_app::registry::EntityRegistry;
use unictl_app::scheduler::Scheduler;
use unictl_app::services::entity_service::EntityService;

use crate::config::Config;
use crate::host::Host;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = unictl_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let store = Arc::new(db.entity_store());

    // Events and ordered persistence
    let event_bus = Arc::new(InProcessEventBus::new(config.events.capacity));
    let (outbox, _writer) = Outbox::spawn(Arc::clone(&store), Arc::clone(&event_bus));

    // Scripts
    let host = Arc::new(Host::from_config(config.integrations.virtual_enabled));
    tracing::info!(host = host.name(), "host integration selected");
    let contexts = ContextBuilder::new(
        Arc::clone(&host),
        ActionHandle::from_invoker(Arc::clone(&host)),
    );
    let runtime = RhaiRuntime::new(config.script.max_operations);
    let scheduler = Scheduler::new(
        Arc::new(EntityRegistry::default()),
        outbox,
        contexts,
        runtime,
        config.scheduler_config(),
    );

    // Services
    let entity_service = Arc::new(EntityService::new(store, scheduler));
    entity_service
        .restore()
        .await
        .context("failed to restore entities")?;

    // HTTP
    let state = AppState::new(Arc::clone(&entity_service), event_bus);
    let app = unictl_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("unictld listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutting down");
    entity_service.shutdown().await;
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
