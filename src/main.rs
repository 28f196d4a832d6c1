//! authgate: forward-authorization decision service.
//!
//! A gateway forwards each request's host, method, URI and Authorization
//! header here; authgate answers allow/deny plus the resolved username.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────┐
//!                    │                 AUTHGATE                   │
//!   auth_request     │  ┌──────┐   ┌──────────────┐   ┌────────┐ │
//!   ─────────────────┼─▶│ http │──▶│ coordinator  │──▶│ router │ │
//!                    │  └──────┘   │ (overrides)  │   └───┬────┘ │
//!                    │             └──────────────┘       │      │
//!   decision         │        ┌────────────┐   ┌──────────▼────┐ │
//!   ◀────────────────┼────────│  identity  │◀──│ bound rule    │ │
//!                    │        │ (JWT)      │   │ (expression)  │ │
//!                    │        └────────────┘   └───────────────┘ │
//!                    │  ┌─────────────────────────────────────┐  │
//!                    │  │ config: settings, rule document,    │  │
//!                    │  │ watcher → new snapshot → ArcSwap    │  │
//!                    │  └─────────────────────────────────────┘  │
//!                    └───────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use authgate::config::{self, AccessSystem};
use authgate::expr::Registry;
use authgate::http::AuthServer;
use authgate::identity::IdentityResolver;
use authgate::observability::{logging, metrics};
use authgate::rules::{DecisionCoordinator, EngineSnapshot};

#[derive(Debug, Parser)]
#[command(name = "authgate", about = "Forward-authorization decision service")]
struct Args {
    /// Path to the service settings file (TOML).
    #[arg(long, short, default_value = "authgate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let settings = config::load_settings(&args.config)?;
    logging::init(&settings.observability.log_level);

    tracing::info!(
        config = %args.config.display(),
        document = %settings.document.path.display(),
        bind_address = %settings.listener.bind_address,
        "authgate starting"
    );

    let registry = Arc::new(Registry::standard());
    let resolver = config::build_resolver(&settings.jwt)?.map(Arc::new);

    // First snapshot must compile; starting without one would fail open
    // or closed arbitrarily.
    let document = config::load_document(&settings.document.path)?;
    let snapshot = EngineSnapshot::build(&document, resolver.clone(), registry.clone())?;
    let coordinator = Arc::new(DecisionCoordinator::new(snapshot));
    tracing::info!(
        owner = %document.owner,
        host_groups = document.host_groups.len(),
        "rule document loaded"
    );

    // Hot reload: the watcher parses documents, this task compiles and
    // publishes them. A document that fails to compile is dropped and the
    // live snapshot stays.
    let _watcher = if settings.document.watch {
        let (watcher, update_rx) = config::DocumentWatcher::new(&settings.document.path);
        let guard = watcher.run()?;
        tokio::spawn(reload_loop(
            update_rx,
            coordinator.clone(),
            resolver.clone(),
            registry.clone(),
        ));
        Some(guard)
    } else {
        None
    };

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&settings.listener.bind_address).await?;
    let server = AuthServer::new(coordinator, &settings.listener);
    server.run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn reload_loop(
    mut update_rx: mpsc::UnboundedReceiver<AccessSystem>,
    coordinator: Arc<DecisionCoordinator>,
    resolver: Option<Arc<IdentityResolver>>,
    registry: Arc<Registry>,
) {
    while let Some(document) = update_rx.recv().await {
        match EngineSnapshot::build(&document, resolver.clone(), registry.clone()) {
            Ok(snapshot) => coordinator.install(snapshot),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "new rule document failed to compile; keeping current snapshot"
                );
            }
        }
    }
}
