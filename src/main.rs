//! Ingest gateway
//!
//! Accepts log records over HTTP, runs them through per-listener
//! preprocessor chains and forwards them to the sink. Routes and
//! preprocessors are reloaded at runtime without dropping requests.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ LiveRoutes snapshot ──▶ Handler
//!                                                              │
//!                                      authorize → chain → sink ◀┘
//!
//!     gateway.toml + conf.d/*.toml
//!         │  (watcher, SIGHUP, admin API)
//!         ▼
//!     ReloadCoordinator: load → validate → build → publish → retire old
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use ingest_gateway::admin::{serve_admin, AdminState};
use ingest_gateway::config::{ConfigSource, ConfigWatcher};
use ingest_gateway::http::HttpServer;
use ingest_gateway::lifecycle::{reload_on_hangup, wait_for_shutdown, Shutdown};
use ingest_gateway::observability::{self, metrics};
use ingest_gateway::pipeline::StageRegistry;
use ingest_gateway::reload::{self, ReloadCoordinator};
use ingest_gateway::routing::{build_route_table, LiveRoutes};
use ingest_gateway::sink::{channel::drain, ChannelSink, MemorySink, Sink};

#[derive(Parser)]
#[command(name = "ingest-gateway")]
#[command(about = "Runtime-reconfigurable log ingestion gateway", long_about = None)]
struct Args {
    /// Main configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Overlay directory, overriding `reload.overlay_dir`
    #[arg(long)]
    overlay_dir: Option<PathBuf>,

    /// Disable the filesystem watcher
    #[arg(long)]
    no_watch: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut source = ConfigSource::new(&args.config);
    if let Some(dir) = &args.overlay_dir {
        source = source.with_overlay_dir(dir);
    }
    let config = source.load()?;
    let registry = StageRegistry::with_builtins();

    if args.check {
        let sink: Arc<dyn Sink> = Arc::new(MemorySink::new());
        let table = build_route_table(&config, &registry, sink, 1)?;
        println!(
            "{}: ok ({} routes, {} preprocessors)",
            source.path().display(),
            table.len(),
            config.preprocessors.len()
        );
        table.close();
        return Ok(());
    }

    observability::logging::init(&config.observability)?;
    if config.observability.metrics_enabled {
        metrics::init_metrics(&config.observability.metrics_address)?;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %source.path().display(),
        "ingest-gateway starting"
    );

    let shutdown = Shutdown::new();

    let (sink, batches) = ChannelSink::new(config.sink.capacity);
    let sink: Arc<dyn Sink> = Arc::new(sink);
    let drain_task = tokio::spawn(drain(batches, shutdown.subscribe()));

    let table = build_route_table(&config, &registry, sink.clone(), 1)?;
    info!(generation = 1, routes = table.len(), "Initial route table built");
    metrics::set_generation(1);
    let live = Arc::new(LiveRoutes::new(table));

    // Watcher failures at startup are fatal; later ones only disable auto reload.
    let (watcher, triggers) = if config.reload.watch && !args.no_watch {
        let overlay = source.overlay_dir(&config);
        let (watcher, triggers) = ConfigWatcher::new(
            Some(source.path()),
            overlay.as_deref(),
            Duration::from_millis(config.reload.quiet_period_ms),
        )?;
        (Some(watcher), Some(triggers))
    } else {
        info!("Config watcher disabled");
        (None, None)
    };

    let coordinator = Arc::new(ReloadCoordinator::new(
        source,
        registry,
        sink,
        live.clone(),
    ));
    let (reload_handle, requests) = reload::channel(16);
    let coordinator_task = tokio::spawn(coordinator.clone().run(
        requests,
        triggers,
        shutdown.subscribe(),
    ));
    tokio::spawn(reload_on_hangup(reload_handle.clone(), shutdown.subscribe()));

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(coordinator.clone(), reload_handle.clone(), &config.admin.api_key);
        Some(tokio::spawn(serve_admin(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    info!(address = %listener.local_addr()?, "Listening for connections");
    let server = HttpServer::new(&config.listener, live.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_shutdown().await;
    info!("Shutting down");
    shutdown.trigger();

    server_task.await??;
    if let Some(task) = admin_task {
        if let Err(e) = task.await? {
            warn!(error = %e, "Admin API stopped with error");
        }
    }
    coordinator_task.await?;
    if let Some(mut watcher) = watcher {
        watcher.close();
    }
    drain_task.await?;

    for e in live.load().close() {
        warn!(error = %e, "Stage failed to close");
    }

    info!("Shutdown complete");
    Ok(())
}
