//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

use ingest_gateway::config::ConfigSource;
use ingest_gateway::lifecycle::Shutdown;
use ingest_gateway::pipeline::StageRegistry;
use ingest_gateway::reload::{self, ReloadCoordinator, ReloadHandle};
use ingest_gateway::routing::{build_route_table, LiveRoutes};
use ingest_gateway::sink::{MemorySink, Sink};
use ingest_gateway::HttpServer;

/// Minimal valid configuration with one std listener at `/web`.
pub const BASE_CONFIG: &str = r#"
health_check_path = "/health"

[preprocessors.nodebug]
type = "regexdrop"
regex = "DEBUG"

[listeners.std.web]
url = "/web"
tag = "web"
preprocessors = ["nodebug"]
"#;

/// A temporary directory holding `gateway.toml` and a `conf.d` overlay dir.
pub struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    pub fn new(main: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("conf.d")).unwrap();
        let this = Self { dir };
        this.write_main(main);
        this
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn main_path(&self) -> PathBuf {
        self.dir.path().join("gateway.toml")
    }

    pub fn overlay_dir(&self) -> PathBuf {
        self.dir.path().join("conf.d")
    }

    pub fn source(&self) -> ConfigSource {
        ConfigSource::new(self.main_path()).with_overlay_dir(self.overlay_dir())
    }

    pub fn write_main(&self, contents: &str) {
        fs::write(self.main_path(), contents).unwrap();
    }

    pub fn write_overlay(&self, name: &str, contents: &str) {
        fs::write(self.overlay_dir().join(name), contents).unwrap();
    }

    pub fn remove_overlay(&self, name: &str) {
        fs::remove_file(self.overlay_dir().join(name)).unwrap();
    }
}

/// Generation 1 built from `dir`, plus a coordinator over it.
pub fn coordinator(dir: &ConfigDir, sink: MemorySink) -> Arc<ReloadCoordinator> {
    let source = dir.source();
    let config = source.load().unwrap();
    let registry = StageRegistry::with_builtins();
    let sink: Arc<dyn Sink> = Arc::new(sink);
    let table = build_route_table(&config, &registry, sink.clone(), 1).unwrap();
    let live = Arc::new(LiveRoutes::new(table));
    Arc::new(ReloadCoordinator::new(source, registry, sink, live))
}

/// A running ingest server with its coordinator task.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub coordinator: Arc<ReloadCoordinator>,
    pub reload: ReloadHandle,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub async fn start(dir: &ConfigDir, sink: MemorySink) -> Self {
        let coordinator = coordinator(dir, sink);
        let shutdown = Shutdown::new();

        let (reload, requests) = reload::channel(8);
        tokio::spawn(coordinator.clone().run(requests, None, shutdown.subscribe()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = dir.source().load().unwrap();
        let server = HttpServer::new(&config.listener, coordinator.live().clone());
        tokio::spawn(server.run(listener, shutdown.subscribe()));

        Self {
            addr,
            coordinator,
            reload,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
