use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::admin::AdminState;
use crate::reload::{ReloadError, ReloadOrigin, ReloadState, ReloadStatus};
use crate::routing::Protocol;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub generation: u64,
    pub reload_state: ReloadState,
    pub reload: ReloadStatus,
}

#[derive(Serialize)]
pub struct RouteInfo {
    pub protocol: Protocol,
    pub path: String,
    pub listener: String,
    pub tag: String,
    pub auth: &'static str,
    pub preprocessors: Vec<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let coordinator = &state.coordinator;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        generation: coordinator.live().generation(),
        reload_state: coordinator.state(),
        reload: coordinator.status(),
    })
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<Vec<RouteInfo>> {
    let table = state.coordinator.live().load();
    let routes = table
        .route_keys()
        .into_iter()
        .filter_map(|key| {
            let handler = table.lookup(key)?;
            Some(RouteInfo {
                protocol: key.protocol,
                path: key.path.clone(),
                listener: handler.name().to_string(),
                tag: handler.tag().to_string(),
                auth: handler.auth().scheme(),
                preprocessors: handler.chain().names().map(String::from).collect(),
            })
        })
        .collect();
    Json(routes)
}

/// Reload and wait for the outcome.
pub async fn post_reload(State(state): State<AdminState>) -> impl IntoResponse {
    match state.reload.request(ReloadOrigin::Admin).await {
        Ok(generation) => (
            StatusCode::OK,
            Json(json!({ "status": "reloaded", "generation": generation })),
        ),
        Err(e) => {
            let status = match *e {
                ReloadError::InProgress => StatusCode::CONFLICT,
                ReloadError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (
                status,
                Json(json!({
                    "status": "failed",
                    "error": e.to_string(),
                    "generation": state.coordinator.live().generation(),
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::setup_admin_router;
    use crate::config::{load_config, ConfigSource};
    use crate::pipeline::StageRegistry;
    use crate::reload::{channel, ReloadCoordinator};
    use crate::routing::{build_route_table, LiveRoutes};
    use crate::sink::{MemorySink, Sink};
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    const CONFIG: &str = r#"
[preprocessors.nodebug]
type = "regexdrop"
regex = "DEBUG"

[listeners.std.web]
url = "/web"
tag = "web"
preprocessors = ["nodebug"]
auth = { type = "token", token = "t" }
"#;

    struct Fixture {
        dir: TempDir,
        app: Router,
        _shutdown: broadcast::Sender<()>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(&path, CONFIG).unwrap();

        let registry = StageRegistry::with_builtins();
        let sink: Arc<dyn Sink> = Arc::new(MemorySink::new());
        let table = build_route_table(&load_config(&path).unwrap(), &registry, sink.clone(), 1).unwrap();
        let live = Arc::new(LiveRoutes::new(table));
        let coordinator = Arc::new(ReloadCoordinator::new(
            ConfigSource::new(&path),
            registry,
            sink,
            live,
        ));

        let (handle, requests) = channel(4);
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(coordinator.clone().run(requests, None, shutdown_rx));

        let app = setup_admin_router(AdminState::new(coordinator, handle, "admin-key"));
        Fixture {
            dir,
            app,
            _shutdown: shutdown,
        }
    }

    fn request(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_requires_api_key() {
        let f = fixture();
        let missing = f
            .app
            .clone()
            .oneshot(request("GET", "/admin/status", None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = f
            .app
            .oneshot(request("GET", "/admin/status", Some("nope")))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_routes() {
        let f = fixture();
        let status = f
            .app
            .clone()
            .oneshot(request("GET", "/admin/status", Some("admin-key")))
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::OK);
        let body = json_body(status).await;
        assert_eq!(body["generation"], 1);
        assert_eq!(body["reload_state"], "idle");

        let routes = f
            .app
            .oneshot(request("GET", "/admin/routes", Some("admin-key")))
            .await
            .unwrap();
        let body = json_body(routes).await;
        assert_eq!(body[0]["protocol"], "std");
        assert_eq!(body[0]["path"], "/web");
        assert_eq!(body[0]["auth"], "bearer");
        assert_eq!(body[0]["preprocessors"], json!(["nodebug"]));
    }

    #[tokio::test]
    async fn test_reload_endpoint() {
        let f = fixture();
        let ok = f
            .app
            .clone()
            .oneshot(request("POST", "/admin/reload", Some("admin-key")))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(json_body(ok).await["generation"], 2);

        fs::write(f.dir.path().join("gateway.toml"), "[listeners.std.web]\nurl = 'web'\ntag = ''\n").unwrap();
        let failed = f
            .app
            .oneshot(request("POST", "/admin/reload", Some("admin-key")))
            .await
            .unwrap();
        assert_eq!(failed.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(failed).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["generation"], 2);
    }
}
