//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a single fallback ingest handler
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Bind server to listener and stop on the shutdown broadcast
//! - Dispatch requests through the live route table

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::config::ListenerConfig;
use crate::http::decode::{decode, Origin};
use crate::http::request::{request_id, UuidRequestId};
use crate::observability::metrics;
use crate::routing::{HandleError, LiveRoutes, Protocol};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveRoutes>,
    pub max_body_size: usize,
}

/// HTTP ingest server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ListenerConfig, live: Arc<LiveRoutes>) -> Self {
        let state = AppState {
            live,
            max_body_size: config.max_body_size,
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        Router::new()
            .fallback(ingest_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The configured router, for embedding or testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP ingest server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP ingest server stopped");
        Ok(())
    }
}

/// Ingest handler.
///
/// The route table snapshot taken here is held until the response is built,
/// so a concurrent reload never retires it mid-request.
async fn ingest_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let table = state.live.load();
    let path = request.uri().path().to_string();

    if table.is_health_check(&path) {
        metrics::record_request("health", 200, start);
        return StatusCode::OK.into_response();
    }

    let Some(handler) = table.resolve(&path) else {
        debug!(request_id = %request_id(request.headers()), path = %path, "No route matched");
        metrics::record_request("none", 404, start);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };
    let route = handler.name();

    if !matches!(*request.method(), Method::POST | Method::PUT) {
        metrics::record_request(route, 405, start);
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST, PUT")],
        )
            .into_response();
    }

    if let Err(e) = handler.authorize(request.headers()) {
        debug!(request_id = %request_id(request.headers()), route, error = %e, "Unauthorized");
        metrics::record_request(route, 401, start);
        return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
    }

    let body: Bytes = match axum::body::to_bytes(request.into_body(), state.max_body_size).await {
        Ok(body) => body,
        Err(e) => {
            debug!(route, error = %e, "Failed to read request body");
            metrics::record_request(route, 413, start);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let origin = Origin {
        tag: handler.tag(),
        src: addr.ip(),
        ts: SystemTime::now(),
    };
    let decoded = match decode(handler.protocol(), body, origin) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(route, error = %e, "Failed to decode request body");
            metrics::record_request(route, 400, start);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match handler.handle(decoded.batch) {
        Ok(_) => {
            metrics::record_request(route, 200, start);
            success_response(handler.protocol(), decoded.request_id)
        }
        Err(HandleError::Sink(e)) => {
            warn!(route, error = %e, "Sink unavailable");
            metrics::record_request(route, 503, start);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
        Err(HandleError::Stage(e)) => {
            warn!(route, error = %e, "Stage failed");
            metrics::record_request(route, 500, start);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn success_response(protocol: Protocol, request_id: Option<String>) -> Response {
    match protocol {
        Protocol::Std => StatusCode::OK.into_response(),
        Protocol::Hec => Json(json!({ "text": "Success", "code": 0 })).into_response(),
        Protocol::Firehose => {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            Json(json!({
                "requestId": request_id.unwrap_or_default(),
                "timestamp": timestamp,
            }))
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::pipeline::StageRegistry;
    use crate::routing::build_route_table;
    use crate::sink::{ChannelSink, MemorySink, Sink};
    use axum::extract::connect_info::MockConnectInfo;
    use std::net::{IpAddr, Ipv4Addr};
    use tower::ServiceExt;

    const CONFIG: &str = r#"
health_check_path = "/health"

[preprocessors.nodebug]
type = "regexdrop"
regex = "DEBUG"

[listeners.std.web]
url = "/web"
tag = "web"
preprocessors = ["nodebug"]

[listeners.std.locked]
url = "/locked"
tag = "locked"
auth = { type = "token", token = "s3cret" }

[listeners.hec.splunk]
tag = "hec"
token = "h"

[listeners.firehose.aws]
url = "/firehose"
tag = "fh"
access_key = "k"
"#;

    fn app(sink: Arc<dyn Sink>) -> Router {
        let config: GatewayConfig = toml::from_str(CONFIG).unwrap();
        let table = build_route_table(&config, &StageRegistry::with_builtins(), sink, 1).unwrap();
        let live = Arc::new(LiveRoutes::new(table));
        HttpServer::new(&config.listener, live)
            .router()
            .layer(MockConnectInfo(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)),
                40000,
            )))
    }

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri).body(Body::from(body)).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_std_ingest_runs_chain() {
        let sink = MemorySink::new();
        let response = app(Arc::new(sink.clone()))
            .oneshot(post("/web/", "DEBUG noise\nERROR boom\n"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(sink.payloads("web"), vec!["ERROR boom"]);
        let record = &sink.records("web")[0];
        assert_eq!(record.src(), IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
    }

    #[tokio::test]
    async fn test_health_and_missing_route() {
        let app = app(Arc::new(MemorySink::new()));
        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let missing = app.oneshot(post("/nope", "x")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_auth_and_method() {
        let sink = MemorySink::new();
        let app = app(Arc::new(sink.clone()));

        let denied = app.clone().oneshot(post("/locked", "x")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .clone()
            .oneshot(
                Request::put("/locked")
                    .header(header::AUTHORIZATION, "Bearer s3cret")
                    .body(Body::from("x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(sink.payloads("locked"), vec!["x"]);

        let get = app
            .oneshot(Request::get("/web").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_hec_response() {
        let sink = MemorySink::new();
        let response = app(Arc::new(sink.clone()))
            .oneshot(
                Request::post("/services/collector/event")
                    .header(header::AUTHORIZATION, "Splunk h")
                    .body(Body::from(r#"{"event":"a"}{"event":"b"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"text": "Success", "code": 0}));
        assert_eq!(sink.payloads("hec"), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_firehose_response_and_bad_body() {
        let sink = MemorySink::new();
        let app = app(Arc::new(sink.clone()));
        let response = app
            .clone()
            .oneshot(
                Request::post("/firehose")
                    .header("x-amz-firehose-access-key", "k")
                    .body(Body::from(r#"{"requestId":"r-9","records":[{"data":"aGk="}]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["requestId"], "r-9");
        assert!(body["timestamp"].as_u64().unwrap() > 0);
        assert_eq!(sink.payloads("fh"), vec!["hi"]);

        let bad = app
            .oneshot(
                Request::post("/firehose")
                    .header("x-amz-firehose-access-key", "k")
                    .body(Body::from("garbage"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_full_sink_is_unavailable() {
        let (sink, _rx) = ChannelSink::new(1);
        let app = app(Arc::new(sink));

        let first = app.clone().oneshot(post("/web", "one")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(post("/web", "two")).await.unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
