//! Admin API.
//!
//! Bearer-token protected endpoints for inspecting the live configuration
//! generation and requesting a reload.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::reload::{ReloadCoordinator, ReloadHandle};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub coordinator: Arc<ReloadCoordinator>,
    pub reload: ReloadHandle,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(coordinator: Arc<ReloadCoordinator>, reload: ReloadHandle, api_key: &str) -> Self {
        Self {
            coordinator,
            reload,
            api_key: Arc::from(api_key),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/reload", post(post_reload))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

/// Serve the admin API until the shutdown broadcast fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
