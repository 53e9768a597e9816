//! Management API router — mounts all endpoints under /api/v1.

use crate::auth;
use crate::catalog::InMemoryCatalog;
use crate::handlers::{self, ManagementState};
use crate::session::SessionStore;
use crate::store::ExperimentStore;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use clickpilot_core::{AppConfig, CoreResult, VideoCatalog};
use std::sync::Arc;

impl ManagementState {
    /// Build the in-memory stores described by `config`.
    pub fn from_config(config: &AppConfig) -> CoreResult<Self> {
        let catalog: Arc<dyn VideoCatalog> = Arc::new(InMemoryCatalog::with_demo_videos());
        let store = if config.store.seed_demo_data {
            ExperimentStore::with_demo_data(catalog, Utc::now())?
        } else {
            ExperimentStore::new(catalog)
        }
        .with_audit_capacity(config.store.audit_log_capacity);
        Ok(Self {
            store: Arc::new(store),
            sessions: Arc::new(SessionStore::new(config.session.ttl_hours)),
        })
    }
}

/// Build the management router with all endpoints.
/// Returns a Router that should be merged into the main app.
pub fn management_router(state: ManagementState) -> Router {
    Router::new()
        // Auth
        .route("/api/v1/auth/login", post(handlers::handle_login))
        .route("/api/v1/auth/logout", post(handlers::handle_logout))
        .route("/api/v1/auth/me", get(handlers::current_user))
        // Videos
        .route("/api/v1/videos", get(handlers::list_videos))
        .route("/api/v1/videos/:id", get(handlers::get_video))
        // Experiments
        .route("/api/v1/experiments", get(handlers::list_experiments).post(handlers::create_experiment))
        .route("/api/v1/experiments/:id", get(handlers::get_experiment))
        .route("/api/v1/experiments/:id/metrics", post(handlers::record_metrics))
        .route("/api/v1/experiments/:id/tick", post(handlers::tick_experiment))
        .route("/api/v1/experiments/:id/stop", post(handlers::stop_experiment))
        // Dashboard
        .route("/api/v1/dashboard", get(handlers::dashboard))
        .route("/api/v1/audit-log", get(handlers::audit_log))
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .with_state(state)
}
