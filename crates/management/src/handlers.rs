//! Axum REST handlers for the management API.

use crate::auth;
use crate::models::*;
use crate::session::{Session, SessionStore};
use crate::store::ExperimentStore;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use clickpilot_core::{CoreError, Video};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub store: Arc<ExperimentStore>,
    pub sessions: Arc<SessionStore>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map an engine error onto its HTTP status.
pub fn error_response(err: CoreError) -> ApiError {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::InvalidState(_) => StatusCode::CONFLICT,
        CoreError::Catalog(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        warn!(error = %err, "Management request failed");
        metrics::counter!("management.errors").increment(1);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| error_response(CoreError::Validation(rejection.body_text())))
}

fn non_negative(field: &str, value: i64) -> Result<u64, ApiError> {
    u64::try_from(value).map_err(|_| {
        error_response(CoreError::Validation(format!(
            "{field} must be non-negative, got {value}"
        )))
    })
}

// ─── Auth ──────────────────────────────────────────────────────────────────

/// POST /api/v1/auth/login — Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    )
)]
pub async fn handle_login(
    State(state): State<ManagementState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = json_body(payload)?;
    match auth::authenticate(&req) {
        Ok(user) => {
            let session = state.sessions.open(auth::generate_token(), user, Utc::now());
            state
                .store
                .log_audit(&session.user.id, AuditAction::Login, &session.user.id, serde_json::json!({}));
            metrics::counter!("auth.logins").increment(1);
            info!(user = %session.user.id, "User logged in");
            Ok(Json(LoginResponse {
                token: session.token,
                user: session.user,
                expires_at: session.expires_at,
            }))
        }
        Err(msg) => {
            metrics::counter!("auth.login_failures").increment(1);
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "auth_failed".to_string(),
                    message: msg,
                }),
            ))
        }
    }
}

/// POST /api/v1/auth/logout — End the caller's session.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    responses((status = 204, description = "Session closed"))
)]
pub async fn handle_logout(
    State(state): State<ManagementState>,
    Extension(session): Extension<Session>,
) -> StatusCode {
    state.sessions.close(&session.token);
    state
        .store
        .log_audit(&session.user.id, AuditAction::Logout, &session.user.id, serde_json::json!({}));
    info!(user = %session.user.id, "User logged out");
    StatusCode::NO_CONTENT
}

/// GET /api/v1/auth/me — The authenticated user.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = UserRecord))
)]
pub async fn current_user(Extension(session): Extension<Session>) -> Json<UserRecord> {
    Json(session.user)
}

// ─── Videos ────────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/v1/videos",
    tag = "Videos",
    responses((status = 200, description = "Channel videos", body = Vec<Video>))
)]
pub async fn list_videos(State(state): State<ManagementState>) -> Json<Vec<Video>> {
    Json(state.store.catalog().list_videos())
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}",
    tag = "Videos",
    params(("id" = String, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video", body = Video),
        (status = 404, description = "Unknown video"),
    )
)]
pub async fn get_video(
    State(state): State<ManagementState>,
    Path(id): Path<String>,
) -> Result<Json<Video>, StatusCode> {
    state
        .store
        .catalog()
        .get_video(&id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// ─── Experiments ───────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/v1/experiments",
    tag = "Experiments",
    params(ListExperimentsQuery),
    responses((status = 200, description = "Experiments, newest first", body = Vec<ExperimentView>))
)]
pub async fn list_experiments(
    State(state): State<ManagementState>,
    Query(query): Query<ListExperimentsQuery>,
) -> Json<Vec<ExperimentView>> {
    let now = Utc::now();
    Json(
        state
            .store
            .list_experiments(query.status)
            .iter()
            .map(|e| state.store.view(e, now))
            .collect(),
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/experiments/{id}",
    tag = "Experiments",
    params(("id" = Uuid, Path, description = "Experiment id")),
    responses(
        (status = 200, description = "Experiment", body = ExperimentView),
        (status = 404, description = "Unknown experiment", body = ErrorResponse),
    )
)]
pub async fn get_experiment(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExperimentView>, ApiError> {
    let experiment = state.store.get_experiment(id).map_err(error_response)?;
    Ok(Json(state.store.view(&experiment, Utc::now())))
}

/// POST /api/v1/experiments — Start a thumbnail test.
#[utoipa::path(
    post,
    path = "/api/v1/experiments",
    tag = "Experiments",
    request_body = CreateExperimentRequest,
    responses(
        (status = 201, description = "Experiment started", body = ExperimentView),
        (status = 400, description = "Validation failure", body = ErrorResponse),
    )
)]
pub async fn create_experiment(
    State(state): State<ManagementState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateExperimentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExperimentView>), ApiError> {
    let req = json_body(payload)?;
    let now = Utc::now();
    let experiment = state
        .store
        .create_experiment(req, &session.user.id, now)
        .map_err(error_response)?;
    metrics::counter!("experiments.created").increment(1);
    Ok((StatusCode::CREATED, Json(state.store.view(&experiment, now))))
}

/// POST /api/v1/experiments/{id}/metrics — Apply impression/click deltas.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/{id}/metrics",
    tag = "Experiments",
    params(("id" = Uuid, Path, description = "Experiment id")),
    request_body = RecordMetricsRequest,
    responses(
        (status = 200, description = "Updated experiment", body = ExperimentView),
        (status = 400, description = "Invalid deltas", body = ErrorResponse),
        (status = 404, description = "Unknown experiment or variant", body = ErrorResponse),
        (status = 409, description = "Experiment already completed", body = ErrorResponse),
    )
)]
pub async fn record_metrics(
    State(state): State<ManagementState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    payload: Result<Json<RecordMetricsRequest>, JsonRejection>,
) -> Result<Json<ExperimentView>, ApiError> {
    let req = json_body(payload)?;
    let impressions = non_negative("impressionsDelta", req.impressions_delta)?;
    let clicks = non_negative("clicksDelta", req.clicks_delta)?;
    let experiment = state
        .store
        .record_metrics(id, req.variant_id, impressions, clicks, &session.user.id)
        .map_err(error_response)?;
    metrics::counter!("experiments.metrics_recorded").increment(1);
    Ok(Json(state.store.view(&experiment, Utc::now())))
}

/// POST /api/v1/experiments/{id}/tick — Complete the experiment if it is due.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/{id}/tick",
    tag = "Experiments",
    params(("id" = Uuid, Path, description = "Experiment id")),
    responses(
        (status = 200, description = "Experiment after the check", body = ExperimentView),
        (status = 404, description = "Unknown experiment", body = ErrorResponse),
    )
)]
pub async fn tick_experiment(
    State(state): State<ManagementState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExperimentView>, ApiError> {
    let now = Utc::now();
    let experiment = state
        .store
        .tick(id, &session.user.id, now)
        .map_err(error_response)?;
    Ok(Json(state.store.view(&experiment, now)))
}

/// POST /api/v1/experiments/{id}/stop — End the experiment now.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/{id}/stop",
    tag = "Experiments",
    params(("id" = Uuid, Path, description = "Experiment id")),
    responses(
        (status = 200, description = "Completed experiment", body = ExperimentView),
        (status = 404, description = "Unknown experiment", body = ErrorResponse),
    )
)]
pub async fn stop_experiment(
    State(state): State<ManagementState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExperimentView>, ApiError> {
    let now = Utc::now();
    let experiment = state
        .store
        .stop(id, &session.user.id, now)
        .map_err(error_response)?;
    Ok(Json(state.store.view(&experiment, now)))
}

// ─── Dashboard ─────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "Dashboard",
    responses((status = 200, description = "Totals across all experiments", body = DashboardOverview))
)]
pub async fn dashboard(State(state): State<ManagementState>) -> Json<DashboardOverview> {
    Json(state.store.dashboard_overview())
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/v1/audit-log",
    tag = "Dashboard",
    responses((status = 200, description = "Audit entries, newest first", body = Vec<AuditLogEntry>))
)]
pub async fn audit_log(State(state): State<ManagementState>) -> Json<Vec<AuditLogEntry>> {
    Json(state.store.get_audit_log())
}
