//! Bearer token authentication.
//!
//! Development: a mock identity provider accepts the demo account and hands
//! out random tokens backed by the [`SessionStore`](crate::session::SessionStore).
//! Production: replace `authenticate` with the OAuth flow of the video platform.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rand::Rng;

use crate::handlers::ManagementState;
use crate::models::{ErrorResponse, LoginRequest, UserRecord};

const DEV_TOKEN_PREFIX: &str = "cp_dev_";

/// Password accepted for any username in development.
const DEV_PASSWORD: &str = "clickpilot2024";

/// Validate a login request and return the authenticated user.
pub fn authenticate(req: &LoginRequest) -> Result<UserRecord, String> {
    let demo = req.username == "demo" && req.password == "demo";
    if demo || (!req.username.trim().is_empty() && req.password == DEV_PASSWORD) {
        let username = req.username.trim().to_lowercase();
        let email = format!("{username}@example.com");
        Ok(UserRecord {
            id: format!("user_{username}"),
            name: if demo { "Demo User".to_string() } else { req.username.trim().to_string() },
            picture: format!("https://i.pravatar.cc/150?u={email}"),
            email,
            channel_id: Some("UCMockChannelId".to_string()),
        })
    } else {
        Err("Invalid credentials".to_string())
    }
}

/// Generate a random bearer token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    format!(
        "{}{}",
        DEV_TOKEN_PREFIX,
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>()
    )
}

/// Axum middleware that requires a live session on every API route except login.
/// The session is attached to the request extensions for downstream handlers.
pub async fn auth_middleware(
    State(state): State<ManagementState>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if path.ends_with("/auth/login") || !path.starts_with("/api/v1/") {
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let Some(token) = token else {
        return unauthorized("missing_auth", "Authorization header with Bearer token required");
    };

    match state.sessions.lookup(&token, Utc::now()) {
        Some(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        None => unauthorized("invalid_token", "Invalid or expired bearer token"),
    }
}

fn unauthorized(error: &str, message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}
