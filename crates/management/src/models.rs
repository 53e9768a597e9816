//! Management API types — experiment views, requests, sessions, audit log.

use chrono::{DateTime, Utc};
use clickpilot_core::{Experiment, ExperimentOutcome, ExperimentStatus};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ─── Experiments ───────────────────────────────────────────────────────────

/// Serialized experiment with every derived field filled in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentView {
    pub id: Uuid,
    pub subject_ref: String,
    pub subject_title: Option<String>,
    pub status: ExperimentStatus,
    pub variants: Vec<VariantView>,
    pub start_time: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub planned_duration_hours: f64,
    pub rotation_interval_hours: f64,
    pub auto_publish_on_completion: bool,
    pub remaining_hours: f64,
    pub total_impressions: u64,
    /// Impression-weighted CTR in percent.
    pub average_ctr: f64,
    pub leading_variant_id: Option<Uuid>,
    pub winning_variant_id: Option<Uuid>,
    pub winning_ctr: Option<f64>,
    pub improvement_percent: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantView {
    pub id: Uuid,
    pub image_ref: String,
    pub impressions: u64,
    pub clicks: u64,
    /// CTR in percent.
    pub ctr: f64,
}

impl ExperimentView {
    pub fn build(experiment: &Experiment, subject_title: Option<String>, now: DateTime<Utc>) -> Self {
        let outcome: Option<&ExperimentOutcome> = experiment.outcome();
        Self {
            id: experiment.id(),
            subject_ref: experiment.subject_ref().to_string(),
            subject_title,
            status: experiment.status(),
            variants: experiment
                .variants()
                .iter()
                .map(|v| VariantView {
                    id: v.id(),
                    image_ref: v.image_ref().to_string(),
                    impressions: v.impressions(),
                    clicks: v.clicks(),
                    ctr: v.ctr(),
                })
                .collect(),
            start_time: experiment.start_time(),
            ends_at: experiment.deadline(),
            planned_duration_hours: experiment.planned_duration_hours(),
            rotation_interval_hours: experiment.rotation_interval_hours(),
            auto_publish_on_completion: experiment.auto_publish_on_completion(),
            remaining_hours: experiment.remaining_hours(now),
            total_impressions: experiment.total_impressions(),
            average_ctr: experiment.average_ctr(),
            leading_variant_id: experiment.leading_variant_id(),
            winning_variant_id: experiment.winning_variant_id(),
            winning_ctr: outcome.and_then(|o| o.winning_ctr),
            improvement_percent: outcome.and_then(|o| o.improvement_percent),
            completed_at: outcome.map(|o| o.completed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExperimentRequest {
    pub subject_ref: String,
    pub variant_images: Vec<String>,
    pub duration_hours: f64,
    pub rotation_interval_hours: f64,
    pub auto_publish: bool,
}

/// Signed so that negative deltas reach validation instead of failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetricsRequest {
    pub variant_id: Uuid,
    #[serde(default)]
    pub impressions_delta: i64,
    #[serde(default)]
    pub clicks_delta: i64,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListExperimentsQuery {
    /// Only experiments in this state.
    pub status: Option<ExperimentStatus>,
}

// ─── Dashboard ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub active_tests: u64,
    pub completed_tests: u64,
    pub total_impressions: u64,
    pub average_ctr: f64,
}

// ─── Sessions ──────────────────────────────────────────────────────────────

/// Authenticated-user record handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: UserRecord,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    RecordMetrics,
    Stop,
    Complete,
    Publish,
    PublishFailed,
    Login,
    Logout,
}
