use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ─── Experimentation ────────────────────────────────────────────────────

/// A single thumbnail candidate and its accumulated counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub(crate) id: Uuid,
    pub(crate) image_ref: String,
    pub(crate) impressions: u64,
    pub(crate) clicks: u64,
}

impl Variant {
    pub(crate) fn new(image_ref: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_ref,
            impressions: 0,
            clicks: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn impressions(&self) -> u64 {
        self.impressions
    }

    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    /// Click-through rate as a fraction, `None` until the variant has been shown.
    pub fn ctr_fraction(&self) -> Option<f64> {
        if self.impressions == 0 {
            None
        } else {
            Some(self.clicks as f64 / self.impressions as f64)
        }
    }

    /// Click-through rate in percent, zero before the first impression.
    pub fn ctr(&self) -> f64 {
        self.ctr_fraction().map(|f| f * 100.0).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Active,
    Completed,
}

/// Result frozen at the moment an experiment completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentOutcome {
    pub completed_at: DateTime<Utc>,
    pub winning_variant_id: Option<Uuid>,
    /// Winner CTR in percent.
    pub winning_ctr: Option<f64>,
    pub improvement_percent: Option<f64>,
}

/// A thumbnail A/B test against one video.
///
/// Fields are only reachable through accessors; every mutation goes through
/// the lifecycle operations in [`crate::experimentation`], which keep the
/// variant count and click/impression invariants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub(crate) id: Uuid,
    pub(crate) subject_ref: String,
    pub(crate) variants: Vec<Variant>,
    pub(crate) status: ExperimentStatus,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) planned_duration_hours: f64,
    pub(crate) rotation_interval_hours: f64,
    pub(crate) auto_publish_on_completion: bool,
    pub(crate) outcome: Option<ExperimentOutcome>,
}

impl Experiment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject_ref(&self) -> &str {
        &self.subject_ref
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant(&self, variant_id: Uuid) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ExperimentStatus::Active
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn planned_duration_hours(&self) -> f64 {
        self.planned_duration_hours
    }

    pub fn rotation_interval_hours(&self) -> f64 {
        self.rotation_interval_hours
    }

    pub fn auto_publish_on_completion(&self) -> bool {
        self.auto_publish_on_completion
    }

    pub fn outcome(&self) -> Option<&ExperimentOutcome> {
        self.outcome.as_ref()
    }

    /// Scheduled completion instant, `None` if it is not representable.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        hours_to_duration(self.planned_duration_hours)
            .and_then(|d| self.start_time.checked_add_signed(d))
    }

    /// Hours until the deadline, clamped at zero. Zero once completed.
    pub fn remaining_hours(&self, now: DateTime<Utc>) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        match self.deadline() {
            Some(deadline) if deadline > now => {
                (deadline - now).num_milliseconds() as f64 / MILLIS_PER_HOUR
            }
            Some(_) => 0.0,
            None => f64::INFINITY,
        }
    }

    pub fn total_impressions(&self) -> u64 {
        self.variants
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.impressions))
    }

    pub fn total_clicks(&self) -> u64 {
        self.variants
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.clicks))
    }

    /// Impression-weighted CTR across all variants, in percent.
    pub fn average_ctr(&self) -> f64 {
        let impressions = self.total_impressions();
        if impressions == 0 {
            0.0
        } else {
            self.total_clicks() as f64 / impressions as f64 * 100.0
        }
    }
}

/// Instruction for the video catalog to replace a video's live thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishInstruction {
    pub experiment_id: Uuid,
    pub subject_ref: String,
    pub variant_id: Uuid,
    pub image_ref: String,
}

pub(crate) const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Convert fractional hours to a millisecond-precision duration.
pub(crate) fn hours_to_duration(hours: f64) -> Option<Duration> {
    let millis = (hours * MILLIS_PER_HOUR).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}
