//! Thumbnail experiment lifecycle: creation, metric updates and completion.
//!
//! All operations are synchronous and validate fully before mutating, so a
//! failed call leaves the experiment untouched. Callers are responsible for
//! serializing writes to the same experiment.

use crate::error::{CoreError, CoreResult};
use crate::types::{
    hours_to_duration, Experiment, ExperimentOutcome, ExperimentStatus, PublishInstruction,
    Variant, MILLIS_PER_HOUR,
};
use crate::winner::{self, Leader};
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

/// Minimum number of thumbnails in one experiment.
pub const MIN_VARIANTS: usize = 2;

/// Maximum number of thumbnails in one experiment.
pub const MAX_VARIANTS: usize = 5;

/// Parameters for a new experiment.
#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub subject_ref: String,
    pub variant_images: Vec<String>,
    pub duration_hours: f64,
    pub rotation_interval_hours: f64,
    pub auto_publish: bool,
}

/// What happened when an experiment crossed into `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub outcome: ExperimentOutcome,
    /// Present when auto-publish is on and a winner exists.
    pub publish: Option<PublishInstruction>,
}

impl Experiment {
    /// Start a new experiment at `now` with zeroed variants.
    pub fn create(new: NewExperiment, now: DateTime<Utc>) -> CoreResult<Self> {
        if new.subject_ref.trim().is_empty() {
            return Err(CoreError::Validation("subjectRef must not be empty".into()));
        }
        let count = new.variant_images.len();
        if !(MIN_VARIANTS..=MAX_VARIANTS).contains(&count) {
            return Err(CoreError::Validation(format!(
                "an experiment needs between {MIN_VARIANTS} and {MAX_VARIANTS} thumbnails, got {count}"
            )));
        }
        if new.variant_images.iter().any(|img| img.trim().is_empty()) {
            return Err(CoreError::Validation("thumbnail image refs must not be empty".into()));
        }
        validate_positive_hours("durationHours", new.duration_hours)?;
        validate_positive_hours("rotationIntervalHours", new.rotation_interval_hours)?;
        let deadline_ok = hours_to_duration(new.duration_hours)
            .and_then(|d| now.checked_add_signed(d))
            .is_some();
        if !deadline_ok {
            return Err(CoreError::Validation("durationHours is too large".into()));
        }

        let experiment = Experiment {
            id: Uuid::new_v4(),
            subject_ref: new.subject_ref,
            variants: new.variant_images.into_iter().map(Variant::new).collect(),
            status: ExperimentStatus::Active,
            start_time: now,
            planned_duration_hours: new.duration_hours,
            rotation_interval_hours: new.rotation_interval_hours,
            auto_publish_on_completion: new.auto_publish,
            outcome: None,
        };
        info!(
            experiment_id = %experiment.id,
            subject = %experiment.subject_ref,
            variants = experiment.variants.len(),
            duration_hours = experiment.planned_duration_hours,
            "Experiment created"
        );
        Ok(experiment)
    }

    /// Add impression and click deltas to one variant.
    pub fn record_metrics(
        &mut self,
        variant_id: Uuid,
        impressions_delta: u64,
        clicks_delta: u64,
    ) -> CoreResult<()> {
        let experiment_id = self.id;
        let index = self
            .variants
            .iter()
            .position(|v| v.id == variant_id)
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "variant {variant_id} in experiment {experiment_id}"
                ))
            })?;

        if self.status == ExperimentStatus::Completed {
            return Err(CoreError::InvalidState(format!(
                "experiment {experiment_id} is completed; metrics are frozen"
            )));
        }

        let variant = &self.variants[index];
        let impressions = variant
            .impressions
            .checked_add(impressions_delta)
            .ok_or_else(|| CoreError::Validation("impressions counter overflow".into()))?;
        let clicks = variant
            .clicks
            .checked_add(clicks_delta)
            .ok_or_else(|| CoreError::Validation("clicks counter overflow".into()))?;
        if clicks > impressions {
            return Err(CoreError::Validation(format!(
                "clicks ({clicks}) would exceed impressions ({impressions})"
            )));
        }

        let variant = &mut self.variants[index];
        variant.impressions = impressions;
        variant.clicks = clicks;
        debug!(
            experiment_id = %experiment_id,
            variant_id = %variant_id,
            impressions,
            clicks,
            "Variant metrics recorded"
        );
        Ok(())
    }

    /// Current best variant. Labelled "leading" while active and "winning"
    /// once completed.
    pub fn leader(&self) -> Option<Leader> {
        winner::select_leader(&self.variants)
    }

    pub fn leading_variant_id(&self) -> Option<Uuid> {
        if self.is_active() {
            self.leader().map(|l| l.variant_id)
        } else {
            None
        }
    }

    pub fn winning_variant_id(&self) -> Option<Uuid> {
        self.outcome.as_ref().and_then(|o| o.winning_variant_id)
    }

    /// Complete the experiment if its deadline has passed.
    ///
    /// Returns `Some` only on the call that performs the transition; later
    /// calls and calls before the deadline are no-ops.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Completion> {
        if self.status != ExperimentStatus::Active {
            return None;
        }
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        Some(self.complete(deadline))
    }

    /// Operator stop: move the deadline to `now` and complete.
    pub fn stop_early(&mut self, now: DateTime<Utc>) -> Option<Completion> {
        if self.status != ExperimentStatus::Active {
            return None;
        }
        let now = now.max(self.start_time);
        let elapsed_millis = (now - self.start_time).num_milliseconds();
        self.planned_duration_hours = elapsed_millis as f64 / MILLIS_PER_HOUR;
        info!(
            experiment_id = %self.id,
            elapsed_hours = self.planned_duration_hours,
            "Experiment stopped early"
        );
        self.tick(now)
    }

    fn complete(&mut self, completed_at: DateTime<Utc>) -> Completion {
        let leader = self.leader();
        let outcome = ExperimentOutcome {
            completed_at,
            winning_variant_id: leader.map(|l| l.variant_id),
            winning_ctr: leader.map(|l| l.ctr * 100.0),
            improvement_percent: leader
                .as_ref()
                .and_then(|l| winner::improvement_percent(&self.variants, l)),
        };
        self.status = ExperimentStatus::Completed;
        self.outcome = Some(outcome.clone());

        let publish = match (self.auto_publish_on_completion, leader) {
            (true, Some(l)) => Some(PublishInstruction {
                experiment_id: self.id,
                subject_ref: self.subject_ref.clone(),
                variant_id: l.variant_id,
                image_ref: self.variants[l.index].image_ref.clone(),
            }),
            _ => None,
        };

        info!(
            experiment_id = %self.id,
            winner = ?outcome.winning_variant_id,
            improvement_percent = ?outcome.improvement_percent,
            publish = publish.is_some(),
            "Experiment completed"
        );
        Completion { outcome, publish }
    }
}

fn validate_positive_hours(field: &str, hours: f64) -> CoreResult<()> {
    if hours.is_finite() && hours > 0.0 {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be a positive number of hours, got {hours}"
        )))
    }
}
