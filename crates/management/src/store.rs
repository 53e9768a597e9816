//! In-memory experiment store backed by DashMap.
//!
//! Each write holds the DashMap entry lock of one experiment for the whole
//! read-modify-write, which serializes concurrent updates per experiment id.
//! Reads clone a snapshot. Production: replace with a durable store keyed by
//! experiment id.

use crate::models::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use clickpilot_core::{
    Completion, CoreError, CoreResult, Experiment, ExperimentStatus, NewExperiment, VideoCatalog,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit entries kept before the oldest are dropped.
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Thread-safe in-memory store for experiments and the audit log.
pub struct ExperimentStore {
    experiments: DashMap<Uuid, Experiment>,
    audit_log: Mutex<VecDeque<AuditLogEntry>>,
    audit_capacity: usize,
    catalog: Arc<dyn VideoCatalog>,
}

impl ExperimentStore {
    pub fn new(catalog: Arc<dyn VideoCatalog>) -> Self {
        info!("Experiment store initialized (in-memory, development mode)");
        Self {
            experiments: DashMap::new(),
            audit_log: Mutex::new(VecDeque::new()),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            catalog,
        }
    }

    /// Store pre-filled with the demo channel's running and finished tests.
    pub fn with_demo_data(catalog: Arc<dyn VideoCatalog>, now: DateTime<Utc>) -> CoreResult<Self> {
        let store = Self::new(catalog);
        store.seed_demo_data(now)?;
        Ok(store)
    }

    pub fn catalog(&self) -> &Arc<dyn VideoCatalog> {
        &self.catalog
    }

    // ─── Experiments ───────────────────────────────────────────────────────

    pub fn create_experiment(
        &self,
        req: CreateExperimentRequest,
        user: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Experiment> {
        if self.catalog.get_video(&req.subject_ref).is_none() {
            return Err(CoreError::Validation(format!(
                "video {} is not in the catalog",
                req.subject_ref
            )));
        }
        let experiment = Experiment::create(
            NewExperiment {
                subject_ref: req.subject_ref,
                variant_images: req.variant_images,
                duration_hours: req.duration_hours,
                rotation_interval_hours: req.rotation_interval_hours,
                auto_publish: req.auto_publish,
            },
            now,
        )?;
        let id = experiment.id();
        self.experiments.insert(id, experiment.clone());
        self.log_audit(
            user,
            AuditAction::Create,
            &id.to_string(),
            serde_json::json!({
                "subjectRef": experiment.subject_ref(),
                "variants": experiment.variants().len(),
            }),
        );
        Ok(experiment)
    }

    pub fn get_experiment(&self, id: Uuid) -> CoreResult<Experiment> {
        self.experiments
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CoreError::NotFound(format!("experiment {id}")))
    }

    /// Experiments newest first, optionally narrowed to one status.
    pub fn list_experiments(&self, status: Option<ExperimentStatus>) -> Vec<Experiment> {
        let mut experiments: Vec<Experiment> = self
            .experiments
            .iter()
            .filter(|r| status.map_or(true, |s| r.value().status() == s))
            .map(|r| r.value().clone())
            .collect();
        experiments.sort_by(|a, b| b.start_time().cmp(&a.start_time()));
        experiments
    }

    pub fn record_metrics(
        &self,
        id: Uuid,
        variant_id: Uuid,
        impressions_delta: u64,
        clicks_delta: u64,
        user: &str,
    ) -> CoreResult<Experiment> {
        let snapshot = {
            let mut entry = self
                .experiments
                .get_mut(&id)
                .ok_or_else(|| CoreError::NotFound(format!("experiment {id}")))?;
            entry
                .value_mut()
                .record_metrics(variant_id, impressions_delta, clicks_delta)?;
            entry.value().clone()
        };
        self.log_audit(
            user,
            AuditAction::RecordMetrics,
            &id.to_string(),
            serde_json::json!({
                "variantId": variant_id,
                "impressionsDelta": impressions_delta,
                "clicksDelta": clicks_delta,
            }),
        );
        Ok(snapshot)
    }

    /// Run the completion check for one experiment.
    pub fn tick(&self, id: Uuid, user: &str, now: DateTime<Utc>) -> CoreResult<Experiment> {
        let (snapshot, completion) = {
            let mut entry = self
                .experiments
                .get_mut(&id)
                .ok_or_else(|| CoreError::NotFound(format!("experiment {id}")))?;
            let completion = entry.value_mut().tick(now);
            (entry.value().clone(), completion)
        };
        if let Some(completion) = completion {
            self.handle_completion(id, completion, user);
        }
        Ok(snapshot)
    }

    /// Operator stop. Completing an already-completed experiment is a no-op.
    pub fn stop(&self, id: Uuid, user: &str, now: DateTime<Utc>) -> CoreResult<Experiment> {
        let (snapshot, completion) = {
            let mut entry = self
                .experiments
                .get_mut(&id)
                .ok_or_else(|| CoreError::NotFound(format!("experiment {id}")))?;
            let completion = entry.value_mut().stop_early(now);
            (entry.value().clone(), completion)
        };
        if let Some(completion) = completion {
            self.log_audit(user, AuditAction::Stop, &id.to_string(), serde_json::json!({}));
            self.handle_completion(id, completion, user);
        }
        Ok(snapshot)
    }

    /// Tick every active experiment; returns how many completed.
    pub fn tick_all(&self, now: DateTime<Utc>) -> usize {
        let active: Vec<Uuid> = self
            .experiments
            .iter()
            .filter(|r| r.value().is_active())
            .map(|r| *r.key())
            .collect();

        let mut completed = 0;
        for id in active {
            match self.tick(id, "scheduler", now) {
                Ok(exp) if !exp.is_active() => completed += 1,
                Ok(_) => {}
                Err(e) => warn!(experiment_id = %id, error = %e, "Scheduled tick skipped"),
            }
        }
        completed
    }

    /// Record a completion and deliver its publish instruction. Delivery
    /// failures are logged and audited; the experiment stays completed.
    fn handle_completion(&self, id: Uuid, completion: Completion, user: &str) {
        metrics::counter!("experiments.completed").increment(1);
        self.log_audit(
            user,
            AuditAction::Complete,
            &id.to_string(),
            serde_json::json!({
                "winningVariantId": completion.outcome.winning_variant_id,
                "improvementPercent": completion.outcome.improvement_percent,
            }),
        );

        let Some(publish) = completion.publish else {
            return;
        };
        match publish.deliver(self.catalog.as_ref()) {
            Ok(()) => {
                metrics::counter!("experiments.published").increment(1);
                self.log_audit(
                    user,
                    AuditAction::Publish,
                    &id.to_string(),
                    serde_json::json!({
                        "subjectRef": publish.subject_ref,
                        "variantId": publish.variant_id,
                        "imageRef": publish.image_ref,
                    }),
                );
            }
            Err(e) => {
                warn!(experiment_id = %id, error = %e, "Failed to publish winning thumbnail");
                metrics::counter!("experiments.publish_failures").increment(1);
                self.log_audit(
                    user,
                    AuditAction::PublishFailed,
                    &id.to_string(),
                    serde_json::json!({ "error": e.to_string() }),
                );
            }
        }
    }

    pub fn view(&self, experiment: &Experiment, now: DateTime<Utc>) -> ExperimentView {
        let title = self
            .catalog
            .get_video(experiment.subject_ref())
            .map(|v| v.title);
        ExperimentView::build(experiment, title, now)
    }

    // ─── Dashboard ─────────────────────────────────────────────────────────

    pub fn dashboard_overview(&self) -> DashboardOverview {
        let mut overview = DashboardOverview {
            active_tests: 0,
            completed_tests: 0,
            total_impressions: 0,
            average_ctr: 0.0,
        };
        let mut total_clicks = 0u64;
        for r in self.experiments.iter() {
            let exp = r.value();
            match exp.status() {
                ExperimentStatus::Active => overview.active_tests += 1,
                ExperimentStatus::Completed => overview.completed_tests += 1,
            }
            overview.total_impressions = overview.total_impressions.saturating_add(exp.total_impressions());
            total_clicks = total_clicks.saturating_add(exp.total_clicks());
        }
        if overview.total_impressions > 0 {
            overview.average_ctr = total_clicks as f64 / overview.total_impressions as f64 * 100.0;
        }
        overview
    }

    // ─── Audit Log ─────────────────────────────────────────────────────────

    /// Keep at most `capacity` audit entries, never fewer than one.
    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = capacity.max(1);
        self
    }

    /// Newest first.
    pub fn get_audit_log(&self) -> Vec<AuditLogEntry> {
        self.audit_log.lock().iter().rev().cloned().collect()
    }

    pub fn log_audit(&self, user: &str, action: AuditAction, resource_id: &str, details: serde_json::Value) {
        let resource_type = match action {
            AuditAction::Login | AuditAction::Logout => "session",
            _ => "experiment",
        };
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            user: user.to_string(),
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
        };
        let mut log = self.audit_log.lock();
        log.push_back(entry);
        while log.len() > self.audit_capacity {
            log.pop_front();
        }
    }

    // ─── Demo data ─────────────────────────────────────────────────────────

    fn seed_demo_data(&self, now: DateTime<Utc>) -> CoreResult<()> {
        let seeds = [
            DemoTest {
                video: "video123",
                started: now - Duration::hours(36),
                hours: 48.0,
                variants: &[
                    ("https://i.ytimg.com/vi/W6NZfCO5SIk/maxresdefault.jpg", 2500, 300),
                    ("https://i.ytimg.com/vi/PkZNo7MFNFg/maxresdefault.jpg", 2500, 275),
                ],
            },
            DemoTest {
                video: "video456",
                started: now - Duration::hours(48),
                hours: 72.0,
                variants: &[
                    ("https://i.ytimg.com/vi/7CqJlxBYj-M/maxresdefault.jpg", 1800, 252),
                    ("https://i.ytimg.com/vi/f55qeKGgB0M/maxresdefault.jpg", 1800, 270),
                    ("https://i.ytimg.com/vi/mrHNSanmqQ4/maxresdefault.jpg", 1800, 234),
                ],
            },
            DemoTest {
                video: "video789",
                started: utc_date(2023, 10, 1)?,
                hours: 72.0,
                variants: &[
                    ("https://i.ytimg.com/vi/kqtD5dpn9C8/maxresdefault.jpg", 3200, 416),
                    ("https://i.ytimg.com/vi/rfscVS0vtbw/maxresdefault.jpg", 3200, 512),
                ],
            },
            DemoTest {
                video: "video101",
                started: utc_date(2023, 9, 20)?,
                hours: 72.0,
                variants: &[
                    ("https://i.ytimg.com/vi/O6P86uwfdR0/maxresdefault.jpg", 2800, 336),
                    ("https://i.ytimg.com/vi/TNhaISOUy6Q/maxresdefault.jpg", 2800, 392),
                    ("https://i.ytimg.com/vi/9U3IhLAnSxM/maxresdefault.jpg", 2800, 448),
                ],
            },
        ];

        for seed in seeds {
            let created = self.create_experiment(
                CreateExperimentRequest {
                    subject_ref: seed.video.to_string(),
                    variant_images: seed.variants.iter().map(|(img, _, _)| img.to_string()).collect(),
                    duration_hours: seed.hours,
                    rotation_interval_hours: 4.0,
                    auto_publish: true,
                },
                "system",
                seed.started,
            )?;
            for (variant, (_, impressions, clicks)) in created.variants().iter().zip(seed.variants) {
                self.record_metrics(created.id(), variant.id(), *impressions, *clicks, "system")?;
            }
            self.tick(created.id(), "system", now)?;
        }
        info!(experiments = self.experiments.len(), "Demo experiments seeded");
        Ok(())
    }
}

struct DemoTest {
    video: &'static str,
    started: DateTime<Utc>,
    hours: f64,
    variants: &'static [(&'static str, u64, u64)],
}

fn utc_date(year: i32, month: u32, day: u32) -> CoreResult<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .ok_or_else(|| CoreError::Validation(format!("invalid date {year}-{month}-{day}")))
}
