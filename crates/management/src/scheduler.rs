//! Periodic maintenance: completes due experiments and prunes expired sessions.

use crate::session::SessionStore;
use crate::store::ExperimentStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct CompletionScheduler {
    store: Arc<ExperimentStore>,
    sessions: Arc<SessionStore>,
    interval: Duration,
}

impl CompletionScheduler {
    pub fn new(store: Arc<ExperimentStore>, sessions: Arc<SessionStore>, interval_secs: u64) -> Self {
        Self {
            store,
            sessions,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// One pass at `now`. Returns the number of experiments completed.
    pub fn run_once(&self, now: DateTime<Utc>) -> usize {
        let completed = self.store.tick_all(now);
        let pruned = self.sessions.prune_expired(now);
        metrics::counter!("scheduler.ticks").increment(1);
        if completed > 0 || pruned > 0 {
            info!(completed, pruned_sessions = pruned, "Scheduler pass finished");
        } else {
            debug!("Scheduler pass found nothing due");
        }
        completed
    }

    pub fn spawn(self) -> JoinHandle<()> {
        info!(interval_secs = self.interval.as_secs(), "Completion scheduler started");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                self.run_once(Utc::now());
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{CreateExperimentRequest, UserRecord};

    fn scheduler() -> (CompletionScheduler, Arc<ExperimentStore>, Arc<SessionStore>) {
        let store = Arc::new(ExperimentStore::new(Arc::new(InMemoryCatalog::with_demo_videos())));
        let sessions = Arc::new(SessionStore::new(1));
        (CompletionScheduler::new(store.clone(), sessions.clone(), 60), store, sessions)
    }

    #[test]
    fn test_run_once_completes_overdue_experiments() {
        let (scheduler, store, _) = scheduler();
        let now = Utc::now();
        let overdue = store
            .create_experiment(
                CreateExperimentRequest {
                    subject_ref: "vid002".to_string(),
                    variant_images: vec!["a.jpg".to_string(), "b.jpg".to_string()],
                    duration_hours: 24.0,
                    rotation_interval_hours: 2.0,
                    auto_publish: false,
                },
                "admin",
                now - chrono::Duration::hours(30),
            )
            .unwrap();

        assert_eq!(scheduler.run_once(now), 1);
        assert!(!store.get_experiment(overdue.id()).unwrap().is_active());
        assert_eq!(scheduler.run_once(now), 0);
    }

    #[test]
    fn test_run_once_prunes_expired_sessions() {
        let (scheduler, _, sessions) = scheduler();
        let now = Utc::now();
        let user = UserRecord {
            id: "user_demo".to_string(),
            name: "Demo User".to_string(),
            email: "demo@example.com".to_string(),
            picture: String::new(),
            channel_id: None,
        };
        sessions.open("stale".to_string(), user, now - chrono::Duration::hours(2));
        assert_eq!(sessions.active_count(), 1);

        scheduler.run_once(now);
        assert_eq!(sessions.active_count(), 0);
    }
}
