//! Buffer maintenance
//!
//! Periodically scans every infinite schedule, extends buffers that fell
//! below the low-water mark and prunes items past the retention window.
//! A failing schedule is logged and counted; the pass carries on with the
//! rest.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;

use super::service::InfiniteScheduleService;
use crate::error::Result;
use crate::metrics;
use crate::models::HOUR_MS;

/// Maintenance tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSettings {
    /// Extend a buffer once it reaches less than this far past now
    pub low_water_ms: i64,
    /// Items ending earlier than this before now are deleted
    pub retention_ms: i64,
    pub max_concurrency: usize,
    pub interval: Duration,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            low_water_ms: 24 * HOUR_MS,
            retention_ms: 24 * HOUR_MS,
            max_concurrency: 4,
            interval: Duration::from_secs(300),
        }
    }
}

/// What happened to one schedule during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MaintenanceOutcome {
    Extended { items: usize },
    Skipped,
    InFlight,
    Failed { error: String },
}

impl MaintenanceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extended { .. } => "extended",
            Self::Skipped => "skipped",
            Self::InFlight => "in_flight",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Summary of one maintenance pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub scanned: usize,
    pub extended: usize,
    pub skipped: usize,
    pub in_flight: usize,
    pub pruned_items: usize,
    /// Schedule id and error message of every failure
    pub failures: Vec<(String, String)>,
}

impl MaintenanceReport {
    fn record(&mut self, schedule_id: String, pruned: usize, outcome: MaintenanceOutcome) {
        self.scanned += 1;
        self.pruned_items += pruned;
        match outcome {
            MaintenanceOutcome::Extended { .. } => self.extended += 1,
            MaintenanceOutcome::Skipped => self.skipped += 1,
            MaintenanceOutcome::InFlight => self.in_flight += 1,
            MaintenanceOutcome::Failed { error } => self.failures.push((schedule_id, error)),
        }
    }
}

pub struct BufferMaintainer {
    service: Arc<InfiniteScheduleService>,
    settings: MaintenanceSettings,
}

impl BufferMaintainer {
    pub fn new(service: Arc<InfiniteScheduleService>, settings: MaintenanceSettings) -> Self {
        Self { service, settings }
    }

    /// Maintain a single schedule; returns items pruned and the outcome
    async fn maintain_schedule(&self, schedule_id: &str, now_ms: i64) -> (usize, MaintenanceOutcome) {
        if self.service.is_in_flight(schedule_id) {
            return (0, MaintenanceOutcome::InFlight);
        }

        let repo = self.service.repository();
        let pruned = match repo.delete_items_before(schedule_id, now_ms - self.settings.retention_ms) {
            Ok(n) => n,
            Err(e) => return (0, MaintenanceOutcome::Failed { error: e.to_string() }),
        };

        let needs_extension = match repo.buffer_end_time(schedule_id) {
            Ok(end) => end.map_or(true, |end| end - now_ms < self.settings.low_water_ms),
            Err(e) => return (pruned, MaintenanceOutcome::Failed { error: e.to_string() }),
        };
        if !needs_extension {
            return (pruned, MaintenanceOutcome::Skipped);
        }

        match self.service.generate_and_commit(schedule_id, now_ms, None, None).await {
            Ok(report) => (pruned, MaintenanceOutcome::Extended { items: report.item_count }),
            Err(e) => (pruned, MaintenanceOutcome::Failed { error: e.to_string() }),
        }
    }

    /// Run one pass over every schedule
    pub async fn run_once(&self, now_ms: i64) -> Result<MaintenanceReport> {
        let schedule_ids: Vec<String> = self
            .service
            .list_schedules()?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let outcomes = stream::iter(schedule_ids)
            .map(|schedule_id| async move {
                let (pruned, outcome) = self.maintain_schedule(&schedule_id, now_ms).await;
                (schedule_id, pruned, outcome)
            })
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut report = MaintenanceReport::default();
        for (schedule_id, pruned, outcome) in outcomes {
            metrics::record_maintenance_outcome(outcome.as_str());
            if let MaintenanceOutcome::Failed { error } = &outcome {
                tracing::warn!(schedule_id = %schedule_id, error = %error, "Buffer maintenance failed");
            }
            report.record(schedule_id, pruned, outcome);
        }
        metrics::record_maintenance_pass(report.scanned);

        tracing::info!(
            scanned = report.scanned,
            extended = report.extended,
            skipped = report.skipped,
            in_flight = report.in_flight,
            failed = report.failures.len(),
            pruned = report.pruned_items,
            "Buffer maintenance pass finished"
        );
        Ok(report)
    }

    /// Run passes on the configured interval until `shutdown` turns true
    pub async fn run_forever(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    if let Err(e) = self.run_once(now_ms).await {
                        tracing::error!(error = %e, "Buffer maintenance pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Buffer maintenance shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infinite::{FillMode, InfiniteSchedule, InfiniteSlot};
    use crate::models::{ContentProgram, MINUTE_MS};
    use crate::pool::ProgramPool;
    use crate::slots::{SlotDefinition, SlotKind};
    use crate::storage::create_mock_repository;

    fn service() -> Arc<InfiniteScheduleService> {
        let mut pool = ProgramPool::new();
        for ep in 1..=3 {
            pool.add_program(ContentProgram::episode(format!("a{ep}"), "a", 1, ep, 30 * MINUTE_MS));
        }
        pool.add_filler_list("empty", Vec::new());
        Arc::new(InfiniteScheduleService::new(create_mock_repository(), Arc::new(pool)))
    }

    fn schedule(id: &str, kind: SlotKind) -> InfiniteSchedule {
        InfiniteSchedule::new(id, id)
            .with_buffer_days(2)
            .with_slot(InfiniteSlot::new(SlotDefinition::new("x", kind), FillMode::Fill))
    }

    fn settings() -> MaintenanceSettings {
        MaintenanceSettings {
            low_water_ms: 24 * HOUR_MS,
            retention_ms: 6 * HOUR_MS,
            max_concurrency: 2,
            interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_extends_then_skips() {
        let service = service();
        service.create_schedule(schedule("s1", SlotKind::Show { show_id: "a".into() }), 0).unwrap();
        let maintainer = BufferMaintainer::new(service.clone(), settings());

        let first = maintainer.run_once(0).await.unwrap();
        assert_eq!(first.extended, 1);
        let end = service.repository().buffer_end_time("s1").unwrap().unwrap();
        assert!(end >= 48 * HOUR_MS);

        let second = maintainer.run_once(HOUR_MS).await.unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(second.extended, 0);
    }

    #[tokio::test]
    async fn test_prunes_and_extends_later() {
        let service = service();
        service.create_schedule(schedule("s1", SlotKind::Show { show_id: "a".into() }), 0).unwrap();
        let maintainer = BufferMaintainer::new(service.clone(), settings());
        maintainer.run_once(0).await.unwrap();

        let later = maintainer.run_once(30 * HOUR_MS).await.unwrap();
        assert_eq!(later.extended, 1);
        assert!(later.pruned_items > 0);

        let stats = service.repository().buffer_stats("s1").unwrap();
        assert!(stats.first_start_ms.unwrap() >= 24 * HOUR_MS - 30 * MINUTE_MS);
        assert!(stats.end_ms.unwrap() >= 78 * HOUR_MS);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_pass() {
        let service = service();
        service.create_schedule(schedule("good", SlotKind::Show { show_id: "a".into() }), 0).unwrap();
        service
            .create_schedule(schedule("bad", SlotKind::Filler { filler_list_id: "empty".into() }), 0)
            .unwrap();
        let maintainer = BufferMaintainer::new(service.clone(), settings());

        let report = maintainer.run_once(0).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.extended, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "bad");
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_shutdown() {
        let service = service();
        let maintainer = BufferMaintainer::new(service, settings());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { maintainer.run_forever(rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
