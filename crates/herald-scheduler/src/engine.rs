use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_core::config::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_TOPIC};
use herald_queue::DeliveryQueue;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{manager::TaskManager, types::TickReport};

/// Polls the due-task index and hands due tasks to the delivery queue.
///
/// Ticks run one at a time. A task is only retired after its publish
/// succeeded, so a failed publish leaves it indexed for the next tick.
pub struct SchedulerEngine {
    tasks: Arc<TaskManager>,
    queue: Arc<dyn DeliveryQueue>,
    topic: String,
    poll_interval: Duration,
    /// Published tasks whose index entry could not be deleted. They are not
    /// published again; later ticks only retry the bookkeeping.
    unindexed: Mutex<HashSet<String>>,
}

impl SchedulerEngine {
    pub fn new(tasks: Arc<TaskManager>, queue: Arc<dyn DeliveryQueue>) -> Self {
        Self {
            tasks,
            queue,
            topic: DEFAULT_TOPIC.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            unindexed: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Clamped to at least 1ms.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Main event loop. Ticks every `poll_interval` until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            topic = %self.topic,
            index = %self.tasks.index_collection(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "scheduler engine started"
        );
        self.log_backlog().await;

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if !report.is_idle() {
                        debug!(?report, "scheduler tick");
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Process every task due at `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let due = match self.tasks.due(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("due-task query failed: {e}");
                report.query_failed = true;
                return report;
            }
        };

        for task in due {
            report.due += 1;
            let record = &task.record;

            let already_published = self.unindexed().contains(&record.id);
            if already_published {
                debug!(task_id = %record.id, "already published, retrying index delete");
            } else {
                let bytes = match record.encode() {
                    Ok(b) => b,
                    Err(e) => {
                        error!(task_id = %record.id, kind = %record.kind(), "could not encode task: {e}");
                        report.publish_failed += 1;
                        continue;
                    }
                };
                if let Err(e) = self.queue.publish(&self.topic, &bytes).await {
                    warn!(task_id = %record.id, kind = %record.kind(), "publish failed, retrying next tick: {e}");
                    report.publish_failed += 1;
                    continue;
                }
                report.published += 1;
                info!(task_id = %record.id, kind = %record.kind(), path = %task.entry.path, "task published");
            }

            if let Err(e) = self.tasks.unindex(&record.id).await {
                warn!(task_id = %record.id, "index entry not deleted after publish: {e}");
                self.unindexed().insert(record.id.clone());
                report.retire_failed += 1;
                continue;
            }
            self.unindexed().remove(&record.id);

            if let Err(e) = self.tasks.retire(record, now).await {
                warn!(task_id = %record.id, path = %task.entry.path, "record not retired after publish: {e}");
                report.retire_failed += 1;
            }
        }
        report
    }

    fn unindexed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.unindexed.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn log_backlog(&self) {
        match self.tasks.overdue_count(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => warn!(count = n, "overdue tasks waiting at startup"),
            Err(e) => error!("backlog query failed: {e}"),
        }
    }
}
