use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use herald_core::{
    config::{DEFAULT_BATCH_LIMIT, DEFAULT_INDEX_COLLECTION},
    timefmt, Owner, TaskKind, TaskRecord, TaskStatus,
};
use herald_store::{Direction, DocumentStore, Op, Query, StoreError};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{Result, SchedulerError},
    schedule::retirement_for,
    types::{DueTask, IndexEntry, Retirement},
};

/// What [`TaskManager::due`] made of one index entry.
enum Examined {
    Due(Box<DueTask>),
    /// Left indexed; retried next poll.
    Skipped,
    /// Stale entry removed from the index.
    Dropped,
}

/// Producer-side API over the task hierarchy and its due-task index.
///
/// Cheap to share behind an `Arc`; every method goes straight to the store.
pub struct TaskManager {
    store: Arc<dyn DocumentStore>,
    index_collection: String,
    batch_limit: usize,
}

impl TaskManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            index_collection: DEFAULT_INDEX_COLLECTION.to_string(),
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    pub fn with_index_collection(mut self, collection: impl Into<String>) -> Self {
        self.index_collection = collection.into();
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn index_collection(&self) -> &str {
        &self.index_collection
    }

    fn index_path(&self, id: &str) -> String {
        format!("{}/{id}", self.index_collection)
    }

    /// Persist a new pending task and index it.
    ///
    /// The record is written before its index entry. If the index write fails
    /// the record is removed again so the caller can retry with the same id.
    #[instrument(skip(self, record), fields(task_id = %record.id, kind = %record.kind()))]
    pub async fn add_task(&self, record: &TaskRecord) -> Result<()> {
        if record.status != TaskStatus::Pending {
            return Err(SchedulerError::InvalidStatus(record.status));
        }
        record.owner.validate()?;
        if let Some(repeat) = record.repeat {
            repeat.validate()?;
        }

        let path = record.path();
        self.store.create(&path, &record.to_document()?).await?;

        let entry = IndexEntry::for_record(record);
        let index_path = self.index_path(&record.id);
        if let Err(e) = self
            .store
            .create(&index_path, &serde_json::to_value(&entry)?)
            .await
        {
            warn!(%path, "index write failed, rolling back record: {e}");
            if let Err(rollback) = self.store.remove(&path).await {
                warn!(%path, "rollback failed, record left un-indexed: {rollback}");
            }
            return Err(e.into());
        }

        info!(%path, due_at = %timefmt::format(&record.due_at), "task added");
        Ok(())
    }

    /// End a task early with a terminal `status`.
    ///
    /// Returns `false` when the task had no index entry (already fired or
    /// already removed), so repeated calls are harmless.
    #[instrument(skip(self))]
    pub async fn remove_task(&self, id: &str, status: TaskStatus) -> Result<bool> {
        if !status.is_terminal() {
            return Err(SchedulerError::InvalidStatus(status));
        }

        let index_path = self.index_path(id);
        let Some(doc) = self.store.get(&index_path).await? else {
            debug!("no index entry, nothing to remove");
            return Ok(false);
        };
        let entry: IndexEntry = serde_json::from_value(doc)?;

        self.store.remove(&index_path).await?;

        let mut fields = Map::new();
        fields.insert("status".into(), json!(status.as_str()));
        match self.store.update(&entry.path, &fields).await {
            Ok(()) => {}
            Err(StoreError::NotFound { path }) => {
                warn!(%path, "index entry pointed at a missing record");
            }
            Err(e) => return Err(e.into()),
        }

        info!(path = %entry.path, %status, "task removed");
        Ok(true)
    }

    /// Index entries with `due_at <= now`, resolved to their pending records.
    ///
    /// Returns at most `batch_limit` tasks, oldest first. Entries that fail to
    /// resolve stay indexed for the next poll and do not count against the
    /// limit; entries whose record is no longer pending are dropped from the
    /// index.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<DueTask>> {
        let mut due = Vec::new();
        let mut seen = HashSet::new();
        // entries left in the index that did not yield a task
        let mut skipped = 0usize;

        loop {
            let limit = self.batch_limit + skipped;
            let query = Query::new(self.index_collection.as_str())
                .filter("due_at", Op::Le, timefmt::format(&now))
                .order_by("due_at", Direction::Asc)
                .limit(limit);
            let docs = self.store.query(&query).await?;
            let exhausted = docs.len() < limit;

            let mut fresh = 0usize;
            for doc in docs {
                if due.len() >= self.batch_limit {
                    break;
                }
                if !seen.insert(doc.path.clone()) {
                    continue;
                }
                fresh += 1;
                match self.examine(&doc.path, doc.data).await {
                    Examined::Due(task) => due.push(*task),
                    Examined::Skipped => skipped += 1,
                    Examined::Dropped => {}
                }
            }

            if due.len() >= self.batch_limit || exhausted || fresh == 0 {
                break;
            }
        }
        Ok(due)
    }

    async fn examine(&self, doc_path: &str, data: Value) -> Examined {
        let entry: IndexEntry = match serde_json::from_value(data) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %doc_path, "unreadable index entry: {e}");
                return Examined::Skipped;
            }
        };
        let record = match self.resolve(&entry).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                warn!(task_id = %entry.id, path = %entry.path, "index entry points at a missing record");
                return Examined::Skipped;
            }
            Err(e) => {
                warn!(task_id = %entry.id, path = %entry.path, "could not resolve due task: {e}");
                return Examined::Skipped;
            }
        };

        if record.status != TaskStatus::Pending {
            debug!(task_id = %entry.id, status = %record.status, "dropping stale index entry");
            if let Err(e) = self.store.remove(&self.index_path(&entry.id)).await {
                warn!(task_id = %entry.id, "stale index entry not removed: {e}");
                return Examined::Skipped;
            }
            return Examined::Dropped;
        }
        Examined::Due(Box::new(DueTask { entry, record }))
    }

    /// Same as [`TaskManager::due`] without the index bookkeeping.
    pub async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>> {
        Ok(self.due(now).await?.into_iter().map(|d| d.record).collect())
    }

    /// Number of index entries already due at `now`, without a batch limit.
    pub async fn overdue_count(&self, now: DateTime<Utc>) -> Result<usize> {
        let query = Query::new(self.index_collection.as_str()).filter(
            "due_at",
            Op::Le,
            timefmt::format(&now),
        );
        Ok(self.store.query(&query).await?.len())
    }

    /// Pending tasks of `kind` stored under `owner`, soonest first.
    pub async fn pending_tasks_for(&self, owner: &Owner, kind: TaskKind) -> Result<Vec<TaskRecord>> {
        owner.validate()?;
        let query = Query::new(owner.collection_path())
            .filter("type", Op::Eq, kind.as_str())
            .filter("status", Op::Eq, TaskStatus::Pending.as_str())
            .order_by("due_at", Direction::Asc);

        self.store
            .query(&query)
            .await?
            .into_iter()
            .map(|doc| TaskRecord::from_document(doc.data).map_err(SchedulerError::from))
            .collect()
    }

    pub async fn get_task(&self, owner: &Owner, id: &str) -> Result<Option<TaskRecord>> {
        owner.validate()?;
        match self.store.get(&owner.record_path(id)).await? {
            Some(doc) => Ok(Some(TaskRecord::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Delete the index entry of a task that has just been published.
    pub async fn unindex(&self, id: &str) -> Result<()> {
        Ok(self.store.remove(&self.index_path(id)).await?)
    }

    /// Move a published record to its post-fire state.
    pub async fn retire(&self, record: &TaskRecord, fired_at: DateTime<Utc>) -> Result<Retirement> {
        let retirement = retirement_for(record, fired_at);
        let path = record.path();
        let runs = record.runs.map(|n| n + 1);

        match retirement {
            Retirement::Deleted => {
                self.store.remove(&path).await?;
            }
            Retirement::Completed => {
                let mut fields = Map::new();
                fields.insert("status".into(), json!(TaskStatus::Complete.as_str()));
                if let Some(n) = runs {
                    fields.insert("runs".into(), json!(n));
                }
                self.store.update(&path, &fields).await?;
            }
            Retirement::Rescheduled { due_at } => {
                let mut fields = Map::new();
                fields.insert("due_at".into(), Value::String(timefmt::format(&due_at)));
                if let Some(n) = runs {
                    fields.insert("runs".into(), json!(n));
                }
                self.store.update(&path, &fields).await?;

                let entry = IndexEntry {
                    due_at,
                    ..IndexEntry::for_record(record)
                };
                let index_path = self.index_path(&record.id);
                if let Err(e) = self
                    .store
                    .create(&index_path, &serde_json::to_value(&entry)?)
                    .await
                {
                    error!(
                        task_id = %record.id,
                        %path,
                        "rescheduled task lost its index entry and will not fire again: {e}"
                    );
                    return Err(e.into());
                }
            }
        }
        debug!(task_id = %record.id, %path, ?retirement, "task retired");
        Ok(retirement)
    }

    async fn resolve(&self, entry: &IndexEntry) -> Result<Option<TaskRecord>> {
        match self.store.get(&entry.path).await? {
            Some(doc) => Ok(Some(TaskRecord::from_document(doc)?)),
            None => Ok(None),
        }
    }
}
