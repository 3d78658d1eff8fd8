use chrono::{DateTime, Utc};
use herald_core::{timefmt, TaskKind, TaskRecord};
use serde::{Deserialize, Serialize};

/// Row in the flat due-task index.
///
/// Task records live under their owner (`users/alice/tasks/{id}`), which makes
/// "what is due now" impossible to answer with one query. The index mirrors
/// just enough of each pending record to answer it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Same id as the task record; also the index document id.
    pub id: String,
    /// Informational copy of the record's kind.
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(with = "timefmt::millis")]
    pub due_at: DateTime<Utc>,
    /// Storage path of the authoritative record.
    pub path: String,
}

impl IndexEntry {
    pub fn for_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind(),
            due_at: record.due_at,
            path: record.path(),
        }
    }
}

/// A due index entry together with the record it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct DueTask {
    pub entry: IndexEntry,
    pub record: TaskRecord,
}

/// What became of a record after its task was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    /// Owned record kept for history with status `complete`.
    Completed,
    /// Global one-shot record deleted.
    Deleted,
    /// Recurring record moved to its next occurrence and re-indexed.
    Rescheduled { due_at: DateTime<Utc> },
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The index query itself failed; nothing else was attempted.
    pub query_failed: bool,
    /// Due entries that resolved to a pending record.
    pub due: usize,
    pub published: usize,
    /// Left indexed, retried next tick.
    pub publish_failed: usize,
    /// Published, but index delete or record update failed.
    pub retire_failed: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        !self.query_failed && self.due == 0
    }
}
