use chrono::{DateTime, Utc};
use herald_core::TaskRecord;

use crate::types::Retirement;

/// Decide what happens to `record` once its task has been published at `fired_at`.
///
/// Recurring tasks move to their next occurrence until `max_runs` is used up.
/// Exhausted global records are deleted; records under a channel or user are
/// kept as history.
pub fn retirement_for(record: &TaskRecord, fired_at: DateTime<Utc>) -> Retirement {
    if let Some(due_at) = record.next_occurrence(fired_at) {
        return Retirement::Rescheduled { due_at };
    }
    if record.owner.is_global() {
        Retirement::Deleted
    } else {
        Retirement::Completed
    }
}
