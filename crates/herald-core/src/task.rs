use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::payload::TaskPayload;
use crate::timefmt;

/// Root collection for tasks that belong to no channel or user.
pub const GLOBAL_COLLECTION: &str = "tasks";
pub const CHANNELS_COLLECTION: &str = "channels";
pub const USERS_COLLECTION: &str = "users";

/// Every kind of deferred work the bot knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Reminder,
    BanRemoval,
    MuteRemoval,
    NotifyVoiceRequests,
    PersistentChannel,
    Reconnect,
    DisinfoBanRemoval,
    DisinfoMuteRemoval,
}

impl TaskKind {
    pub const ALL: [TaskKind; 8] = [
        TaskKind::Reminder,
        TaskKind::BanRemoval,
        TaskKind::MuteRemoval,
        TaskKind::NotifyVoiceRequests,
        TaskKind::PersistentChannel,
        TaskKind::Reconnect,
        TaskKind::DisinfoBanRemoval,
        TaskKind::DisinfoMuteRemoval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Reminder => "reminder",
            TaskKind::BanRemoval => "ban-removal",
            TaskKind::MuteRemoval => "mute-removal",
            TaskKind::NotifyVoiceRequests => "notify-voice-requests",
            TaskKind::PersistentChannel => "persistent-channel",
            TaskKind::Reconnect => "reconnect",
            TaskKind::DisinfoBanRemoval => "disinfo-ban-removal",
            TaskKind::DisinfoMuteRemoval => "disinfo-mute-removal",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownKind(s.to_string()))
    }
}

/// Lifecycle of a task record. Only `Pending` records fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Complete,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Complete => "complete",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "complete" => Ok(TaskStatus::Complete),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Hierarchy node a task record is stored under.
///
/// Wire form: `global`, `channel:<name>` or `user:<nick>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Owner {
    #[default]
    Global,
    Channel(String),
    User(String),
}

impl Owner {
    pub fn channel(name: impl Into<String>) -> Self {
        Owner::Channel(name.into())
    }

    pub fn user(nick: impl Into<String>) -> Self {
        Owner::User(nick.into())
    }

    /// Default owner for a payload: reminders belong to the requester, channel
    /// moderation to the channel, everything else to the global root.
    pub fn for_payload(payload: &TaskPayload) -> Self {
        match payload {
            TaskPayload::Reminder(r) => Owner::User(r.user.clone()),
            TaskPayload::Reconnect(_) => Owner::Global,
            other => other
                .channel()
                .map(|c| Owner::Channel(c.to_string()))
                .unwrap_or_default(),
        }
    }

    /// Reject names that would break the storage path.
    pub fn validate(&self) -> Result<()> {
        match self {
            Owner::Global => Ok(()),
            Owner::Channel(name) | Owner::User(name) => {
                if name.is_empty() || name.contains('/') {
                    Err(CoreError::InvalidOwner(self.to_string()))
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Owner::Global)
    }

    /// Collection holding this owner's task records.
    pub fn collection_path(&self) -> String {
        match self {
            Owner::Global => GLOBAL_COLLECTION.to_string(),
            Owner::Channel(name) => format!("{CHANNELS_COLLECTION}/{name}/tasks"),
            Owner::User(nick) => format!("{USERS_COLLECTION}/{nick}/tasks"),
        }
    }

    pub fn record_path(&self, id: &str) -> String {
        format!("{}/{id}", self.collection_path())
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Global => f.write_str("global"),
            Owner::Channel(name) => write!(f, "channel:{name}"),
            Owner::User(nick) => write!(f, "user:{nick}"),
        }
    }
}

impl FromStr for Owner {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let owner = match s.split_once(':') {
            None if s == "global" => Owner::Global,
            Some(("channel", name)) => Owner::Channel(name.to_string()),
            Some(("user", nick)) => Owner::User(nick.to_string()),
            _ => return Err(CoreError::InvalidOwner(s.to_string())),
        };
        owner.validate()?;
        Ok(owner)
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.to_string()
    }
}

impl TryFrom<String> for Owner {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Recurrence for persistent markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repeat {
    pub every_secs: u64,
    /// Stop after this many runs. `None` repeats until cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u32>,
}

impl Repeat {
    /// Longest accepted interval: one hundred 366-day years.
    pub const MAX_EVERY_SECS: u64 = 100 * 366 * 86_400;

    /// Reject intervals that would fire every tick or overflow the clock.
    pub fn validate(&self) -> Result<()> {
        if self.every_secs == 0 || self.every_secs > Self::MAX_EVERY_SECS {
            return Err(CoreError::InvalidRepeat(format!(
                "every_secs must be between 1 and {}, got {}",
                Self::MAX_EVERY_SECS,
                self.every_secs
            )));
        }
        Ok(())
    }
}

/// A durable unit of deferred work.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// UUID v4 string, stable for the task's lifetime.
    pub id: String,
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub status: TaskStatus,
    /// Number of completed runs; only tracked for run-capped tasks.
    pub runs: Option<u32>,
    pub repeat: Option<Repeat>,
    pub payload: TaskPayload,
}

impl TaskRecord {
    /// New pending task owned by the payload's natural owner.
    pub fn new(payload: TaskPayload, due_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner: Owner::for_payload(&payload),
            created_at: timefmt::truncate(Utc::now()),
            due_at: timefmt::truncate(due_at),
            status: TaskStatus::Pending,
            runs: None,
            repeat: None,
            payload,
        }
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    /// Make the task recurring. Run-capped tasks start counting runs at zero.
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        if repeat.max_runs.is_some() {
            self.runs = Some(self.runs.unwrap_or(0));
        }
        self.repeat = Some(repeat);
        self
    }

    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }

    /// Storage path of the authoritative record.
    pub fn path(&self) -> String {
        self.owner.record_path(&self.id)
    }

    /// Due time of the next occurrence after a run at `fired_at`, or `None`
    /// once the task is exhausted (one-shot, `max_runs` reached, or the next
    /// due time is past the end of the calendar).
    pub fn next_occurrence(&self, fired_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let repeat = self.repeat?;
        let runs = self.runs.unwrap_or(0) + 1;
        if repeat.max_runs.is_some_and(|max| runs >= max) {
            return None;
        }
        let every = Duration::try_seconds(i64::try_from(repeat.every_secs).ok()?)?;
        fired_at.checked_add_signed(every).map(timefmt::truncate)
    }

    /// Wire/document envelope as a JSON value.
    pub fn to_document(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Inverse of [`TaskRecord::to_document`]; dispatches on `type` first.
    pub fn from_document(doc: Value) -> Result<Self> {
        let envelope: Envelope = serde_json::from_value(doc)?;
        envelope.try_into()
    }

    /// Serialise for the delivery queue.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode bytes received from the delivery queue.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        envelope.try_into()
    }
}

/// Borrowed view used for serialisation.
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: TaskKind,
    #[serde(with = "timefmt::millis")]
    created_at: DateTime<Utc>,
    #[serde(with = "timefmt::millis")]
    due_at: DateTime<Utc>,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    runs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat: Option<Repeat>,
    owner: &'a Owner,
    data: &'a TaskPayload,
}

impl Serialize for TaskRecord {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        EnvelopeRef {
            id: &self.id,
            kind: self.kind(),
            created_at: self.created_at,
            due_at: self.due_at,
            status: self.status,
            runs: self.runs,
            repeat: self.repeat,
            owner: &self.owner,
            data: &self.payload,
        }
        .serialize(s)
    }
}

/// Generic envelope: everything typed except `data`, which stays opaque until
/// `type` has been resolved.
#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(with = "timefmt::millis")]
    created_at: DateTime<Utc>,
    #[serde(with = "timefmt::millis")]
    due_at: DateTime<Utc>,
    status: TaskStatus,
    #[serde(default)]
    runs: Option<u32>,
    #[serde(default)]
    repeat: Option<Repeat>,
    #[serde(default)]
    owner: Owner,
    #[serde(default)]
    data: Value,
}

impl TryFrom<Envelope> for TaskRecord {
    type Error = CoreError;

    fn try_from(env: Envelope) -> Result<Self> {
        let kind: TaskKind = env.kind.parse()?;
        let payload = TaskPayload::decode(kind, env.data)?;
        Ok(TaskRecord {
            id: env.id,
            owner: env.owner,
            created_at: env.created_at,
            due_at: env.due_at,
            status: env.status,
            runs: env.runs,
            repeat: env.repeat,
            payload,
        })
    }
}
