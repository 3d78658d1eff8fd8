use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000; // scheduler tick cadence
pub const DEFAULT_BATCH_LIMIT: usize = 100; // max due entries handled per tick
pub const DEFAULT_INDEX_COLLECTION: &str = "due_tasks";
pub const DEFAULT_TOPIC: &str = "tasks";
pub const DEFAULT_SUBSCRIPTION: &str = "task-consumer";
pub const DEFAULT_CONSUMER_POLL_MS: u64 = 250;
pub const DEFAULT_ACK_DEADLINE_SECS: u64 = 60; // lease before a delivery is retried
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 10;

/// Top-level config (herald.toml + HERALD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file shared by the document store and the delivery queue.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Flat collection holding one index entry per pending task.
    #[serde(default = "default_index_collection")]
    pub index_collection: String,
    /// Queue topic fired tasks are published to.
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            batch_limit: DEFAULT_BATCH_LIMIT,
            index_collection: default_index_collection(),
            topic: default_topic(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_subscription")]
    pub subscription: String,
    #[serde(default = "default_consumer_poll_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_ack_deadline_secs")]
    pub ack_deadline_secs: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            subscription: default_subscription(),
            poll_interval_ms: DEFAULT_CONSUMER_POLL_MS,
            ack_deadline_secs: DEFAULT_ACK_DEADLINE_SECS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Control endpoint of the running bot. When unset, chat actions are only logged.
    pub bridge_url: Option<String>,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bridge_url: None,
            timeout_secs: DEFAULT_CHAT_TIMEOUT_SECS,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}
fn default_index_collection() -> String {
    DEFAULT_INDEX_COLLECTION.to_string()
}
fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}
fn default_subscription() -> String {
    DEFAULT_SUBSCRIPTION.to_string()
}
fn default_consumer_poll_ms() -> u64 {
    DEFAULT_CONSUMER_POLL_MS
}
fn default_ack_deadline_secs() -> u64 {
    DEFAULT_ACK_DEADLINE_SECS
}
fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}
fn default_chat_timeout_secs() -> u64 {
    DEFAULT_CHAT_TIMEOUT_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.herald/herald.db", home)
}

impl HeraldConfig {
    /// Load config from a TOML file with HERALD_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `HERALD_SCHEDULER__POLL_INTERVAL_MS=500`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("HERALD_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.herald/herald.toml", home)
}
