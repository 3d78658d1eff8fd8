use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use herald_core::config::HeraldConfig;
use herald_dispatch::{ChatClient, Consumer, Dispatcher, HttpChatBridge, LogChat};
use herald_queue::{DeliveryQueue, QueueOptions, SqliteQueue};
use herald_scheduler::{SchedulerEngine, TaskManager};
use herald_store::{DocumentStore, SqliteStore};
use rusqlite::Connection;
use tokio::sync::watch;
use tracing::info;

/// Shared pieces built once from config and handed to every role.
///
/// Store and queue share one SQLite file but each owns its connection.
pub struct App {
    pub config: HeraldConfig,
    pub tasks: Arc<TaskManager>,
    pub queue: Arc<dyn DeliveryQueue>,
}

impl App {
    pub fn open(config: HeraldConfig) -> anyhow::Result<Self> {
        let db_path = config.database.path.clone();
        ensure_parent_dir(&db_path);
        info!(path = %db_path, "opening SQLite database");

        let store: Arc<dyn DocumentStore> = Arc::new(
            SqliteStore::new(open_connection(&db_path)?).context("document store schema")?,
        );
        let tasks = Arc::new(
            TaskManager::new(store)
                .with_index_collection(config.scheduler.index_collection.clone())
                .with_batch_limit(config.scheduler.batch_limit),
        );

        let options = queue_options(&config);
        let queue: Arc<dyn DeliveryQueue> = Arc::new(
            SqliteQueue::new(open_connection(&db_path)?, options).context("queue schema")?,
        );

        Ok(Self {
            config,
            tasks,
            queue,
        })
    }

    /// Bind the consumer subscription to the scheduler topic.
    ///
    /// Done by every role at startup so the scheduler never publishes into a
    /// topic nobody is subscribed to.
    pub async fn ensure_subscription(&self) -> anyhow::Result<()> {
        self.queue
            .ensure_subscription(&self.config.consumer.subscription, &self.config.scheduler.topic)
            .await
            .context("binding consumer subscription")?;
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerEngine {
        SchedulerEngine::new(Arc::clone(&self.tasks), Arc::clone(&self.queue))
            .with_topic(self.config.scheduler.topic.clone())
            .with_poll_interval(Duration::from_millis(self.config.scheduler.poll_interval_ms.max(1)))
    }

    pub fn chat(&self) -> anyhow::Result<Arc<dyn ChatClient>> {
        match self.config.chat.bridge_url {
            Some(ref url) => {
                info!(%url, "using HTTP chat bridge");
                let bridge = HttpChatBridge::new(url.clone(), Duration::from_secs(self.config.chat.timeout_secs))
                    .context("building chat bridge client")?;
                Ok(Arc::new(bridge))
            }
            None => {
                info!("no chat.bridge_url configured, chat actions will only be logged");
                Ok(Arc::new(LogChat))
            }
        }
    }

    /// Run the consumer until `shutdown` flips.
    pub async fn run_consumer(&self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let dispatcher = Dispatcher::with_chat_handlers(self.chat()?);
        let consumer = Arc::new(Consumer::new(Arc::new(dispatcher)));
        let subscription = &self.config.consumer.subscription;
        info!(%subscription, "task consumer started");
        self.queue
            .subscribe(subscription, consumer, shutdown)
            .await
            .context("consumer subscription")?;
        Ok(())
    }
}

/// Zero intervals or concurrency would stall or panic the poll loop.
fn queue_options(config: &HeraldConfig) -> QueueOptions {
    QueueOptions {
        poll_interval: Duration::from_millis(config.consumer.poll_interval_ms.max(1)),
        ack_deadline: Duration::from_secs(config.consumer.ack_deadline_secs),
        max_in_flight: config.consumer.max_in_flight.max(1),
    }
}

fn open_connection(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("opening {path}"))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
