use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    db::init_db,
    error::{QueueError, Result},
    queue::{Delivery, DeliveryQueue, MessageHandler},
};

/// Tuning knobs for [`SqliteQueue`] subscribers.
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// How often a subscriber looks for new deliveries.
    pub poll_interval: Duration,
    /// A claimed delivery not acked within this window is handed out again.
    pub ack_deadline: Duration,
    /// Upper bound on concurrently running handlers per subscriber.
    pub max_in_flight: usize,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            ack_deadline: Duration::from_secs(60),
            max_in_flight: 16,
        }
    }
}

/// A delivery leased to this subscriber.
#[derive(Debug, Clone)]
pub struct Claimed {
    pub delivery_id: i64,
    pub delivery: Delivery,
}

/// Durable [`DeliveryQueue`] on SQLite.
///
/// The scheduler and consumer processes each open their own connection to the
/// same file. Claims run in `IMMEDIATE` transactions so two subscribers on one
/// subscription never lease the same row.
#[derive(Clone)]
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
    options: QueueOptions,
}

impl SqliteQueue {
    pub fn new(conn: Connection, options: QueueOptions) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            options,
        })
    }

    pub fn open_in_memory(options: QueueOptions) -> Result<Self> {
        Self::new(Connection::open_in_memory()?, options)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subscription_topic(&self, subscription: &str) -> Result<String> {
        self.conn()
            .query_row(
                "SELECT topic FROM queue_subscriptions WHERE name = ?1",
                [subscription],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| QueueError::UnknownSubscription {
                name: subscription.to_string(),
            })
    }

    /// Lease up to `max` deliveries whose lease is free or expired, oldest first.
    pub fn claim(&self, subscription: &str, max: usize) -> Result<Vec<Claimed>> {
        let now = Utc::now().timestamp_millis();
        let lease_until = now + self.options.ack_deadline.as_millis() as i64;

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let claimed: Vec<Claimed> = {
            let mut stmt = tx.prepare_cached(
                "SELECT d.id, d.message_id, d.attempts, m.topic, m.payload
                 FROM queue_deliveries d
                 JOIN queue_messages m ON m.id = d.message_id
                 WHERE d.subscription = ?1
                   AND (d.lease_until IS NULL OR d.lease_until <= ?2)
                 ORDER BY d.id
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![subscription, now, max as i64],
                |row| {
                    Ok(Claimed {
                        delivery_id: row.get(0)?,
                        delivery: Delivery {
                            message_id: row.get::<_, i64>(1)?.to_string(),
                            // attempts is bumped below
                            attempt: row.get::<_, u32>(2)? + 1,
                            topic: row.get(3)?,
                            payload: row.get(4)?,
                        },
                    })
                },
            )?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        for c in &claimed {
            tx.execute(
                "UPDATE queue_deliveries SET lease_until = ?1, attempts = attempts + 1
                 WHERE id = ?2",
                rusqlite::params![lease_until, c.delivery_id],
            )?;
        }
        tx.commit()?;
        Ok(claimed)
    }

    /// Acknowledge a delivery; drops the message once every subscription has acked it.
    pub fn ack(&self, delivery_id: i64) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let message_id: Option<i64> = tx
            .query_row(
                "SELECT message_id FROM queue_deliveries WHERE id = ?1",
                [delivery_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(message_id) = message_id {
            tx.execute("DELETE FROM queue_deliveries WHERE id = ?1", [delivery_id])?;
            tx.execute(
                "DELETE FROM queue_messages
                 WHERE id = ?1
                   AND NOT EXISTS (SELECT 1 FROM queue_deliveries WHERE message_id = ?1)",
                [message_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Deliveries not yet acked on `subscription`, leased or not.
    pub fn backlog(&self, subscription: &str) -> Result<usize> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM queue_deliveries WHERE subscription = ?1",
            [subscription],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[async_trait]
impl DeliveryQueue for SqliteQueue {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO queue_messages (topic, payload, published_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![topic, payload, Utc::now().to_rfc3339()],
        )?;
        let message_id = tx.last_insert_rowid();
        let fanout = tx.execute(
            "INSERT INTO queue_deliveries (subscription, message_id)
             SELECT name, ?1 FROM queue_subscriptions WHERE topic = ?2",
            rusqlite::params![message_id, topic],
        )?;
        if fanout == 0 {
            // dropping `tx` rolls the message insert back
            return Err(QueueError::NoSubscribers {
                topic: topic.to_string(),
            });
        }
        tx.commit()?;
        debug!(%topic, message_id, subscriptions = fanout, "message published");
        Ok(())
    }

    async fn ensure_subscription(&self, subscription: &str, topic: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO queue_subscriptions (name, topic, created_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![subscription, topic, Utc::now().to_rfc3339()],
        )?;
        let bound: String = conn.query_row(
            "SELECT topic FROM queue_subscriptions WHERE name = ?1",
            [subscription],
            |row| row.get(0),
        )?;
        if bound != topic {
            return Err(QueueError::TopicMismatch {
                name: subscription.to_string(),
                topic: bound,
            });
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        subscription: &str,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let topic = self.subscription_topic(subscription)?;
        let permits = Arc::new(Semaphore::new(self.options.max_in_flight.max(1)));
        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(%subscription, %topic, "subscriber started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let free = permits.available_permits();
                    if free == 0 {
                        continue;
                    }
                    let claimed = match self.claim(subscription, free) {
                        Ok(c) => c,
                        Err(e) => {
                            error!(%subscription, "claim failed: {e}");
                            continue;
                        }
                    };
                    for c in claimed {
                        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                            break;
                        };
                        if c.delivery.attempt > 1 {
                            warn!(
                                message_id = %c.delivery.message_id,
                                attempt = c.delivery.attempt,
                                "redelivering message"
                            );
                        }
                        let queue = self.clone();
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            let delivery_id = c.delivery_id;
                            handler.handle(c.delivery).await;
                            if let Err(e) = queue.ack(delivery_id) {
                                // lease will expire and the message comes back
                                warn!(delivery_id, "ack failed: {e}");
                            }
                            drop(permit);
                        });
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!(%subscription, "subscriber shutting down");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
