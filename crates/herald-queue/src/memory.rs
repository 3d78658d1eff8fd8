use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, info};

use crate::{
    error::{QueueError, Result},
    queue::{Delivery, DeliveryQueue, MessageHandler},
};

struct Subscription {
    topic: String,
    tx: mpsc::UnboundedSender<Delivery>,
    /// Taken while a subscriber is attached, put back when it detaches.
    rx: Option<mpsc::UnboundedReceiver<Delivery>>,
}

/// In-process [`DeliveryQueue`].
///
/// Messages published before anyone subscribes are buffered per
/// subscription. Nothing survives the process and there is no redelivery.
pub struct MemoryQueue {
    subs: Mutex<HashMap<String, Subscription>>,
    next_id: AtomicU64,
    max_in_flight: usize,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(16)
    }
}

impl MemoryQueue {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            subs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_in_flight: max_in_flight.max(1),
        }
    }

    fn subs(&self) -> MutexGuard<'_, HashMap<String, Subscription>> {
        self.subs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DeliveryQueue for MemoryQueue {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let message_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let subs = self.subs();
        let mut fanout = 0;
        for sub in subs.values().filter(|s| s.topic == topic) {
            let delivery = Delivery {
                message_id: message_id.clone(),
                topic: topic.to_string(),
                payload: payload.to_vec(),
                attempt: 1,
            };
            sub.tx
                .send(delivery)
                .map_err(|_| QueueError::Unavailable("subscription channel closed".into()))?;
            fanout += 1;
        }
        if fanout == 0 {
            return Err(QueueError::NoSubscribers {
                topic: topic.to_string(),
            });
        }
        debug!(%topic, %message_id, subscriptions = fanout, "message published");
        Ok(())
    }

    async fn ensure_subscription(&self, subscription: &str, topic: &str) -> Result<()> {
        let mut subs = self.subs();
        if let Some(existing) = subs.get(subscription) {
            if existing.topic != topic {
                return Err(QueueError::TopicMismatch {
                    name: subscription.to_string(),
                    topic: existing.topic.clone(),
                });
            }
            return Ok(());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        subs.insert(
            subscription.to_string(),
            Subscription {
                topic: topic.to_string(),
                tx,
                rx: Some(rx),
            },
        );
        Ok(())
    }

    async fn subscribe(
        &self,
        subscription: &str,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut rx = {
            let mut subs = self.subs();
            let sub = subs
                .get_mut(subscription)
                .ok_or_else(|| QueueError::UnknownSubscription {
                    name: subscription.to_string(),
                })?;
            sub.rx.take().ok_or_else(|| QueueError::AlreadySubscribed {
                name: subscription.to_string(),
            })?
        };

        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        info!(%subscription, "in-memory subscriber started");
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    // senders live in `self.subs`
                    let Some(delivery) = msg else { break };
                    let Ok(permit) = Arc::clone(&permits).acquire_owned().await else { break };
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        handler.handle(delivery).await;
                        drop(permit);
                    });
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!(%subscription, "in-memory subscriber shutting down");
                        break;
                    }
                }
            }
        }

        if let Some(sub) = self.subs().get_mut(subscription) {
            sub.rx = Some(rx);
        }
        Ok(())
    }
}
