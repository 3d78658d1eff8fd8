use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

/// One message handed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned message id, stable across redeliveries.
    pub message_id: String,
    pub topic: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
}

/// Callback run once per delivered message.
///
/// There is no return value on purpose: the queue acknowledges as soon as
/// `handle` returns, whatever the handler made of the message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: Delivery);
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Delivery) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, delivery: Delivery) {
        (self)(delivery).await
    }
}

/// Durable publish/subscribe channel between the scheduler and the consumer.
///
/// Delivery is at-least-once: a subscriber may see the same message more than
/// once and must tolerate it.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Publish `payload` to every subscription bound to `topic`.
    ///
    /// `Ok` means the message is durably queued. A topic without subscriptions
    /// is an error rather than a silent drop.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    /// Bind `subscription` to `topic`. Idempotent.
    async fn ensure_subscription(&self, subscription: &str, topic: &str) -> Result<()>;

    /// Deliver messages from `subscription` to `handler` until `shutdown` flips
    /// to `true`. Handlers may run concurrently for different messages.
    async fn subscribe(
        &self,
        subscription: &str,
        handler: Arc<dyn MessageHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>;
}
