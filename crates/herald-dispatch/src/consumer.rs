use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{CoreError, TaskKind, TaskRecord};
use herald_queue::{Delivery, MessageHandler};
use tracing::{debug, error, info, warn};

use crate::{dispatcher::Dispatcher, error::DispatchError};

/// What the consumer made of one delivery. Every outcome is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Handled(TaskKind),
    /// Envelope `type` this build does not know.
    UnknownKind(String),
    /// Bytes were not a valid envelope, or `data` did not fit its `type`.
    Malformed,
    NoHandler(TaskKind),
    /// The handler ran and failed.
    Failed(TaskKind),
}

/// Queue subscriber that decodes task envelopes and runs their handlers.
pub struct Consumer {
    dispatcher: Arc<Dispatcher>,
}

impl Consumer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Decode and dispatch one delivery. Never fails: problems are logged and
    /// reported in the returned [`Outcome`].
    pub async fn process(&self, delivery: &Delivery) -> Outcome {
        if delivery.attempt > 1 {
            debug!(message_id = %delivery.message_id, attempt = delivery.attempt, "processing redelivery");
        }

        let task = match TaskRecord::decode(&delivery.payload) {
            Ok(t) => t,
            Err(CoreError::UnknownKind(kind)) => {
                warn!(message_id = %delivery.message_id, %kind, "unknown task type, dropping message");
                return Outcome::UnknownKind(kind);
            }
            Err(e) => {
                error!(message_id = %delivery.message_id, "malformed task envelope, dropping message: {e}");
                return Outcome::Malformed;
            }
        };

        let kind = task.kind();
        match self.dispatcher.dispatch(&task).await {
            Ok(()) => {
                info!(task_id = %task.id, %kind, "task handled");
                Outcome::Handled(kind)
            }
            Err(DispatchError::NoHandler(kind)) => {
                warn!(task_id = %task.id, %kind, "no handler registered, dropping task");
                Outcome::NoHandler(kind)
            }
            Err(e) => {
                error!(task_id = %task.id, %kind, "task handler failed: {e}");
                Outcome::Failed(kind)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Consumer {
    async fn handle(&self, delivery: Delivery) {
        self.process(&delivery).await;
    }
}
