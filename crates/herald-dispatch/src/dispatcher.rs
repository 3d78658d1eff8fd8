use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use herald_core::{TaskKind, TaskRecord};
use tracing::{debug, info};

use crate::{
    chat::ChatClient,
    error::{DispatchError, Result},
    handlers::{
        DisinfoPenaltyHandler, ModeRemovalHandler, PersistentChannelHandler, ReconnectHandler,
        ReminderHandler, TaskHandler, VoiceRequestHandler,
    },
};

/// Registry mapping each task kind to the handler that runs it.
///
/// Built once at startup and shared as `Arc<Dispatcher>`.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with the built-in handler for every kind.
    pub fn with_chat_handlers(chat: Arc<dyn ChatClient>) -> Self {
        let mut d = Self::new();
        let mode: Arc<dyn TaskHandler> = Arc::new(ModeRemovalHandler::new(Arc::clone(&chat)));
        let disinfo: Arc<dyn TaskHandler> = Arc::new(DisinfoPenaltyHandler::new(Arc::clone(&chat)));
        d.register(TaskKind::Reminder, Arc::new(ReminderHandler::new(Arc::clone(&chat))));
        d.register(TaskKind::BanRemoval, Arc::clone(&mode));
        d.register(TaskKind::MuteRemoval, mode);
        d.register(
            TaskKind::NotifyVoiceRequests,
            Arc::new(VoiceRequestHandler::new(Arc::clone(&chat))),
        );
        d.register(
            TaskKind::PersistentChannel,
            Arc::new(PersistentChannelHandler::new(Arc::clone(&chat))),
        );
        d.register(TaskKind::Reconnect, Arc::new(ReconnectHandler::new(Arc::clone(&chat))));
        d.register(TaskKind::DisinfoBanRemoval, Arc::clone(&disinfo));
        d.register(TaskKind::DisinfoMuteRemoval, disinfo);
        info!(chat = chat.name(), kinds = d.handlers.len(), "chat handlers registered");
        d
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) {
        if self.handlers.insert(kind, handler).is_some() {
            debug!(%kind, "handler replaced");
        }
    }

    pub fn handles(&self, kind: TaskKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler registered for the task's kind.
    pub async fn dispatch(&self, task: &TaskRecord) -> Result<()> {
        let kind = task.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(DispatchError::NoHandler(kind))?;

        let t = Instant::now();
        handler.handle(task).await?;
        debug!(
            task_id = %task.id,
            %kind,
            duration_ms = t.elapsed().as_millis() as u64,
            "handler completed"
        );
        Ok(())
    }
}
