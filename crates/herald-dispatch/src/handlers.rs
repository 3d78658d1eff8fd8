//! Built-in handlers, one per task kind, all driving a [`ChatClient`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::{payload::Reminder, TaskPayload, TaskRecord};
use tracing::{debug, info};

use crate::{
    chat::ChatClient,
    error::{DispatchError, Result},
    humanize,
};

/// Runs the side effect of one delivered task.
///
/// Deliveries are at-least-once, so handlers should be safe to run twice.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &TaskRecord) -> Result<()>;
}

fn wrong_payload(expected: &'static str, task: &TaskRecord) -> DispatchError {
    DispatchError::WrongPayload {
        expected,
        got: task.kind(),
    }
}

/// Text sent when a reminder comes due.
pub fn reminder_text(reminder: &Reminder, created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!(
        "{}: {} ago you asked me to remind you: {}",
        reminder.user,
        humanize::elapsed(now - created_at),
        reminder.content
    )
}

pub struct ReminderHandler {
    chat: Arc<dyn ChatClient>,
    clock: fn() -> DateTime<Utc>,
}

impl ReminderHandler {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self {
            chat,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl TaskHandler for ReminderHandler {
    async fn handle(&self, task: &TaskRecord) -> Result<()> {
        let TaskPayload::Reminder(reminder) = &task.payload else {
            return Err(wrong_payload("reminder", task));
        };
        let text = reminder_text(reminder, task.created_at, (self.clock)());
        self.chat.send_message(&reminder.destination, &text).await?;
        info!(task_id = %task.id, user = %reminder.user, destination = %reminder.destination, "reminder delivered");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Penalty {
    Ban,
    Mute,
}

impl Penalty {
    fn noun(self) -> &'static str {
        match self {
            Penalty::Ban => "ban",
            Penalty::Mute => "mute",
        }
    }
}

/// Lift a ban or mute; a penalty that is already gone counts as lifted.
async fn lift(chat: &dyn ChatClient, penalty: Penalty, channel: &str, mask: &str) -> Result<()> {
    let res = match penalty {
        Penalty::Ban => chat.unban(channel, mask).await,
        Penalty::Mute => chat.unmute(channel, mask).await,
    };
    match res {
        Ok(()) => {
            info!(%channel, %mask, penalty = penalty.noun(), "penalty lifted");
            Ok(())
        }
        Err(e) if e.is_already_done() => {
            debug!(%channel, %mask, "{e}; nothing to lift");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Expiry of temporary bans and mutes.
pub struct ModeRemovalHandler {
    chat: Arc<dyn ChatClient>,
}

impl ModeRemovalHandler {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl TaskHandler for ModeRemovalHandler {
    async fn handle(&self, task: &TaskRecord) -> Result<()> {
        let (penalty, m) = match &task.payload {
            TaskPayload::BanRemoval(m) => (Penalty::Ban, m),
            TaskPayload::MuteRemoval(m) => (Penalty::Mute, m),
            _ => return Err(wrong_payload("ban-removal/mute-removal", task)),
        };
        lift(self.chat.as_ref(), penalty, &m.channel, &m.mask).await
    }
}

/// Tells a channel who is waiting for voice.
pub struct VoiceRequestHandler {
    chat: Arc<dyn ChatClient>,
}

impl VoiceRequestHandler {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl TaskHandler for VoiceRequestHandler {
    async fn handle(&self, task: &TaskRecord) -> Result<()> {
        let TaskPayload::NotifyVoiceRequests(v) = &task.payload else {
            return Err(wrong_payload("notify-voice-requests", task));
        };
        if v.nicks.is_empty() {
            debug!(channel = %v.channel, "no pending voice requests");
            return Ok(());
        }
        let text = format!("Waiting for voice in {}: {}", v.channel, v.nicks.join(", "));
        self.chat.send_message(&v.channel, &text).await?;
        Ok(())
    }
}

/// Keeps the bot in its persistent channels.
pub struct PersistentChannelHandler {
    chat: Arc<dyn ChatClient>,
}

impl PersistentChannelHandler {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl TaskHandler for PersistentChannelHandler {
    async fn handle(&self, task: &TaskRecord) -> Result<()> {
        let TaskPayload::PersistentChannel(p) = &task.payload else {
            return Err(wrong_payload("persistent-channel", task));
        };
        self.chat.join(&p.channel).await?;
        Ok(())
    }
}

pub struct ReconnectHandler {
    chat: Arc<dyn ChatClient>,
}

impl ReconnectHandler {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl TaskHandler for ReconnectHandler {
    async fn handle(&self, task: &TaskRecord) -> Result<()> {
        let TaskPayload::Reconnect(r) = &task.payload else {
            return Err(wrong_payload("reconnect", task));
        };
        info!(network = %r.network, reason = r.reason.as_deref().unwrap_or("scheduled"), "reconnecting");
        self.chat.reconnect(&r.network).await?;
        Ok(())
    }
}

/// Lifts a disinformation penalty and tells the nick about it.
pub struct DisinfoPenaltyHandler {
    chat: Arc<dyn ChatClient>,
}

impl DisinfoPenaltyHandler {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl TaskHandler for DisinfoPenaltyHandler {
    async fn handle(&self, task: &TaskRecord) -> Result<()> {
        let (penalty, d) = match &task.payload {
            TaskPayload::DisinfoBanRemoval(d) => (Penalty::Ban, d),
            TaskPayload::DisinfoMuteRemoval(d) => (Penalty::Mute, d),
            _ => return Err(wrong_payload("disinfo-ban-removal/disinfo-mute-removal", task)),
        };
        lift(self.chat.as_ref(), penalty, &d.channel, &d.mask).await?;

        let text = format!(
            "{}: your {} in {} has expired. Please check your sources before sharing.",
            d.nick,
            penalty.noun(),
            d.channel
        );
        self.chat.send_message(&d.nick, &text).await?;
        Ok(())
    }
}
