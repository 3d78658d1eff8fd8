//! Typed task payloads.
//!
//! `data` on the wire is just JSON; its shape is chosen by the envelope's
//! `type`. [`TaskPayload::decode`] is the only place that turns the pair back
//! into a concrete variant.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::task::TaskKind;

/// "Remind me in 2h to buy milk".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Nick of the user who asked.
    pub user: String,
    /// Channel or nick the reminder is delivered to.
    pub destination: String,
    pub content: String,
}

/// Expiry of a temporary ban or mute placed on `mask` in `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRemoval {
    pub mask: String,
    pub channel: String,
}

/// Periodic nudge telling channel operators who is waiting for voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRequests {
    pub channel: String,
    #[serde(default)]
    pub nicks: Vec<String>,
}

/// Recurring marker keeping the bot joined to `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentChannel {
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconnect {
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Expiry of a penalty handed out for posting disinformation. The penalised
/// nick is told when it is lifted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisinfoPenalty {
    pub nick: String,
    pub mask: String,
    pub channel: String,
}

/// Closed set of payloads, one variant per [`TaskKind`].
///
/// Serialises as the bare variant body (the kind travels separately as the
/// envelope `type`). There is deliberately no `Deserialize` impl: two kinds
/// share a body shape, so decoding must go through [`TaskPayload::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TaskPayload {
    Reminder(Reminder),
    BanRemoval(ModeRemoval),
    MuteRemoval(ModeRemoval),
    NotifyVoiceRequests(VoiceRequests),
    PersistentChannel(PersistentChannel),
    Reconnect(Reconnect),
    DisinfoBanRemoval(DisinfoPenalty),
    DisinfoMuteRemoval(DisinfoPenalty),
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Reminder(_) => TaskKind::Reminder,
            TaskPayload::BanRemoval(_) => TaskKind::BanRemoval,
            TaskPayload::MuteRemoval(_) => TaskKind::MuteRemoval,
            TaskPayload::NotifyVoiceRequests(_) => TaskKind::NotifyVoiceRequests,
            TaskPayload::PersistentChannel(_) => TaskKind::PersistentChannel,
            TaskPayload::Reconnect(_) => TaskKind::Reconnect,
            TaskPayload::DisinfoBanRemoval(_) => TaskKind::DisinfoBanRemoval,
            TaskPayload::DisinfoMuteRemoval(_) => TaskKind::DisinfoMuteRemoval,
        }
    }

    /// Recover the concrete payload for `kind` from untyped `data`.
    pub fn decode(kind: TaskKind, data: Value) -> Result<Self> {
        let payload = match kind {
            TaskKind::Reminder => TaskPayload::Reminder(body(kind, data)?),
            TaskKind::BanRemoval => TaskPayload::BanRemoval(body(kind, data)?),
            TaskKind::MuteRemoval => TaskPayload::MuteRemoval(body(kind, data)?),
            TaskKind::NotifyVoiceRequests => TaskPayload::NotifyVoiceRequests(body(kind, data)?),
            TaskKind::PersistentChannel => TaskPayload::PersistentChannel(body(kind, data)?),
            TaskKind::Reconnect => TaskPayload::Reconnect(body(kind, data)?),
            TaskKind::DisinfoBanRemoval => TaskPayload::DisinfoBanRemoval(body(kind, data)?),
            TaskKind::DisinfoMuteRemoval => TaskPayload::DisinfoMuteRemoval(body(kind, data)?),
        };
        Ok(payload)
    }

    /// Channel the task acts on, if it has one.
    pub fn channel(&self) -> Option<&str> {
        match self {
            TaskPayload::Reminder(_) | TaskPayload::Reconnect(_) => None,
            TaskPayload::BanRemoval(m) | TaskPayload::MuteRemoval(m) => Some(&m.channel),
            TaskPayload::NotifyVoiceRequests(v) => Some(&v.channel),
            TaskPayload::PersistentChannel(p) => Some(&p.channel),
            TaskPayload::DisinfoBanRemoval(d) | TaskPayload::DisinfoMuteRemoval(d) => {
                Some(&d.channel)
            }
        }
    }
}

fn body<T: DeserializeOwned>(kind: TaskKind, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|source| CoreError::Payload {
        kind: kind.to_string(),
        source,
    })
}
