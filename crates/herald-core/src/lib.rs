//! `herald-core` — task records, typed payloads and shared configuration.
//!
//! A [`TaskRecord`] travels as a JSON envelope
//! `{id, type, created_at, due_at, status, runs?, repeat?, owner, data}` both
//! into the document store and onto the delivery queue. `data` is decoded only
//! after `type` has been resolved to a [`TaskKind`].

pub mod config;
pub mod error;
pub mod payload;
pub mod task;
pub mod timefmt;

pub use error::{CoreError, Result};
pub use payload::{
    DisinfoPenalty, ModeRemoval, PersistentChannel, Reconnect, Reminder, TaskPayload,
    VoiceRequests,
};
pub use task::{Owner, Repeat, TaskKind, TaskRecord, TaskStatus};
