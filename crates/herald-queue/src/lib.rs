//! `herald-queue` — durable publish/subscribe between the scheduler process and
//! the task consumer.
//!
//! | Backend        | Durability                     | Redelivery                   |
//! |----------------|--------------------------------|------------------------------|
//! | [`SqliteQueue`] | SQLite file shared by processes | after the ack deadline lapses |
//! | [`MemoryQueue`] | none                           | none                         |
//!
//! Both acknowledge a message as soon as its handler returns.

pub mod db;
pub mod error;
pub mod memory;
pub mod queue;
pub mod sqlite;

pub use error::{QueueError, Result};
pub use memory::MemoryQueue;
pub use queue::{Delivery, DeliveryQueue, MessageHandler};
pub use sqlite::{Claimed, QueueOptions, SqliteQueue};
