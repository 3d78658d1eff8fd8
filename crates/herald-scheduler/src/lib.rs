//! `herald-scheduler` — producer API and polling loop for deferred tasks.
//!
//! # Overview
//!
//! Producers call [`TaskManager::add_task`], which writes the authoritative
//! record under its owner and a flat entry in the due-task index. The
//! [`SchedulerEngine`] polls that index, publishes every due task to the
//! delivery queue and only then retires it:
//!
//! | Record                 | After a successful publish              |
//! |------------------------|-----------------------------------------|
//! | recurring, runs left   | `due_at` advanced, re-indexed           |
//! | global, exhausted      | deleted                                 |
//! | channel/user, exhausted| kept with status `complete`             |
//!
//! A failed publish leaves the index entry in place, so the task is retried
//! on the next tick.

pub mod engine;
pub mod error;
pub mod manager;
pub mod schedule;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use manager::TaskManager;
pub use types::{DueTask, IndexEntry, Retirement, TickReport};
