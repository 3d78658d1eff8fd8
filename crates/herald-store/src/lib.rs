//! `herald-store` — generic create/get/update/remove/query over a hierarchical
//! collection-of-documents database.
//!
//! [`SqliteStore`] is the durable backend; [`MemoryStore`] keeps everything in
//! process and is used by tests and single-shot tools.

pub mod db;
pub mod error;
pub mod memory;
pub mod path;
pub mod query;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, Op, OrderBy, Query};
pub use sqlite::SqliteStore;
pub use store::{Document, DocumentStore};
