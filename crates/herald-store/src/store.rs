use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::query::Query;

/// A document returned by [`DocumentStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: String,
    pub data: Value,
}

/// Hierarchical collection-of-documents database.
///
/// Paths alternate collection and document ids (`users/alice/tasks/abc`).
/// Queries only ever look at the direct children of one collection, so a
/// collection that must be searched globally has to be kept flat.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write a new document. Fails with `AlreadyExists` if the path is taken.
    async fn create(&self, path: &str, doc: &Value) -> Result<()>;

    /// Fetch a document, `None` if absent.
    async fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Overwrite the given top-level fields of an existing document.
    /// Fails with `NotFound` if there is nothing at `path`.
    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<()>;

    /// Delete a document. Removing a missing path is not an error.
    async fn remove(&self, path: &str) -> Result<()>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>>;
}
