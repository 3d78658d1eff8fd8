//! Hierarchical paths: `collection/doc[/collection/doc...]`.
//!
//! A document path has an even number of segments, a collection path an odd
//! number. `channels/#test/tasks/abc` is document `abc` in collection
//! `channels/#test/tasks`.

use crate::error::{Result, StoreError};

fn segments(path: &str) -> Result<Vec<&str>> {
    let segs: Vec<&str> = path.split('/').collect();
    if segs.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segs)
}

/// Split a document path into `(collection, id)`.
pub fn split_document(path: &str) -> Result<(&str, &str)> {
    let segs = segments(path)?;
    if segs.len() % 2 != 0 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    path.rsplit_once('/')
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))
}

pub fn validate_collection(path: &str) -> Result<()> {
    let segs = segments(path)?;
    if segs.len() % 2 != 1 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}
