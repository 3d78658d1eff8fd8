use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    error::{Result, StoreError},
    path::split_document,
    query::{compare, lookup, Direction, Query},
    store::{Document, DocumentStore},
};

/// In-process [`DocumentStore`]; nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs().is_empty()
    }

    fn docs(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, path: &str, doc: &Value) -> Result<()> {
        split_document(path)?;
        let mut docs = self.docs();
        if docs.contains_key(path) {
            return Err(StoreError::AlreadyExists {
                path: path.to_string(),
            });
        }
        docs.insert(path.to_string(), doc.clone());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        split_document(path)?;
        Ok(self.docs().get(path).cloned())
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<()> {
        split_document(path)?;
        let mut docs = self.docs();
        match docs.get_mut(path) {
            Some(Value::Object(map)) => {
                for (k, v) in fields {
                    map.insert(k.clone(), v.clone());
                }
                Ok(())
            }
            Some(_) => Err(StoreError::InvalidPath(format!("{path} is not an object"))),
            None => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn remove(&self, path: &str) -> Result<()> {
        split_document(path)?;
        self.docs().remove(path);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        query.validate()?;
        let docs = self.docs();
        let mut hits: Vec<Document> = docs
            .iter()
            .filter(|(path, _)| {
                split_document(path).is_ok_and(|(collection, _)| collection == query.collection)
            })
            .filter(|(_, data)| query.filters.iter().all(|f| f.matches(data)))
            .map(|(path, data)| Document {
                path: path.clone(),
                data: data.clone(),
            })
            .collect();

        if let Some(ref order) = query.order_by {
            // Missing fields sort first, like SQL NULLs.
            hits.sort_by(|a, b| {
                let ord = match (lookup(&a.data, &order.field), lookup(&b.data, &order.field)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Op;
    use serde_json::json;

    #[tokio::test]
    async fn matches_sqlite_semantics_for_due_query() {
        let s = MemoryStore::new();
        for (id, due) in [("late", "2026-01-03"), ("early", "2026-01-01"), ("mid", "2026-01-02")] {
            s.create(&format!("due_tasks/{id}"), &json!({"due_at": due}))
                .await
                .unwrap();
        }
        s.create("due_tasks/x/nested/y", &json!({"due_at": "2000-01-01"}))
            .await
            .unwrap();

        let q = Query::new("due_tasks")
            .filter("due_at", Op::Le, "2026-01-02")
            .order_by("due_at", Direction::Asc)
            .limit(10);
        let paths: Vec<_> = s.query(&q).await.unwrap().into_iter().map(|d| d.path).collect();
        assert_eq!(paths, ["due_tasks/early", "due_tasks/mid"]);
    }

    #[tokio::test]
    async fn update_and_remove() {
        let s = MemoryStore::new();
        s.create("tasks/a", &json!({"status": "pending"})).await.unwrap();
        let mut f = Map::new();
        f.insert("status".into(), json!("cancelled"));
        s.update("tasks/a", &f).await.unwrap();
        assert_eq!(s.get("tasks/a").await.unwrap().unwrap()["status"], "cancelled");
        s.remove("tasks/a").await.unwrap();
        assert!(s.is_empty());
        assert!(matches!(
            s.update("tasks/a", &f).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }
}
