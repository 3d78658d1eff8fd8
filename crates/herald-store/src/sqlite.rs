use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    db::init_db,
    error::{Result, StoreError},
    path::split_document,
    query::{Direction, Query},
    store::{Document, DocumentStore},
};

/// [`DocumentStore`] backed by a single SQLite table.
///
/// Filters and ordering run inside SQLite through `json_extract`, so the
/// polling query stays a single indexed scan of one collection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap a connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, path: &str, doc: &Value) -> Result<()> {
        let (collection, _) = split_document(path)?;
        let body = serde_json::to_string(doc)?;
        let now = Utc::now().to_rfc3339();
        let res = self.conn().execute(
            "INSERT INTO documents (path, collection, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![path, collection, body, now],
        );
        match res {
            Ok(_) => {
                debug!(%path, "document created");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::AlreadyExists {
                    path: path.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        split_document(path)?;
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM documents WHERE path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<()> {
        split_document(path)?;
        let conn = self.conn();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        };

        let mut doc: Value = serde_json::from_str(&body)?;
        match doc {
            Value::Object(ref mut map) => {
                for (k, v) in fields {
                    map.insert(k.clone(), v.clone());
                }
            }
            _ => return Err(StoreError::InvalidPath(format!("{path} is not an object"))),
        }

        conn.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2 WHERE path = ?3",
            rusqlite::params![serde_json::to_string(&doc)?, Utc::now().to_rfc3339(), path],
        )?;
        debug!(%path, fields = fields.len(), "document updated");
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        split_document(path)?;
        let n = self
            .conn()
            .execute("DELETE FROM documents WHERE path = ?1", [path])?;
        debug!(%path, removed = n, "document removed");
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        query.validate()?;

        let mut sql = String::from("SELECT path, body FROM documents WHERE collection = ?1");
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(query.collection.clone())];

        for f in &query.filters {
            let value = to_sql(&f.field, &f.value)?;
            params.push(value);
            // field names are validated identifiers, safe to splice into the JSON path
            sql.push_str(&format!(
                " AND json_extract(body, '$.{}') {} ?{}",
                f.field,
                f.op.sql(),
                params.len()
            ));
        }

        if let Some(ref order) = query.order_by {
            let dir = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY json_extract(body, '$.{}') {dir}, path",
                order.field
            ));
        } else {
            sql.push_str(" ORDER BY path");
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows: Vec<(String, String)> = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        rows.into_iter()
            .map(|(path, body)| {
                Ok(Document {
                    path,
                    data: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }
}

/// Convert a JSON filter value into the SQLite value `json_extract` yields.
fn to_sql(field: &str, value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => {
            return Err(StoreError::InvalidField(format!(
                "{field}: filter value must be a scalar"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Op;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("in-memory store")
    }

    #[tokio::test]
    async fn create_get_update_remove() {
        let s = store();
        s.create("users/alice/tasks/t1", &json!({"status": "pending", "n": 1}))
            .await
            .unwrap();

        let doc = s.get("users/alice/tasks/t1").await.unwrap().unwrap();
        assert_eq!(doc["status"], "pending");

        let mut fields = Map::new();
        fields.insert("status".into(), json!("complete"));
        s.update("users/alice/tasks/t1", &fields).await.unwrap();
        let doc = s.get("users/alice/tasks/t1").await.unwrap().unwrap();
        assert_eq!(doc, json!({"status": "complete", "n": 1}));

        s.remove("users/alice/tasks/t1").await.unwrap();
        assert!(s.get("users/alice/tasks/t1").await.unwrap().is_none());
        // second remove is a no-op
        s.remove("users/alice/tasks/t1").await.unwrap();
    }

    #[tokio::test]
    async fn create_twice_is_rejected() {
        let s = store();
        s.create("tasks/a", &json!({})).await.unwrap();
        let err = s.create("tasks/a", &json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let s = store();
        let err = s.update("tasks/nope", &Map::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let s = store();
        for (id, due) in [("c", "2026-01-03"), ("a", "2026-01-01"), ("b", "2026-01-02")] {
            s.create(&format!("due_tasks/{id}"), &json!({"id": id, "due_at": due}))
                .await
                .unwrap();
        }
        // different collection, must not leak in
        s.create("tasks/z", &json!({"due_at": "2000-01-01"}))
            .await
            .unwrap();

        let q = Query::new("due_tasks")
            .filter("due_at", Op::Le, "2026-01-02")
            .order_by("due_at", Direction::Asc);
        let ids: Vec<_> = s
            .query(&q)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.data["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["a", "b"]);

        let q = Query::new("due_tasks")
            .order_by("due_at", Direction::Desc)
            .limit(1);
        let docs = s.query(&q).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "due_tasks/c");
    }

    #[tokio::test]
    async fn query_only_sees_direct_children() {
        let s = store();
        s.create("channels/#a/tasks/1", &json!({"type": "ban-removal"}))
            .await
            .unwrap();
        s.create("channels/#b/tasks/2", &json!({"type": "ban-removal"}))
            .await
            .unwrap();
        let docs = s
            .query(&Query::new("channels/#a/tasks").filter("type", Op::Eq, "ban-removal"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "channels/#a/tasks/1");
    }

    #[tokio::test]
    async fn bad_field_is_rejected_before_sql() {
        let s = store();
        let q = Query::new("tasks").filter("x') = 1 OR ('1", Op::Eq, 1);
        assert!(matches!(
            s.query(&q).await.unwrap_err(),
            StoreError::InvalidField(_)
        ));
    }
}
