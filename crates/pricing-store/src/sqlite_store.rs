//! SQLite-backed [`DocumentStore`].

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::SqliteConnection;
use serde_json::Value;
use tracing::warn;

use crate::db::connection::SqlitePool;
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::row::{DocumentRow, NewDocumentRow};
use crate::schema::documents::dsl;
use crate::store::{BatchOp, DocumentStore, Tx, TxBody};

/// Store backed by a pooled SQLite database.
///
/// Single-row reads/writes run as one-shot queries on a checked-out
/// connection; [`DocumentStore::transaction`] wraps its body in a Diesel
/// `immediate_transaction` and retries the whole thing on
/// `SQLITE_BUSY`/`SQLITE_LOCKED`, the same class of contention the legacy
/// catalog sync loop retried around.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wraps an already-built connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn fetch(conn: &mut SqliteConnection, collection: &str, id: &str) -> StoreResult<Option<Document>> {
    let row = dsl::documents
        .filter(dsl::collection.eq(collection))
        .filter(dsl::id.eq(id))
        .select(DocumentRow::as_select())
        .first::<DocumentRow>(conn)
        .optional()?;
    row.map(DocumentRow::into_document).transpose()
}

fn upsert(conn: &mut SqliteConnection, doc: &Document) -> StoreResult<()> {
    let row = NewDocumentRow::from_document(doc)?;
    diesel::insert_into(dsl::documents)
        .values(&row)
        .on_conflict((dsl::collection, dsl::id))
        .do_update()
        .set(&row)
        .execute(conn)?;
    Ok(())
}

fn merge_patch(conn: &mut SqliteConnection, collection: &str, id: &str, patch: Value) -> StoreResult<Document> {
    let now = Utc::now();
    let mut doc = fetch(conn, collection, id)?.unwrap_or_else(|| Document {
        collection: collection.to_string(),
        id: id.to_string(),
        body: Value::Object(Default::default()),
        created_at: now,
        updated_at: now,
    });
    if let (Value::Object(base), Value::Object(incoming)) = (&mut doc.body, patch.clone()) {
        base.extend(incoming);
    } else if let Value::Object(incoming) = patch {
        doc.body = Value::Object(incoming);
    }
    doc.updated_at = now;
    upsert(conn, &doc)?;
    Ok(doc)
}

fn remove(conn: &mut SqliteConnection, collection: &str, id: &str) -> StoreResult<()> {
    diesel::delete(
        dsl::documents
            .filter(dsl::collection.eq(collection))
            .filter(dsl::id.eq(id)),
    )
    .execute(conn)?;
    Ok(())
}

fn list(conn: &mut SqliteConnection, collection: &str) -> StoreResult<Vec<Document>> {
    let rows = dsl::documents
        .filter(dsl::collection.eq(collection))
        .select(DocumentRow::as_select())
        .load::<DocumentRow>(conn)?;
    rows.into_iter().map(DocumentRow::into_document).collect()
}

/// `Tx` implementation used inside [`DocumentStore::transaction`]; every
/// method is a direct Diesel call against the connection the enclosing
/// `immediate_transaction` closure owns.
struct SqliteTx<'a> {
    conn: &'a mut SqliteConnection,
}

impl Tx for SqliteTx<'_> {
    fn get(&mut self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        fetch(self.conn, collection, id)
    }

    fn put(&mut self, doc: Document) -> StoreResult<()> {
        upsert(self.conn, &doc)
    }

    fn patch(&mut self, collection: &str, id: &str, patch: Value) -> StoreResult<Document> {
        merge_patch(self.conn, collection, id, patch)
    }

    fn delete(&mut self, collection: &str, id: &str) -> StoreResult<()> {
        remove(self.conn, collection, id)
    }

    fn query(&mut self, collection: &str) -> StoreResult<Vec<Document>> {
        list(self.conn, collection)
    }
}

fn is_retryable(err: &diesel::result::Error) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(DatabaseErrorKind::SerializationFailure, _)
            | diesel::result::Error::DatabaseError(DatabaseErrorKind::Unknown, _)
    )
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            fetch(&mut conn, &collection, &id)
        })
        .await?
    }

    async fn put(&self, doc: Document) -> StoreResult<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            upsert(&mut conn, &doc)
        })
        .await?
    }

    async fn patch(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Document> {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            merge_patch(&mut conn, &collection, &id, patch)
        })
        .await?
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            remove(&mut conn, &collection, &id)
        })
        .await?
    }

    async fn query(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            list(&mut conn, &collection)
        })
        .await?
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> StoreResult<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            conn.immediate_transaction(|tx_conn| {
                for op in &ops {
                    match op {
                        BatchOp::Put(doc) => upsert(tx_conn, doc).map_err(store_err_to_diesel)?,
                        BatchOp::Delete { collection, id } => {
                            remove(tx_conn, collection, id).map_err(store_err_to_diesel)?
                        }
                    }
                }
                Ok::<(), diesel::result::Error>(())
            })
            .map_err(|e| diesel_to_store_err(e).unwrap_or(StoreError::Conflict { attempts: 1 }))
        })
        .await?
    }

    async fn transaction(&self, max_attempts: u32, body: TxBody) -> StoreResult<Value> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let mut attempt = 0;
            loop {
                attempt += 1;
                let outcome = conn.immediate_transaction(|tx_conn| {
                    let mut tx = SqliteTx { conn: tx_conn };
                    (body)(&mut tx).map_err(store_err_to_diesel)
                });
                match outcome {
                    Ok(value) => return Ok(value),
                    Err(diesel_err) if attempt < max_attempts && is_retryable(&diesel_err) => {
                        warn!(attempt, "retrying store transaction after conflict");
                        continue;
                    }
                    Err(diesel_err) => {
                        return match diesel_to_store_err(diesel_err) {
                            Some(err) => Err(err),
                            None => Err(StoreError::Conflict { attempts: attempt }),
                        };
                    }
                }
            }
        })
        .await?
    }
}

/// Diesel's transaction closure must return a `diesel::result::Error`, so a
/// `StoreError` raised by the transaction body is stashed as a query builder
/// error and recovered afterwards by [`diesel_to_store_err`].
fn store_err_to_diesel(err: StoreError) -> diesel::result::Error {
    diesel::result::Error::QueryBuilderError(Box::new(WrappedStoreError(err)))
}

fn diesel_to_store_err(err: diesel::result::Error) -> Option<StoreError> {
    if let diesel::result::Error::QueryBuilderError(boxed) = &err {
        if boxed.downcast_ref::<WrappedStoreError>().is_some() {
            if let diesel::result::Error::QueryBuilderError(boxed) = err {
                let wrapped = *boxed.downcast::<WrappedStoreError>().ok()?;
                return Some(wrapped.0);
            }
        }
    }
    Some(StoreError::Backend(err))
}

#[derive(Debug)]
struct WrappedStoreError(StoreError);

impl std::fmt::Display for WrappedStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for WrappedStoreError {}
