//! The document envelope every collection stores its rows as.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A single row in the document store: a JSON `body` addressed by
/// `collection`/`id`, with store-managed timestamps.
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct Document {
    /// Logical table this row belongs to, e.g. `"branches"` or `"quote_cache"`.
    pub collection: String,
    /// Primary key within `collection`.
    pub id: String,
    /// Arbitrary JSON payload.
    pub body: Value,
    /// When this row was first written.
    pub created_at: DateTime<Utc>,
    /// When this row was last overwritten.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Deserializes `body` into `T`, wrapping failures in [`StoreError::Malformed`].
    pub fn into_typed<T: DeserializeOwned>(self) -> StoreResult<T> {
        serde_json::from_value(self.body).map_err(|source| StoreError::Malformed {
            collection: self.collection,
            id: self.id,
            source,
        })
    }
}

/// Helper for building the `body` of a new or updated document from any
/// serializable value.
pub fn to_body<T: Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|source| StoreError::Malformed {
        collection: String::new(),
        id: String::new(),
        source,
    })
}
