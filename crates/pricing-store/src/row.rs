//! Diesel row types mapping the `documents` table to [`crate::document::Document`].
//!
//! `body` is stored as a serialized JSON string rather than relying on a
//! native JSON column type, since SQLite has none; `json_extract` in the
//! migration's indexes operates on that text directly.

use chrono::{DateTime, TimeZone, Utc};
use diesel::prelude::*;

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::schema::documents;

/// Row as read back from the `documents` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DocumentRow {
    /// Collection name the document belongs to.
    pub collection: String,
    /// Document id, unique within its collection.
    pub id: String,
    /// Serialized JSON body.
    pub body: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 last-update timestamp.
    pub updated_at: String,
}

/// Row to insert or upsert into the `documents` table.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = documents)]
pub struct NewDocumentRow {
    /// Collection name the document belongs to.
    pub collection: String,
    /// Document id, unique within its collection.
    pub id: String,
    /// Serialized JSON body.
    pub body: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 last-update timestamp.
    pub updated_at: String,
}

impl DocumentRow {
    /// Converts this row into a [`Document`], parsing its body and timestamps.
    pub fn into_document(self) -> StoreResult<Document> {
        let body = serde_json::from_str(&self.body).map_err(|source| StoreError::Malformed {
            collection: self.collection.clone(),
            id: self.id.clone(),
            source,
        })?;
        Ok(Document {
            created_at: parse_timestamp(&self.collection, &self.id, &self.created_at)?,
            updated_at: parse_timestamp(&self.collection, &self.id, &self.updated_at)?,
            collection: self.collection,
            id: self.id,
            body,
        })
    }
}

fn parse_timestamp(collection: &str, id: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| Utc.datetime_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|source| StoreError::Malformed {
            collection: collection.to_string(),
            id: id.to_string(),
            source: serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                source,
            )),
        })
}

impl NewDocumentRow {
    /// Builds an insertable row from a [`Document`], serializing its body.
    pub fn from_document(doc: &Document) -> StoreResult<Self> {
        let body = serde_json::to_string(&doc.body).map_err(|source| StoreError::Malformed {
            collection: doc.collection.clone(),
            id: doc.id.clone(),
            source,
        })?;
        Ok(Self {
            collection: doc.collection.clone(),
            id: doc.id.clone(),
            body,
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
        })
    }
}
