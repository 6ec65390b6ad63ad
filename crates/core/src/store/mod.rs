//! Document store abstraction.
//!
//! Documents are JSON objects addressed by `(collection, id)`. Writes carry [`Fields`]; a
//! merge-write sets only the listed fields while a replace-write swaps the whole document.
//! [`FieldValue::ServerTimestamp`] is resolved by the store at write time, so callers never
//! stamp documents with their own clock.

mod file;
mod memory;

pub use file::FileDocumentStore;
pub use memory::InMemoryDocumentStore;

use crate::config::{CoreConfig, StoreBackend};
pub use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A stored document.
pub type Document = serde_json::Map<String, Value>;

/// A field value in a write.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's current UTC time (RFC 3339) when the write is applied.
    ServerTimestamp,
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Value::String(value.to_owned()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(Value::String(value))
    }
}

/// The fields of one write, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Write mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetOptions {
    pub merge: bool,
}

impl SetOptions {
    pub const MERGE: SetOptions = SetOptions { merge: true };
    pub const REPLACE: SetOptions = SetOptions { merge: false };
}

/// One write inside a [`WriteBatch`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchWrite {
    pub collection: String,
    pub id: String,
    pub fields: Fields,
    pub options: SetOptions,
}

/// Writes applied as one unit by [`DocumentStore::commit`], in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<BatchWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        collection: &str,
        id: &str,
        fields: Fields,
        options: SetOptions,
    ) -> &mut Self {
        self.writes.push(BatchWrite {
            collection: collection.to_owned(),
            id: id.to_owned(),
            fields,
            options,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[BatchWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<BatchWrite> {
        self.writes
    }
}

/// Key-value document persistence, keyed by a stable identity.
///
/// Implementations are internally synchronised per write; callers get no cross-call
/// isolation (read-then-write sequences can interleave with other callers).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. `Ok(None)` means the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Write a single document.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        options: SetOptions,
    ) -> StoreResult<()>;

    /// Apply several writes as one unit.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// List document ids in a collection, sorted.
    async fn list_ids(&self, collection: &str) -> StoreResult<Vec<String>>;
}

/// Build the store selected by the configuration.
pub fn document_store_from_config(cfg: &CoreConfig) -> Arc<dyn DocumentStore> {
    match cfg.store_backend() {
        StoreBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
        StoreBackend::File => Arc::new(FileDocumentStore::new(cfg.data_dir())),
    }
}

pub(crate) fn server_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Apply a write to the current state of a document and return the new state.
pub(crate) fn apply_write(
    existing: Option<Document>,
    fields: Fields,
    options: SetOptions,
    now: &str,
) -> Document {
    let mut doc = match existing {
        Some(doc) if options.merge => doc,
        _ => Document::new(),
    };

    for (name, value) in fields {
        let value = match value {
            FieldValue::Value(v) => v,
            FieldValue::ServerTimestamp => Value::String(now.to_owned()),
        };
        doc.insert(name, value);
    }

    doc
}
