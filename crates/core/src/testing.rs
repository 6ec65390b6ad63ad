//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use femcare_types::EmailAddress;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::{StoreError, StoreResult};
use crate::models::Identity;
use crate::store::{
    Document, DocumentStore, FieldValue, Fields, InMemoryDocumentStore, SetOptions, WriteBatch,
};

pub(crate) fn identity(uid: &str, email: &str, display_name: Option<&str>) -> Identity {
    Identity {
        uid: uid.to_owned(),
        email: EmailAddress::parse(email).expect("test email must be valid"),
        display_name: display_name.map(str::to_owned),
    }
}

/// Convert a JSON object literal into write fields.
pub(crate) fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, FieldValue::Value(v)))
            .collect(),
        _ => panic!("test fields must be a JSON object"),
    }
}

/// In-memory store that counts traffic, can fail on demand and can hold reads open.
pub(crate) struct CountingStore {
    inner: InMemoryDocumentStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    hold_reads: watch::Sender<bool>,
}

impl CountingStore {
    pub(crate) fn new() -> Self {
        let (hold_reads, _) = watch::channel(false);
        Self {
            inner: InMemoryDocumentStore::new(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            hold_reads,
        }
    }

    /// Seed a document without counting it as a write.
    pub(crate) async fn seed(&self, collection: &str, id: &str, value: Value) {
        self.inner
            .set(collection, id, fields(value), SetOptions::REPLACE)
            .await
            .expect("seeding must succeed");
    }

    /// Read a document without counting it as a read.
    pub(crate) async fn peek(&self, collection: &str, id: &str) -> Option<Document> {
        self.inner
            .get(collection, id)
            .await
            .expect("peek must succeed")
    }

    /// Number of document reads started so far.
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of documents written so far (a batch counts each of its writes).
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// While held, every read blocks until [`release_reads`](Self::release_reads).
    pub(crate) fn hold_reads(&self) {
        self.hold_reads.send_replace(true);
    }

    pub(crate) fn release_reads(&self) {
        self.hold_reads.send_replace(false);
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut held = self.hold_reads.subscribe();
        let _ = held.wait_for(|held| !*held).await;

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        self.inner.get(collection, id).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        options: SetOptions,
    ) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(collection, id, fields, options).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.writes.fetch_add(batch.len(), Ordering::SeqCst);
        self.inner.commit(batch).await
    }

    async fn list_ids(&self, collection: &str) -> StoreResult<Vec<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        self.inner.list_ids(collection).await
    }
}
