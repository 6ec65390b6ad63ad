//! In-memory document store

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{apply_write, server_timestamp, Document, DocumentStore, Fields, SetOptions, WriteBatch};
use crate::error::StoreResult;
use crate::validation::validate_document_key;

type Collection = BTreeMap<String, Document>;

/// In-memory document store. Batches are applied under a single write lock.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_document_key(collection)?;
        validate_document_key(id)?;

        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        options: SetOptions,
    ) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.set(collection, id, fields, options);
        self.commit(batch).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        for write in batch.writes() {
            validate_document_key(&write.collection)?;
            validate_document_key(&write.id)?;
        }

        let now = server_timestamp();
        let mut collections = self.collections.write().await;
        for write in batch.into_writes() {
            let docs = collections.entry(write.collection).or_default();
            let existing = docs.remove(&write.id);
            let doc = apply_write(existing, write.fields, write.options, &now);
            docs.insert(write.id, doc);
        }

        Ok(())
    }

    async fn list_ids(&self, collection: &str) -> StoreResult<Vec<String>> {
        validate_document_key(collection)?;

        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::FieldValue;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn test_get_missing_document_is_none() {
        let store = InMemoryDocumentStore::new();
        let doc = store.get("users", "nobody").await.expect("get should succeed");
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_set_then_merge() {
        let store = InMemoryDocumentStore::new();
        store
            .set("users", "u1", fields(&[("email", "a@x.com")]), SetOptions::REPLACE)
            .await
            .expect("set should succeed");
        store
            .set("users", "u1", fields(&[("phoneNumber", "")]), SetOptions::MERGE)
            .await
            .expect("merge should succeed");

        let doc = store.get("users", "u1").await.unwrap().expect("doc exists");
        assert_eq!(doc["email"], "a@x.com");
        assert_eq!(doc["phoneNumber"], "");
    }

    #[tokio::test]
    async fn test_empty_batch_commits_nothing() {
        let store = InMemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        store.commit(batch).await.expect("empty commit succeeds");
        assert!(store.list_ids("users").await.unwrap().is_empty());

        batch = WriteBatch::new();
        batch.set("users", "u1", fields(&[("email", "a@x.com")]), SetOptions::REPLACE);
        assert_eq!(batch.len(), 1);
        store.commit(batch).await.expect("commit succeeds");
        assert_eq!(store.list_ids("users").await.unwrap(), vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn test_commit_rejects_whole_batch_on_invalid_key() {
        let store = InMemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        batch
            .set("users", "u1", fields(&[("email", "a@x.com")]), SetOptions::REPLACE)
            .set("patients", "../u1", fields(&[("email", "a@x.com")]), SetOptions::REPLACE);

        let err = store.commit(batch).await.expect_err("commit should fail");
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert_eq!(store.len("users").await, 0, "no write should be applied");
    }

    #[tokio::test]
    async fn test_list_ids_sorted() {
        let store = InMemoryDocumentStore::new();
        for id in ["b", "a", "c"] {
            store
                .set("users", id, fields(&[("uid", id)]), SetOptions::REPLACE)
                .await
                .unwrap();
        }
        assert_eq!(store.list_ids("users").await.unwrap(), vec!["a", "b", "c"]);
        assert!(store.list_ids("patients").await.unwrap().is_empty());
    }
}
