//! File-backed document store.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   users/
//!     <id>.json
//!   patients/
//!     <id>.json
//! ```
//!
//! Each write goes to a hidden temporary file that is then renamed over the target, so a
//! reader never observes a half-written document. A batch stages every file before renaming
//! any of them; a crash between two renames can still leave one document without the other,
//! which the repair pass detects.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::{apply_write, server_timestamp, Document, DocumentStore, Fields, SetOptions, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::validation::validate_document_key;

const DOCUMENT_EXTENSION: &str = "json";

#[derive(Debug)]
pub struct FileDocumentStore {
    root: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{id}.{DOCUMENT_EXTENSION}"))
    }

    fn staging_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!(".{id}.{DOCUMENT_EXTENSION}.tmp"))
    }

    async fn read_document(&self, path: &Path) -> StoreResult<Option<Document>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::Deserialization {
                path: path.display().to_string(),
                source: Arc::new(e),
            })?;

        match value {
            serde_json::Value::Object(doc) => Ok(Some(doc)),
            _ => Err(StoreError::NotAnObject(path.display().to_string())),
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_document_key(collection)?;
        validate_document_key(id)?;

        let doc = self.read_document(&self.document_path(collection, id)).await?;
        tracing::debug!(collection, id, found = doc.is_some(), "read document");
        Ok(doc)
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

        let _guard = self.write_lock.lock().await;
        let now = server_timestamp();

        // Fold the batch into final document states so repeated keys see earlier writes.
        let mut staged: BTreeMap<(String, String), Document> = BTreeMap::new();
        for write in batch.into_writes() {
            let key = (write.collection, write.id);
            let existing = match staged.remove(&key) {
                Some(doc) => Some(doc),
                None => {
                    self.read_document(&self.document_path(&key.0, &key.1))
                        .await?
                }
            };
            let doc = apply_write(existing, write.fields, write.options, &now);
            staged.insert(key, doc);
        }

        for ((collection, id), doc) in &staged {
            fs::create_dir_all(self.collection_dir(collection)).await?;
            let json = serde_json::to_string_pretty(doc)
                .map_err(|e| StoreError::Serialization(Arc::new(e)))?;
            fs::write(self.staging_path(collection, id), json).await?;
        }

        for (collection, id) in staged.keys() {
            fs::rename(
                self.staging_path(collection, id),
                self.document_path(collection, id),
            )
            .await?;
            tracing::debug!(collection = %collection, id = %id, "wrote document");
        }

        Ok(())
    }

    async fn list_ids(&self, collection: &str) -> StoreResult<Vec<String>> {
        validate_document_key(collection)?;

        let mut entries = match fs::read_dir(self.collection_dir(collection)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_owned());
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldValue;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_set_writes_pretty_json_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileDocumentStore::new(temp_dir.path());

        store
            .set(
                "users",
                "u1",
                fields(&[
                    ("uid", "u1".into()),
                    ("createdAt", FieldValue::ServerTimestamp),
                ]),
                SetOptions::REPLACE,
            )
            .await
            .expect("set should succeed");

        let path = temp_dir.path().join("users").join("u1.json");
        assert!(path.is_file(), "document file should exist");

        let doc = store.get("users", "u1").await.unwrap().expect("doc exists");
        assert_eq!(doc["uid"], "u1");
        assert!(doc["createdAt"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileDocumentStore::new(temp_dir.path());
        assert!(store.get("patients", "u1").await.unwrap().is_none());
        assert!(store.list_ids("patients").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_applies_repeated_keys_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileDocumentStore::new(temp_dir.path());

        let mut batch = WriteBatch::new();
        batch
            .set(
                "users",
                "u1",
                fields(&[("email", "a@x.com".into())]),
                SetOptions::REPLACE,
            )
            .set(
                "users",
                "u1",
                fields(&[("phoneNumber", "".into())]),
                SetOptions::MERGE,
            )
            .set(
                "patients",
                "u1",
                fields(&[("appointments", FieldValue::Value(json!([])))]),
                SetOptions::REPLACE,
            );
        store.commit(batch).await.expect("commit should succeed");

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user["email"], "a@x.com");
        assert_eq!(user["phoneNumber"], "");

        let patient = store.get("patients", "u1").await.unwrap().unwrap();
        assert_eq!(patient["appointments"], json!([]));
    }

    #[tokio::test]
    async fn test_list_ids_skips_staging_and_foreign_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileDocumentStore::new(temp_dir.path());

        for id in ["b", "a"] {
            store
                .set("users", id, fields(&[("uid", id.into())]), SetOptions::REPLACE)
                .await
                .unwrap();
        }
        let dir = temp_dir.path().join("users");
        std::fs::write(dir.join(".c.json.tmp"), "{}").unwrap();
        std::fs::write(dir.join("notes.txt"), "hello").unwrap();

        assert_eq!(store.list_ids("users").await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileDocumentStore::new(temp_dir.path());

        let dir = temp_dir.path().join("users");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("u1.json"), "{not json").unwrap();
        std::fs::write(dir.join("u2.json"), "[1, 2]").unwrap();

        assert!(matches!(
            store.get("users", "u1").await,
            Err(StoreError::Deserialization { .. })
        ));
        assert!(matches!(
            store.get("users", "u2").await,
            Err(StoreError::NotAnObject(_))
        ));
    }
}
