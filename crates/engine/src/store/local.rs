//! Local fallback store.
//!
//! Synchronous, device-scoped document storage: an in-memory map persisted
//! to a single JSON file with atomic replace (write temp file, rename).
//! It always succeeds, bounded only by the configured byte quota; quota
//! exhaustion is fatal and blocks all further writes for the session.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use super::{QuotaError, StoreError};

/// Synchronous local document store.
pub struct LocalStore {
    file_path: PathBuf,
    quota_bytes: usize,
    documents: Mutex<BTreeMap<String, Value>>,
    quota_exhausted: AtomicBool,
}

impl LocalStore {
    /// Open a store file, creating an empty store if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read,
    /// and [`StoreError::Corrupt`] if its contents are not a JSON object.
    pub fn open(file_path: impl AsRef<Path>, quota_bytes: usize) -> Result<Self, StoreError> {
        let file_path = file_path.as_ref().to_path_buf();

        let documents = if file_path.exists() {
            let raw = fs::read_to_string(&file_path)?;
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: file_path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            file_path,
            quota_bytes,
            documents: Mutex::new(documents),
            quota_exhausted: AtomicBool::new(false),
        })
    }

    /// Read a document.
    #[must_use]
    pub fn get(&self, doc_path: &str) -> Option<Value> {
        self.lock().get(doc_path).cloned()
    }

    /// True if a document exists at the path.
    #[must_use]
    pub fn contains(&self, doc_path: &str) -> bool {
        self.lock().contains_key(doc_path)
    }

    /// Write a document, replacing any existing one at the path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Quota`] if the store is over quota (or was
    /// previously driven over quota this session) and [`StoreError::Io`]
    /// if persisting fails.
    pub fn put(&self, doc_path: &str, document: Value) -> Result<(), StoreError> {
        if self.quota_exhausted.load(Ordering::Relaxed) {
            return Err(QuotaError {
                quota_bytes: self.quota_bytes,
                needed_bytes: self.quota_bytes,
            }
            .into());
        }

        let mut documents = self.lock();
        let previous = documents.insert(doc_path.to_string(), document);

        let serialized = serde_json::to_string(&*documents).map_err(|e| StoreError::Corrupt {
            path: doc_path.to_string(),
            message: e.to_string(),
        })?;

        if serialized.len() > self.quota_bytes {
            // Roll the map back so reads keep seeing the last good state.
            match previous {
                Some(prev) => documents.insert(doc_path.to_string(), prev),
                None => documents.remove(doc_path),
            };
            self.quota_exhausted.store(true, Ordering::Relaxed);
            tracing::error!(
                path = doc_path,
                needed = serialized.len(),
                quota = self.quota_bytes,
                "local store quota exceeded; further writes disabled"
            );
            return Err(QuotaError {
                quota_bytes: self.quota_bytes,
                needed_bytes: serialized.len(),
            }
            .into());
        }

        self.persist(&serialized)
    }

    /// Delete a document, returning it if it existed.
    ///
    /// Removals stay allowed after quota exhaustion; they only shrink the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if persisting fails.
    pub fn remove(&self, doc_path: &str) -> Result<Option<Value>, StoreError> {
        let mut documents = self.lock();
        let removed = documents.remove(doc_path);

        if removed.is_some() {
            let serialized =
                serde_json::to_string(&*documents).map_err(|e| StoreError::Corrupt {
                    path: doc_path.to_string(),
                    message: e.to_string(),
                })?;
            self.persist(&serialized)?;
        }

        Ok(removed)
    }

    /// List document paths under a namespace prefix.
    #[must_use]
    pub fn keys_under(&self, namespace: &str) -> Vec<String> {
        let prefix = format!("{namespace}/");
        self.lock()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn persist(&self, serialized: &str) -> Result<(), StoreError> {
        let tmp_path = self.file_path.with_extension("tmp");
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.file_path)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const QUOTA: usize = 64 * 1024;

    fn temp_store(quota: usize) -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("state.json"), quota).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_dir, store) = temp_store(QUOTA);
        store.put("accounts/a", json!({"username": "ana"})).unwrap();
        assert_eq!(store.get("accounts/a"), Some(json!({"username": "ana"})));
        assert!(store.contains("accounts/a"));
        assert!(!store.contains("accounts/b"));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("state.json");
        {
            let store = LocalStore::open(&file, QUOTA).unwrap();
            store.put("accounts/a", json!({"username": "ana"})).unwrap();
        }
        let store = LocalStore::open(&file, QUOTA).unwrap();
        assert_eq!(store.get("accounts/a"), Some(json!({"username": "ana"})));
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = temp_store(QUOTA);
        store.put("challenges/registration/a@b.com", json!({})).unwrap();
        assert!(store.remove("challenges/registration/a@b.com").unwrap().is_some());
        assert!(store.remove("challenges/registration/a@b.com").unwrap().is_none());
    }

    #[test]
    fn test_keys_under_namespace() {
        let (_dir, store) = temp_store(QUOTA);
        store.put("challenges/registration/a@b.com", json!({})).unwrap();
        store.put("challenges/password_reset/a@b.com", json!({})).unwrap();
        store.put("accounts/x", json!({})).unwrap();

        let keys = store.keys_under("challenges");
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("challenges/")));
    }

    #[test]
    fn test_quota_is_fatal_and_rolls_back() {
        let (_dir, store) = temp_store(128);
        store.put("a", json!("small")).unwrap();

        let big = "x".repeat(256);
        let err = store.put("b", json!(big)).unwrap_err();
        assert!(matches!(err, StoreError::Quota(_)));

        // Rolled back: the oversized write left no trace.
        assert!(!store.contains("b"));
        assert_eq!(store.get("a"), Some(json!("small")));

        // Fatal: even a tiny write is now refused.
        let err = store.put("c", json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::Quota(_)));

        // Removal still shrinks the store.
        assert!(store.remove("a").unwrap().is_some());
    }
}
