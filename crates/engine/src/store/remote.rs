//! Remote durable document store.
//!
//! The remote store is authoritative when reachable. The engine speaks to
//! it through the [`RemoteStore`] trait so tests can substitute in-memory
//! doubles; production uses [`HttpRemoteStore`], a thin JSON document
//! client.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::ExposeSecret;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::RemoteStoreConfig;

/// Read-cache entry lifetime. Short, because the cache only exists to
/// absorb render-driven re-reads between mutations.
const CACHE_TTL: Duration = Duration::from_secs(30);

/// Maximum cached documents.
const CACHE_CAPACITY: u64 = 1024;

/// Errors from the remote store.
///
/// The dual-store adapter treats every variant the same way: degrade the
/// session to the local store. Variants exist for logging, not branching.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// Network-level failure: timeout, DNS, connection refused, or a
    /// response body that failed to decode.
    #[error("remote store unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("remote store rejected request: HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The document path produced an invalid URL.
    #[error("invalid document path: {path}")]
    InvalidPath {
        /// Offending path.
        path: String,
    },
}

/// A network document store holding JSON documents at slash-separated
/// paths.
#[allow(async_fn_in_trait)] // static dispatch only; the engine never boxes stores
pub trait RemoteStore: Send + Sync {
    /// Fetch a document, `None` if absent.
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteStoreError>;

    /// Write a document, replacing any existing one.
    async fn put(&self, path: &str, document: &Value) -> Result<(), RemoteStoreError>;

    /// Cheap reachability probe, used by resync.
    async fn ping(&self) -> Result<(), RemoteStoreError>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for &T {
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteStoreError> {
        (**self).get(path).await
    }

    async fn put(&self, path: &str, document: &Value) -> Result<(), RemoteStoreError> {
        (**self).put(path, document).await
    }

    async fn ping(&self) -> Result<(), RemoteStoreError> {
        (**self).ping().await
    }
}

impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteStoreError> {
        (**self).get(path).await
    }

    async fn put(&self, path: &str, document: &Value) -> Result<(), RemoteStoreError> {
        (**self).put(path, document).await
    }

    async fn ping(&self) -> Result<(), RemoteStoreError> {
        (**self).ping().await
    }
}

/// Production remote store client.
///
/// GET/PUT of JSON documents against `{base_url}/{path}` with bearer
/// auth. Reads go through a short-TTL cache that is written through on
/// every put, so read-modify-write cycles in this process always observe
/// their own latest write; racing *external* writers remain last-writer-
/// wins on the whole document.
#[derive(Clone)]
pub struct HttpRemoteStore {
    inner: Arc<HttpRemoteStoreInner>,
}

struct HttpRemoteStoreInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    cache: Cache<String, Value>,
}

impl HttpRemoteStore {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &RemoteStoreConfig) -> Self {
        Self {
            inner: Arc::new(HttpRemoteStoreInner {
                client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                    .unwrap_or_default(),
                base_url: config.base_url.clone(),
                api_key: config.api_key.expose_secret().to_string(),
                cache: Cache::builder()
                    .max_capacity(CACHE_CAPACITY)
                    .time_to_live(CACHE_TTL)
                    .build(),
            }),
        }
    }

    fn document_url(&self, path: &str) -> Result<Url, RemoteStoreError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|_| RemoteStoreError::InvalidPath {
                path: path.to_string(),
            })
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteStoreError> {
        if let Some(cached) = self.inner.cache.get(path).await {
            return Ok(Some(cached));
        }

        let url = self.document_url(path)?;
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(&self.inner.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteStoreError::Status {
                status: response.status().as_u16(),
            });
        }

        let document: Value = response.json().await?;
        self.inner
            .cache
            .insert(path.to_string(), document.clone())
            .await;
        Ok(Some(document))
    }

    async fn put(&self, path: &str, document: &Value) -> Result<(), RemoteStoreError> {
        let url = self.document_url(path)?;
        let response = self
            .inner
            .client
            .put(url)
            .bearer_auth(&self.inner.api_key)
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteStoreError::Status {
                status: response.status().as_u16(),
            });
        }

        self.inner
            .cache
            .insert(path.to_string(), document.clone())
            .await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteStoreError> {
        self.inner
            .client
            .head(self.inner.base_url.clone())
            .bearer_auth(&self.inner.api_key)
            .send()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::Value;

    use super::{RemoteStore, RemoteStoreError};

    /// In-memory remote store double with a failure switch.
    #[derive(Default)]
    pub struct MemoryRemote {
        documents: Mutex<HashMap<String, Value>>,
        fail: AtomicBool,
    }

    impl MemoryRemote {
        /// Make every subsequent call fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::Relaxed);
        }

        fn failure() -> RemoteStoreError {
            RemoteStoreError::Status { status: 503 }
        }
    }

    impl RemoteStore for MemoryRemote {
        async fn get(&self, path: &str) -> Result<Option<Value>, RemoteStoreError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(Self::failure());
            }
            Ok(self
                .documents
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .get(path)
                .cloned())
        }

        async fn put(&self, path: &str, document: &Value) -> Result<(), RemoteStoreError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(Self::failure());
            }
            self.documents
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(path.to_string(), document.clone());
            Ok(())
        }

        async fn ping(&self) -> Result<(), RemoteStoreError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(Self::failure());
            }
            Ok(())
        }
    }
}
