//! Dual-store adapter: remote-first with transparent local fallback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;

use super::local::LocalStore;
use super::remote::{RemoteStore, RemoteStoreError};
use super::StoreError;

/// One logical document interface over the remote and local stores.
///
/// Reads and writes try the remote store first. Any remote failure flips
/// the adapter into degraded mode: the call transparently completes
/// against the local store and every later call prefers local until
/// [`DualStore::resync`] succeeds. Remote failures are therefore never
/// surfaced to callers; only local-store failures (quota, I/O) are.
///
/// Writes are read-modify-write on the whole document and are serialized
/// through a single in-process queue, so two engine callers can never
/// interleave their cycles. Races against *other* processes remain
/// last-writer-wins on the whole document; collection mutations are
/// designed to be idempotent so a lost-and-retried write converges.
pub struct DualStore<R> {
    remote: R,
    local: Arc<LocalStore>,
    degraded: AtomicBool,
    write_gate: Mutex<()>,
}

impl<R: RemoteStore> DualStore<R> {
    /// Build an adapter over the two stores.
    #[must_use]
    pub fn new(remote: R, local: Arc<LocalStore>) -> Self {
        Self {
            remote,
            local,
            degraded: AtomicBool::new(false),
            write_gate: Mutex::new(()),
        }
    }

    /// True once a remote failure has switched this session to the local
    /// store.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Probe the remote store and, if reachable, leave degraded mode.
    ///
    /// Returns whether the adapter is now talking to the remote store.
    /// There is no background resync; callers decide when to retry.
    pub async fn resync(&self) -> bool {
        match self.remote.ping().await {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    tracing::info!("remote store reachable again; leaving degraded mode");
                }
                true
            }
            Err(error) => {
                tracing::debug!(%error, "resync probe failed; staying on local store");
                false
            }
        }
    }

    /// Read a document, `None` if absent in the selected store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only for local-store failures.
    pub async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if !self.is_degraded() {
            match self.remote.get(path).await {
                Ok(document) => {
                    if let Some(doc) = &document {
                        self.mirror(path, doc);
                    }
                    return Ok(document);
                }
                Err(error) => self.mark_degraded(path, &error),
            }
        }

        Ok(self.local.get(path))
    }

    /// Read-modify-write a document and return the mutator's outcome.
    ///
    /// The mutator receives the current document (or `None`) and returns
    /// the replacement document plus an outcome value, computed inside
    /// the same cycle so callers never need a second read.
    ///
    /// # Errors
    ///
    /// Returns the mutator's error, or [`StoreError`] for local-store
    /// failures.
    pub async fn write_with<T, F>(&self, path: &str, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<Value>) -> Result<(Value, T), StoreError>,
    {
        let _guard = self.write_gate.lock().await;

        if self.is_degraded() {
            return self.write_local(path, mutate);
        }

        let current = match self.remote.get(path).await {
            Ok(current) => current,
            Err(error) => {
                self.mark_degraded(path, &error);
                return self.write_local(path, mutate);
            }
        };

        let (next, outcome) = mutate(current)?;

        match self.remote.put(path, &next).await {
            Ok(()) => {
                self.mirror(path, &next);
                Ok(outcome)
            }
            Err(error) => {
                self.mark_degraded(path, &error);
                self.local.put(path, next)?;
                Ok(outcome)
            }
        }
    }

    /// Read-modify-write without an outcome value.
    ///
    /// # Errors
    ///
    /// Same as [`DualStore::write_with`].
    pub async fn write<F>(&self, path: &str, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(Option<Value>) -> Result<Value, StoreError>,
    {
        self.write_with(path, |current| mutate(current).map(|next| (next, ())))
            .await
    }

    /// True if a document exists in *either* store.
    ///
    /// Used for existence checks (is this email registered?) that must
    /// not report a false negative while one store is unavailable or
    /// behind.
    pub async fn exists_either(&self, path: &str) -> bool {
        if self.local.contains(path) {
            return true;
        }

        if !self.is_degraded() {
            match self.remote.get(path).await {
                Ok(document) => return document.is_some(),
                Err(error) => self.mark_degraded(path, &error),
            }
        }

        false
    }

    fn write_local<T, F>(&self, path: &str, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<Value>) -> Result<(Value, T), StoreError>,
    {
        let (next, outcome) = mutate(self.local.get(path))?;
        self.local.put(path, next)?;
        Ok(outcome)
    }

    /// Best-effort copy of a remote document into the local store, so
    /// fallback reads stay warm. Failures are logged, never surfaced.
    fn mirror(&self, path: &str, document: &Value) {
        if let Err(error) = self.local.put(path, document.clone()) {
            tracing::debug!(path, %error, "skipping local mirror of remote document");
        }
    }

    fn mark_degraded(&self, path: &str, error: &RemoteStoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(path, %error, "remote store failed; session degraded to local store");
        }
    }
}
