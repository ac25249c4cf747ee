//! Integration test support for the Daily Dish engine.
//!
//! Provides the doubles the end-to-end tests drive the engine with: an
//! in-memory remote store with a failure switch and a recording
//! notification sender, plus a [`TestEngine`] harness that wires a full
//! engine over them.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p daily-dish-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use daily_dish_core::Email;
use daily_dish_engine::Engine;
use daily_dish_engine::notify::{DeliveryPayload, NotificationSender, NotifyError};
use daily_dish_engine::store::local::LocalStore;
use daily_dish_engine::store::remote::{RemoteStore, RemoteStoreError};

/// In-memory remote store with a failure switch.
///
/// Flipping the switch makes every call fail the way an unreachable
/// network store would, which is exactly what the dual-store fallback
/// tests need.
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

    /// Direct peek at a stored document, bypassing the engine.
    #[must_use]
    pub fn document(&self, path: &str) -> Option<Value> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// True if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
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
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned())
    }

    async fn put(&self, path: &str, document: &Value) -> Result<(), RemoteStoreError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Self::failure());
        }
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
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

/// Notification sender that records deliveries instead of sending them.
#[derive(Default)]
pub struct RecordingSender {
    deliveries: Mutex<Vec<(Email, DeliveryPayload)>>,
}

impl RecordingSender {
    /// All deliveries so far, oldest first.
    #[must_use]
    pub fn deliveries(&self) -> Vec<(Email, DeliveryPayload)> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The code most recently delivered to `to`, if any.
    #[must_use]
    pub fn last_code_for(&self, to: &Email) -> Option<String> {
        self.deliveries()
            .iter()
            .rev()
            .find(|(address, _)| address == to)
            .map(|(_, payload)| payload.code.clone())
    }
}

impl NotificationSender for RecordingSender {
    async fn send(&self, to: &Email, payload: &DeliveryPayload) -> Result<(), NotifyError> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((to.clone(), payload.clone()));
        Ok(())
    }
}

/// A fully wired engine over test doubles.
pub struct TestEngine {
    /// The engine under test.
    pub engine: Engine<Arc<MemoryRemote>, Arc<RecordingSender>>,
    /// Handle to the remote double for failure injection and peeking.
    pub remote: Arc<MemoryRemote>,
    /// Handle to the sender double for reading delivered codes.
    pub sender: Arc<RecordingSender>,
    _local_dir: tempfile::TempDir,
}

impl TestEngine {
    /// Wire an engine over a fresh temp-dir local store.
    ///
    /// # Panics
    ///
    /// Panics if the temp dir or local store cannot be created; tests
    /// have nothing useful to do with those failures.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn new() -> Self {
        let local_dir = tempfile::tempdir().unwrap();
        let local =
            LocalStore::open(local_dir.path().join("state.json"), 1024 * 1024).unwrap();
        let remote = Arc::new(MemoryRemote::default());
        let sender = Arc::new(RecordingSender::default());

        let engine = Engine::new(
            Arc::clone(&remote),
            local,
            Arc::clone(&sender),
            Duration::from_secs(600),
        );

        Self {
            engine,
            remote,
            sender,
            _local_dir: local_dir,
        }
    }

    /// The code most recently emailed to `email`.
    ///
    /// # Panics
    ///
    /// Panics if nothing was delivered to that address.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn delivered_code(&self, email: &str) -> String {
        self.sender
            .last_code_for(&Email::parse(email).unwrap())
            .unwrap()
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
