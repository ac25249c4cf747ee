//! Dual-store persistence layer.
//!
//! One logical document interface over two physical stores: a remote
//! durable document store (network-accessible, possibly unavailable) and a
//! local fallback store (always available, device-scoped, synchronous).
//! Documents are JSON values addressed by slash-separated paths.
//!
//! ## Namespaces
//!
//! - `accounts/{account_id}` - profile + favorites + shopping list
//! - `credentials/{account_id}` - credential record
//! - `account_index/{email}` - email existence index
//! - `reviews/{dish_id}` - per-dish review log
//! - `challenges/{purpose}/{email}` - one-time passcodes (local store only)

pub mod dual;
pub mod local;
pub mod remote;

pub use dual::DualStore;
pub use local::LocalStore;
pub use remote::{HttpRemoteStore, RemoteStore, RemoteStoreError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// The local store ran out of room.
///
/// Quota exhaustion is fatal for the session: once hit, no further local
/// writes are attempted.
#[derive(Debug, Error, Clone, Copy)]
#[error("local store quota of {quota_bytes} bytes exceeded (needed {needed_bytes})")]
pub struct QuotaError {
    /// Configured quota.
    pub quota_bytes: usize,
    /// Bytes the rejected write would have required.
    pub needed_bytes: usize,
}

/// Errors surfaced by the store layer.
///
/// Remote failures never appear here: the dual-store adapter recovers them
/// by falling back to the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Local store is full; fatal for this session.
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Local store file could not be read or written.
    #[error("local store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document no longer matches its expected shape.
    #[error("document at {path} is corrupt: {message}")]
    Corrupt {
        /// Document path.
        path: String,
        /// Decode failure detail.
        message: String,
    },
}

/// Decode a stored document into its typed shape.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] if the document does not deserialize.
pub fn decode<T: DeserializeOwned>(path: &str, document: Value) -> Result<T, StoreError> {
    serde_json::from_value(document).map_err(|e| StoreError::Corrupt {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Encode a typed document for storage.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] if the value does not serialize (only
/// possible for shapes with non-string map keys, which the engine never
/// persists).
pub fn encode<T: Serialize>(path: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Document path constructors.
///
/// All paths are built here so the namespace layout lives in one place.
pub mod paths {
    use daily_dish_core::{AccountId, DishId, Email};

    use crate::models::ChallengePurpose;

    /// Namespace prefix for challenge records.
    pub const CHALLENGE_NAMESPACE: &str = "challenges";

    /// Account profile document.
    #[must_use]
    pub fn account(id: AccountId) -> String {
        format!("accounts/{id}")
    }

    /// Credential record for an account.
    #[must_use]
    pub fn credential(id: AccountId) -> String {
        format!("credentials/{id}")
    }

    /// Email-to-account index entry.
    #[must_use]
    pub fn account_index(email: &Email) -> String {
        format!("account_index/{email}")
    }

    /// Per-dish review log.
    #[must_use]
    pub fn dish_reviews(dish_id: DishId) -> String {
        format!("reviews/{dish_id}")
    }

    /// Challenge record for an email and purpose.
    #[must_use]
    pub fn challenge(email: &Email, purpose: ChallengePurpose) -> String {
        format!("{CHALLENGE_NAMESPACE}/{purpose}/{email}")
    }
}
