//! Unified error handling.
//!
//! Each module has its own error enum; `EngineError` collects them at the
//! crate boundary and classifies every failure so callers can render a
//! short message and decide whether a retry makes sense. Nothing here is
//! ever panicked across the boundary: operations return results and the
//! caller's flow keeps running.

use thiserror::Error;

use crate::config::ConfigError;
use crate::notify::NotifyError;
use crate::services::collections::PersonalizationError;
use crate::services::identity::AuthError;
use crate::store::StoreError;

/// Failure classification.
///
/// - `Validation` and `Auth` failures are terminal for the call and never
///   retried automatically.
/// - `NotFound` is terminal.
/// - `TransientStore` means the fallback also failed or data was corrupt;
///   the operation may succeed later.
/// - `QuotaExceeded` is fatal: no further local writes happen this
///   session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape.
    Validation,
    /// Wrong credential, unverified email, replayed or rejected code,
    /// or a missing session.
    Auth,
    /// No such account, challenge, or item.
    NotFound,
    /// Store-layer failure after local fallback.
    TransientStore,
    /// Local store full.
    QuotaExceeded,
}

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Identity operation failed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Personalization operation failed.
    #[error("personalization error: {0}")]
    Personalization(#[from] PersonalizationError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Code delivery failed.
    #[error("delivery error: {0}")]
    Notify(#[from] NotifyError),

    /// Configuration failed to load.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Classify this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) | AuthError::WeakCredential { .. } => {
                    ErrorKind::Validation
                }
                AuthError::AccountNotFound
                | AuthError::EmailNotRegistered
                | AuthError::CodeNotFound => ErrorKind::NotFound,
                AuthError::Store(store) => store_kind(store),
                AuthError::Delivery(_) | AuthError::PasswordHash => ErrorKind::TransientStore,
                _ => ErrorKind::Auth,
            },
            Self::Personalization(err) => match err {
                PersonalizationError::Unauthenticated => ErrorKind::Auth,
                PersonalizationError::EmptyComment | PersonalizationError::InvalidRating(_) => {
                    ErrorKind::Validation
                }
                PersonalizationError::Store(store) => store_kind(store),
            },
            Self::Store(store) => store_kind(store),
            Self::Notify(_) => ErrorKind::TransientStore,
            Self::Config(_) => ErrorKind::Validation,
        }
    }

    /// Short user-facing message; never internal detail or a backtrace.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::QuotaExceeded => {
                "This device is out of storage space for Daily Dish.".to_string()
            }
            ErrorKind::TransientStore => {
                "Something went wrong saving your changes. Please try again.".to_string()
            }
            // Validation, auth, and not-found messages are already written
            // for end users by the operation that produced them.
            _ => match self {
                Self::Auth(err) => err.to_string(),
                Self::Personalization(err) => err.to_string(),
                Self::Store(err) => err.to_string(),
                Self::Notify(err) => err.to_string(),
                Self::Config(err) => err.to_string(),
            },
        }
    }
}

const fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::Quota(_) => ErrorKind::QuotaExceeded,
        StoreError::Io(_) | StoreError::Corrupt { .. } => ErrorKind::TransientStore,
    }
}
