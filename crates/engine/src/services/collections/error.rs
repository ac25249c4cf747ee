//! Personalization error types.

use thiserror::Error;

use daily_dish_core::RatingError;

use crate::store::StoreError;

/// Errors that can occur during personalization operations.
#[derive(Debug, Error)]
pub enum PersonalizationError {
    /// No established session; the caller should prompt for login and
    /// retry. The underlying store is never touched in this case.
    #[error("not signed in")]
    Unauthenticated,

    /// Review comment was empty after trimming.
    #[error("comment cannot be empty")]
    EmptyComment,

    /// Review rating outside the accepted range.
    #[error(transparent)]
    InvalidRating(#[from] RatingError),

    /// Store failure (local quota or corrupt document).
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
