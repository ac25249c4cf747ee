//! Identity error types.

use thiserror::Error;

use daily_dish_core::EmailError;

use crate::notify::NotifyError;
use crate::store::StoreError;

/// Errors that can occur during identity operations.
///
/// Credential and validation failures are terminal and surfaced verbatim;
/// remote-store failures never appear here because the dual-store adapter
/// recovers them locally.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Registration attempted without a verified challenge.
    #[error("email not verified")]
    EmailNotVerified,

    /// An account with this email already exists.
    #[error("an account with this email already exists")]
    EmailAlreadyRegistered,

    /// Password fails the minimum-length policy.
    #[error("password must be at least {min} characters")]
    WeakCredential {
        /// Minimum accepted length.
        min: usize,
    },

    /// No account for this email.
    #[error("account not found")]
    AccountNotFound,

    /// Wrong password.
    #[error("invalid credentials")]
    InvalidCredential,

    /// The account has no password; it signs in through an external
    /// provider. Distinguished from [`AuthError::InvalidCredential`] so
    /// callers can route the user to the right login path instead of a
    /// misleading wrong-password message.
    #[error("this email signs in through an external provider")]
    ExternalProviderRequired,

    /// Password reset requested for an unknown email.
    #[error("no account is registered with this email")]
    EmailNotRegistered,

    /// Submitted code did not match.
    #[error("invalid code; {remaining_attempts} attempts remaining")]
    CodeInvalid {
        /// Wrong attempts still available.
        remaining_attempts: u32,
    },

    /// The code expired before it was submitted.
    #[error("code expired; request a new one")]
    CodeExpired,

    /// The attempt budget is spent.
    #[error("too many attempts; request a new code")]
    CodeAttemptsExhausted,

    /// No live code for this email.
    #[error("no code found; request a new one")]
    CodeNotFound,

    /// Password hashing failed.
    #[error("password hashing error")]
    PasswordHash,

    /// Code delivery failed.
    #[error("delivery failed: {0}")]
    Delivery(#[from] NotifyError),

    /// Store failure (local quota or corrupt document).
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
