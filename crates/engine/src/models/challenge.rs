//! One-time passcode challenge records.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use daily_dish_core::Email;

/// What a challenge unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengePurpose {
    /// Email verification before account creation.
    Registration,
    /// Password reset for an existing account.
    PasswordReset,
}

impl ChallengePurpose {
    /// Stable string form, used in document paths and delivery payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for ChallengePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A one-time passcode challenge.
///
/// One live challenge per `(email, purpose)`; issuing a new one replaces
/// the prior record. A challenge is terminal once consumed, expired, or
/// out of attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Address the code was issued for.
    pub email: Email,
    /// The numeric code, stored as a fixed-length string.
    pub code: String,
    /// What this challenge unlocks.
    pub purpose: ChallengePurpose,
    /// When the challenge was issued.
    pub created_at: DateTime<Utc>,
    /// Hard expiry; verification past this instant is rejected regardless
    /// of code correctness.
    pub expires_at: DateTime<Utc>,
    /// Wrong-code submissions so far.
    pub attempts_used: u32,
    /// Attempt budget; reaching it rejects the challenge permanently.
    pub attempts_max: u32,
    /// Set on successful verification; a consumed challenge never
    /// verifies again.
    pub consumed: bool,
}

impl Challenge {
    /// Returns true if the challenge has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns true if the attempt budget is spent.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts_used >= self.attempts_max
    }

    /// Returns true once the code was verified.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.consumed
    }

    /// Wrong attempts still available.
    #[must_use]
    pub const fn remaining_attempts(&self) -> u32 {
        self.attempts_max.saturating_sub(self.attempts_used)
    }
}
