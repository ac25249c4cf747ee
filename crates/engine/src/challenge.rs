//! One-time passcode challenge store.
//!
//! Challenges gate registration and password reset. They live in the
//! local store's challenge namespace only: codes are device-scoped
//! secrets and never transit the remote store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use subtle::ConstantTimeEq;

use daily_dish_core::Email;

use crate::models::{Challenge, ChallengePurpose};
use crate::store::local::LocalStore;
use crate::store::{self, StoreError, paths};

/// Wrong-code submissions allowed before a challenge is permanently
/// rejected.
pub const MAX_ATTEMPTS: u32 = 3;

/// Result of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matched; the challenge is now consumed and will never verify
    /// again.
    Verified,
    /// Code did not match; the attempt budget shrank.
    InvalidCode {
        /// Wrong attempts still available.
        remaining_attempts: u32,
    },
    /// The challenge expired before this attempt.
    Expired,
    /// The attempt budget is spent; only a fresh challenge can succeed.
    TooManyAttempts,
    /// No live challenge for this email and purpose (never issued,
    /// already consumed, or purged).
    NotFound,
}

/// Keyed storage of one-time passcode challenges.
pub struct ChallengeStore {
    local: Arc<LocalStore>,
    ttl: chrono::Duration,
}

impl ChallengeStore {
    /// Create a store issuing challenges with the given time-to-live.
    #[must_use]
    pub fn new(local: Arc<LocalStore>, ttl: Duration) -> Self {
        Self {
            local,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(10)),
        }
    }

    /// Issue a fresh challenge for `(email, purpose)`.
    ///
    /// Any prior challenge for the same key is replaced and thereby
    /// invalidated, so a stale code can never be accepted after a resend.
    /// Delivery is the caller's job; this only records state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be persisted.
    pub fn issue(
        &self,
        email: &Email,
        purpose: ChallengePurpose,
    ) -> Result<Challenge, StoreError> {
        let now = Utc::now();
        let challenge = Challenge {
            email: email.clone(),
            code: generate_code(),
            purpose,
            created_at: now,
            expires_at: now + self.ttl,
            attempts_used: 0,
            attempts_max: MAX_ATTEMPTS,
            consumed: false,
        };

        let path = paths::challenge(email, purpose);
        self.local.put(&path, store::encode(&path, &challenge)?)?;
        tracing::info!(email = %email, purpose = %purpose, "challenge issued");
        Ok(challenge)
    }

    /// Verify a submitted code.
    ///
    /// Wrong codes burn an attempt; the third failure rejects the
    /// challenge permanently even if the correct code is submitted later.
    /// A match consumes the challenge: a second verify of the same
    /// challenge reports [`VerifyOutcome::NotFound`], never `Verified`
    /// twice.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if attempt bookkeeping cannot be persisted.
    pub fn verify(
        &self,
        email: &Email,
        purpose: ChallengePurpose,
        submitted_code: &str,
    ) -> Result<VerifyOutcome, StoreError> {
        let path = paths::challenge(email, purpose);
        let Some(document) = self.local.get(&path) else {
            return Ok(VerifyOutcome::NotFound);
        };
        let mut challenge: Challenge = store::decode(&path, document)?;

        if challenge.consumed {
            return Ok(VerifyOutcome::NotFound);
        }
        if challenge.is_expired(Utc::now()) {
            self.local.remove(&path)?;
            return Ok(VerifyOutcome::Expired);
        }
        if challenge.is_exhausted() {
            return Ok(VerifyOutcome::TooManyAttempts);
        }

        if codes_match(&challenge.code, submitted_code) {
            challenge.consumed = true;
            self.local.put(&path, store::encode(&path, &challenge)?)?;
            tracing::info!(email = %email, purpose = %purpose, "challenge verified");
            return Ok(VerifyOutcome::Verified);
        }

        challenge.attempts_used += 1;
        let exhausted = challenge.is_exhausted();
        let remaining = challenge.remaining_attempts();
        self.local.put(&path, store::encode(&path, &challenge)?)?;

        if exhausted {
            tracing::warn!(email = %email, purpose = %purpose, "challenge attempt budget spent");
            Ok(VerifyOutcome::TooManyAttempts)
        } else {
            Ok(VerifyOutcome::InvalidCode {
                remaining_attempts: remaining,
            })
        }
    }

    /// True if `(email, purpose)` holds a verified challenge awaiting
    /// consumption.
    #[must_use]
    pub fn is_verified(&self, email: &Email, purpose: ChallengePurpose) -> bool {
        let path = paths::challenge(email, purpose);
        self.local
            .get(&path)
            .and_then(|doc| store::decode::<Challenge>(&path, doc).ok())
            .is_some_and(|c| c.is_verified())
    }

    /// Consume a verified challenge, deleting its record.
    ///
    /// Returns `false` (leaving the record alone) if the challenge is
    /// missing or was never verified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be deleted.
    pub fn take_verified(
        &self,
        email: &Email,
        purpose: ChallengePurpose,
    ) -> Result<bool, StoreError> {
        if !self.is_verified(email, purpose) {
            return Ok(false);
        }
        self.local.remove(&paths::challenge(email, purpose))?;
        Ok(true)
    }

    /// Delete every expired challenge record, returning how many were
    /// removed. Verification already drops expired records as it touches
    /// them; this sweep exists for the ones nobody retried.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a record cannot be deleted.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut purged = 0;

        for path in self.local.keys_under(paths::CHALLENGE_NAMESPACE) {
            let Some(document) = self.local.get(&path) else {
                continue;
            };
            let challenge: Challenge = store::decode(&path, document)?;
            if challenge.is_expired(now) {
                self.local.remove(&path)?;
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::debug!(purged, "purged expired challenges");
        }
        Ok(purged)
    }
}

/// Generate a 6-digit verification code.
#[must_use]
fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// Constant-time code comparison, so a near-miss costs the same as a
/// cold miss.
fn codes_match(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;

    fn store() -> (tempfile::TempDir, ChallengeStore) {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalStore::open(dir.path().join("state.json"), 1024 * 1024).unwrap());
        (dir, ChallengeStore::new(local, Duration::from_secs(600)))
    }

    fn email() -> Email {
        Email::parse("a@b.com").unwrap()
    }

    /// Rewrite a stored challenge as already expired.
    fn force_expire(store: &ChallengeStore, email: &Email, purpose: ChallengePurpose) {
        let path = paths::challenge(email, purpose);
        let mut challenge: Challenge =
            crate::store::decode(&path, store.local.get(&path).unwrap()).unwrap();
        challenge.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store
            .local
            .put(&path, crate::store::encode(&path, &challenge).unwrap())
            .unwrap();
    }

    #[test]
    fn test_code_shape() {
        let code = generate_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_verify_correct_code() {
        let (_dir, store) = store();
        let challenge = store.issue(&email(), ChallengePurpose::Registration).unwrap();

        let outcome = store
            .verify(&email(), ChallengePurpose::Registration, &challenge.code)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
        assert!(store.is_verified(&email(), ChallengePurpose::Registration));
    }

    #[test]
    fn test_verified_is_single_use() {
        let (_dir, store) = store();
        let challenge = store.issue(&email(), ChallengePurpose::Registration).unwrap();

        store
            .verify(&email(), ChallengePurpose::Registration, &challenge.code)
            .unwrap();
        // Replaying the same (correct) code must not verify twice.
        let outcome = store
            .verify(&email(), ChallengePurpose::Registration, &challenge.code)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::NotFound);
    }

    #[test]
    fn test_attempt_budget_sequence() {
        let (_dir, store) = store();
        let challenge = store.issue(&email(), ChallengePurpose::Registration).unwrap();

        let first = store
            .verify(&email(), ChallengePurpose::Registration, "000000")
            .unwrap();
        assert_eq!(
            first,
            VerifyOutcome::InvalidCode {
                remaining_attempts: 2
            }
        );
        let second = store
            .verify(&email(), ChallengePurpose::Registration, "000000")
            .unwrap();
        assert_eq!(
            second,
            VerifyOutcome::InvalidCode {
                remaining_attempts: 1
            }
        );
        let third = store
            .verify(&email(), ChallengePurpose::Registration, "000000")
            .unwrap();
        assert_eq!(third, VerifyOutcome::TooManyAttempts);

        // Even the correct code is rejected now.
        let fourth = store
            .verify(&email(), ChallengePurpose::Registration, &challenge.code)
            .unwrap();
        assert_eq!(fourth, VerifyOutcome::TooManyAttempts);
    }

    #[test]
    fn test_expired_challenge_rejected_regardless_of_code() {
        let (_dir, store) = store();
        let challenge = store.issue(&email(), ChallengePurpose::Registration).unwrap();
        force_expire(&store, &email(), ChallengePurpose::Registration);

        let outcome = store
            .verify(&email(), ChallengePurpose::Registration, &challenge.code)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Expired);
        // The record is gone afterwards.
        let outcome = store
            .verify(&email(), ChallengePurpose::Registration, &challenge.code)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::NotFound);
    }

    #[test]
    fn test_reissue_replaces_prior_challenge() {
        let (_dir, store) = store();
        let first = store.issue(&email(), ChallengePurpose::Registration).unwrap();
        let second = store.issue(&email(), ChallengePurpose::Registration).unwrap();

        // The old code only works if it happens to collide with the new one.
        if first.code != second.code {
            let outcome = store
                .verify(&email(), ChallengePurpose::Registration, &first.code)
                .unwrap();
            assert!(matches!(outcome, VerifyOutcome::InvalidCode { .. }));
        }
        let outcome = store
            .verify(&email(), ChallengePurpose::Registration, &second.code)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[test]
    fn test_purposes_are_independent() {
        let (_dir, store) = store();
        let registration = store.issue(&email(), ChallengePurpose::Registration).unwrap();
        let reset = store.issue(&email(), ChallengePurpose::PasswordReset).unwrap();

        let outcome = store
            .verify(&email(), ChallengePurpose::Registration, &registration.code)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
        // The reset challenge is untouched.
        let outcome = store
            .verify(&email(), ChallengePurpose::PasswordReset, &reset.code)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[test]
    fn test_take_verified_consumes_once() {
        let (_dir, store) = store();
        let challenge = store.issue(&email(), ChallengePurpose::Registration).unwrap();

        assert!(!store.take_verified(&email(), ChallengePurpose::Registration).unwrap());
        store
            .verify(&email(), ChallengePurpose::Registration, &challenge.code)
            .unwrap();
        assert!(store.take_verified(&email(), ChallengePurpose::Registration).unwrap());
        assert!(!store.take_verified(&email(), ChallengePurpose::Registration).unwrap());
    }

    #[test]
    fn test_purge_expired_sweeps_stale_records() {
        let (_dir, store) = store();
        store.issue(&email(), ChallengePurpose::Registration).unwrap();
        let other = Email::parse("c@d.com").unwrap();
        store.issue(&other, ChallengePurpose::Registration).unwrap();
        force_expire(&store, &other, ChallengePurpose::Registration);

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.purge_expired().unwrap(), 0);
    }
}
