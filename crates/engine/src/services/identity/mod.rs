//! Identity and credential management.
//!
//! Registration gated by an emailed one-time passcode, password and
//! external-provider login, password reset, and logout. Owns the account
//! records; drives session transitions through the broadcaster.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;

use daily_dish_core::{AccountId, Email};

use crate::challenge::{ChallengeStore, VerifyOutcome};
use crate::models::{
    Account, AccountCredential, AccountDocument, AccountIndexEntry, ChallengePurpose,
    CredentialRecord,
};
use crate::notify::{DeliveryPayload, NotificationSender};
use crate::session::{Session, SessionBroadcaster, SessionProvider};
use crate::store::remote::RemoteStore;
use crate::store::{self, DualStore, StoreError, paths};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// An assertion from an external identity provider.
///
/// Verifying the assertion is out of scope here: the remote store's own
/// identity layer has already authenticated the user by the time this
/// value exists. The engine only normalizes it into an account.
#[derive(Debug, Clone)]
pub struct ExternalAssertion {
    /// Provider identifier, e.g. `google.com`.
    pub provider: String,
    /// Email the provider vouches for.
    pub email: String,
    /// Display name supplied by the provider, if any.
    pub display_name: Option<String>,
}

/// Identity and credential service.
pub struct IdentityService<R, N>
where
    R: RemoteStore,
    N: NotificationSender,
{
    store: Arc<DualStore<R>>,
    challenges: Arc<ChallengeStore>,
    sessions: Arc<SessionBroadcaster>,
    sender: N,
}

impl<R, N> IdentityService<R, N>
where
    R: RemoteStore,
    N: NotificationSender,
{
    /// Create the service from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<DualStore<R>>,
        challenges: Arc<ChallengeStore>,
        sessions: Arc<SessionBroadcaster>,
        sender: N,
    ) -> Self {
        Self {
            store,
            challenges,
            sessions,
            sender,
        }
    }

    // =========================================================================
    // Challenge flows
    // =========================================================================

    /// Issue a registration code and hand it to the delivery sender.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address and
    /// `AuthError::Delivery` if the sender fails.
    pub async fn request_registration_code(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let challenge = self.challenges.issue(&email, ChallengePurpose::Registration)?;
        self.sender
            .send(
                &email,
                &DeliveryPayload {
                    code: challenge.code,
                    purpose: ChallengePurpose::Registration,
                },
            )
            .await?;
        Ok(())
    }

    /// Verify a submitted code for any purpose.
    ///
    /// Returns the challenge store's outcome untranslated; UI flows drive
    /// their step transitions off it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address and
    /// `AuthError::Store` if attempt bookkeeping cannot be persisted.
    pub fn verify_code(
        &self,
        email: &str,
        purpose: ChallengePurpose,
        code: &str,
    ) -> Result<VerifyOutcome, AuthError> {
        let email = Email::parse(email)?;
        Ok(self.challenges.verify(&email, purpose, code)?)
    }

    // =========================================================================
    // Registration & login
    // =========================================================================

    /// Register a new account.
    ///
    /// Requires a previously verified registration challenge for the
    /// email; consumes it on success. An empty display name defaults to
    /// the email's local part.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailNotVerified` without a verified challenge,
    /// `AuthError::EmailAlreadyRegistered` for a duplicate email, and
    /// `AuthError::WeakCredential` for a short password.
    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        if !self
            .challenges
            .is_verified(&email, ChallengePurpose::Registration)
        {
            return Err(AuthError::EmailNotVerified);
        }

        if self
            .store
            .exists_either(&paths::account_index(&email))
            .await
        {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let display_name = match display_name.trim() {
            "" => email.local_part().to_string(),
            name => name.to_string(),
        };

        let account = Account {
            id: AccountId::generate(),
            email: email.clone(),
            display_name,
            credential: AccountCredential::Password {
                hash: hash_password(password)?,
            },
            created_at: Utc::now(),
            email_verified: true,
        };

        self.persist_account(&account).await?;
        self.challenges
            .take_verified(&email, ChallengePurpose::Registration)?;

        tracing::info!(account_id = %account.id, email = %email, "account registered");
        Ok(account)
    }

    /// Login with email and password, establishing the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountNotFound` for an unknown email,
    /// `AuthError::InvalidCredential` for a wrong password, and
    /// `AuthError::ExternalProviderRequired` when the account has no
    /// password to check.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = Email::parse(email)?;

        let account_id = self
            .lookup_account_id(&email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let credential = self.load_credential(account_id).await?;
        match &credential.credential {
            AccountCredential::External { .. } => return Err(AuthError::ExternalProviderRequired),
            AccountCredential::Password { hash } => verify_password(password, hash)?,
        }

        let profile = self.load_profile(account_id).await?;
        let session = Session {
            account_id,
            email,
            display_name: profile.username,
            provider: SessionProvider::Password,
            established_at: Utc::now(),
        };
        self.sessions.establish(session.clone());
        Ok(session)
    }

    /// Login through an external identity provider.
    ///
    /// Auto-provisions an account (with `email_verified = true`) on first
    /// sight of the email; otherwise reuses the existing account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed assertion email
    /// and `AuthError::Store` if provisioning cannot be persisted.
    pub async fn login_external(
        &self,
        assertion: ExternalAssertion,
    ) -> Result<Session, AuthError> {
        let email = Email::parse(&assertion.email)?;

        let (account_id, display_name) = match self.lookup_account_id(&email).await? {
            Some(id) => {
                let profile = self.load_profile(id).await?;
                (id, profile.username)
            }
            None => {
                let display_name = assertion
                    .display_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| email.local_part())
                    .to_string();

                let account = Account {
                    id: AccountId::generate(),
                    email: email.clone(),
                    display_name: display_name.clone(),
                    credential: AccountCredential::External {
                        provider: assertion.provider.clone(),
                    },
                    created_at: Utc::now(),
                    email_verified: true,
                };
                self.persist_account(&account).await?;
                tracing::info!(
                    account_id = %account.id,
                    provider = %assertion.provider,
                    "account auto-provisioned from external provider"
                );
                (account.id, display_name)
            }
        };

        let session = Session {
            account_id,
            email,
            display_name,
            provider: SessionProvider::External,
            established_at: Utc::now(),
        };
        self.sessions.establish(session.clone());
        Ok(session)
    }

    /// Destroy the current session, if any.
    ///
    /// Personalization collections are scoped to the account, not the
    /// session, so they are left untouched.
    pub fn logout(&self) -> Option<Session> {
        self.sessions.clear()
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Issue a password reset code for a registered email.
    ///
    /// The existence check consults both stores, so a degraded remote
    /// store cannot produce a false "not registered".
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailNotRegistered` for an unknown email and
    /// `AuthError::Delivery` if the sender fails.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;

        if !self
            .store
            .exists_either(&paths::account_index(&email))
            .await
        {
            return Err(AuthError::EmailNotRegistered);
        }

        let challenge = self
            .challenges
            .issue(&email, ChallengePurpose::PasswordReset)?;
        self.sender
            .send(
                &email,
                &DeliveryPayload {
                    code: challenge.code,
                    purpose: ChallengePurpose::PasswordReset,
                },
            )
            .await?;
        Ok(())
    }

    /// Verify a reset code and replace the account credential.
    ///
    /// An external-provider account gains a password here; afterwards both
    /// login paths work for it.
    ///
    /// # Errors
    ///
    /// Returns a code rejection (`CodeInvalid`, `CodeExpired`,
    /// `CodeAttemptsExhausted`, `CodeNotFound`), `WeakCredential` for a
    /// short password, or `AccountNotFound` for an unknown email.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        validate_password(new_password)?;

        match self
            .challenges
            .verify(&email, ChallengePurpose::PasswordReset, code)?
        {
            VerifyOutcome::Verified => {}
            VerifyOutcome::InvalidCode { remaining_attempts } => {
                return Err(AuthError::CodeInvalid { remaining_attempts });
            }
            VerifyOutcome::Expired => return Err(AuthError::CodeExpired),
            VerifyOutcome::TooManyAttempts => return Err(AuthError::CodeAttemptsExhausted),
            VerifyOutcome::NotFound => return Err(AuthError::CodeNotFound),
        }

        let account_id = self
            .lookup_account_id(&email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let hash = hash_password(new_password)?;
        let path = paths::credential(account_id);
        let closure_path = path.clone();
        self.store
            .write(&path, move |current| {
                let mut record = match current {
                    Some(doc) => store::decode::<CredentialRecord>(&closure_path, doc)?,
                    None => CredentialRecord {
                        credential: AccountCredential::Password {
                            hash: String::new(),
                        },
                        email_verified: true,
                    },
                };
                record.credential = AccountCredential::Password { hash };
                store::encode(&closure_path, &record)
            })
            .await?;

        self.challenges
            .take_verified(&email, ChallengePurpose::PasswordReset)?;

        tracing::info!(account_id = %account_id, "password reset");
        Ok(())
    }

    // =========================================================================
    // Read surface
    // =========================================================================

    /// True if an account exists for the email in either store.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address.
    pub async fn email_registered(&self, email: &str) -> Result<bool, AuthError> {
        let email = Email::parse(email)?;
        Ok(self
            .store
            .exists_either(&paths::account_index(&email))
            .await)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn lookup_account_id(&self, email: &Email) -> Result<Option<AccountId>, AuthError> {
        let path = paths::account_index(email);
        let Some(doc) = self.store.read(&path).await? else {
            return Ok(None);
        };
        let entry: AccountIndexEntry = store::decode(&path, doc)?;
        Ok(Some(entry.account_id))
    }

    async fn load_credential(&self, account_id: AccountId) -> Result<CredentialRecord, AuthError> {
        let path = paths::credential(account_id);
        let doc = self
            .store
            .read(&path)
            .await?
            .ok_or_else(|| StoreError::Corrupt {
                path: path.clone(),
                message: "indexed account has no credential record".to_string(),
            })?;
        Ok(store::decode(&path, doc)?)
    }

    async fn load_profile(&self, account_id: AccountId) -> Result<AccountDocument, AuthError> {
        let path = paths::account(account_id);
        let doc = self
            .store
            .read(&path)
            .await?
            .ok_or_else(|| StoreError::Corrupt {
                path: path.clone(),
                message: "indexed account has no profile document".to_string(),
            })?;
        Ok(store::decode(&path, doc)?)
    }

    /// Write the three documents a new account consists of. The index
    /// entry goes last: it is what publishes the account's existence.
    async fn persist_account(&self, account: &Account) -> Result<(), AuthError> {
        let profile = AccountDocument {
            username: account.display_name.clone(),
            email: account.email.to_string(),
            favorites: Vec::new(),
            shopping_list: Vec::new(),
            created_at: account.created_at,
        };
        let profile_path = paths::account(account.id);
        let encoded = store::encode(&profile_path, &profile)?;
        self.store
            .write(&profile_path, move |_| Ok(encoded))
            .await?;

        let record = CredentialRecord {
            credential: account.credential.clone(),
            email_verified: account.email_verified,
        };
        let credential_path = paths::credential(account.id);
        let encoded = store::encode(&credential_path, &record)?;
        self.store
            .write(&credential_path, move |_| Ok(encoded))
            .await?;

        let entry = AccountIndexEntry {
            account_id: account.id,
        };
        let index_path = paths::account_index(&account.email);
        let encoded = store::encode(&index_path, &entry)?;
        self.store.write(&index_path, move |_| Ok(encoded)).await?;

        Ok(())
    }
}

/// Validate password meets the minimum-length policy.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakCredential {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredential)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredential)
}
