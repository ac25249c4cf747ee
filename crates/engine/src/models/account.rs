//! Account types and their persisted document shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use daily_dish_core::{AccountId, Email};

use super::personalization::{FavoriteEntry, ShoppingListItem};

/// How an account authenticates.
///
/// Constructed exactly once, at the boundary where the account is created
/// (local registration or external-provider login). Nothing downstream
/// branches on raw provider payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountCredential {
    /// Local password login; holds the Argon2id PHC-format hash.
    Password {
        /// PHC string produced at registration or password reset.
        hash: String,
    },
    /// Account provisioned through an external identity provider; it has
    /// no local password.
    External {
        /// Provider identifier, e.g. `google.com`.
        provider: String,
    },
}

impl AccountCredential {
    /// True for external-provider accounts.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }
}

/// A user account.
///
/// Owned exclusively by the identity service. Assembled from the account
/// document plus the credential record; never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier; also the account document key.
    pub id: AccountId,
    /// Normalized unique email.
    pub email: Email,
    /// Name shown in the UI.
    pub display_name: String,
    /// How this account authenticates.
    pub credential: AccountCredential,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// Whether the email was verified (always true for accounts created
    /// through the passcode flow or an external provider).
    pub email_verified: bool,
}

/// Persisted account profile document, stored at `accounts/{account_id}`.
///
/// Holds the personalization collections alongside the profile so a
/// single read serves the whole profile view. Reviews live in their own
/// per-dish namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDocument {
    /// Display name (`username` in the stored document).
    pub username: String,
    /// Normalized email, duplicated here for display.
    pub email: String,
    /// Favorite dishes, insertion order preserved.
    #[serde(default)]
    pub favorites: Vec<FavoriteEntry>,
    /// Shopping list entries.
    #[serde(default)]
    pub shopping_list: Vec<ShoppingListItem>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Credential record, stored at `credentials/{account_id}`.
///
/// Kept out of the profile document so profile reads never touch password
/// material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The account's credential.
    pub credential: AccountCredential,
    /// Whether the email was verified.
    pub email_verified: bool,
}

/// Email-to-account index entry, stored at `account_index/{email}`.
///
/// The index exists so "is this email registered?" can be answered from
/// either store without scanning documents, including offline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountIndexEntry {
    /// The account the email belongs to.
    pub account_id: AccountId,
}

impl Default for AccountDocument {
    fn default() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            favorites: Vec::new(),
            shopping_list: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_serde_tagged() {
        let cred = AccountCredential::Password {
            hash: "$argon2id$v=19$...".to_string(),
        };
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["kind"], "password");

        let external = AccountCredential::External {
            provider: "google.com".to_string(),
        };
        let json = serde_json::to_value(&external).unwrap();
        assert_eq!(json["kind"], "external");
        assert!(external.is_external());
    }

    #[test]
    fn test_account_document_defaults_collections() {
        // Documents written before a collection existed must still decode.
        let json = serde_json::json!({
            "username": "ana",
            "email": "ana@example.com",
            "created_at": "2026-01-01T00:00:00Z",
        });
        let doc: AccountDocument = serde_json::from_value(json).unwrap();
        assert!(doc.favorites.is_empty());
        assert!(doc.shopping_list.is_empty());
    }
}
