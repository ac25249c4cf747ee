//! Engine data models.
//!
//! Persisted document shapes and the runtime values assembled from them.

pub mod account;
pub mod challenge;
pub mod dish;
pub mod personalization;

pub use account::{Account, AccountCredential, AccountDocument, AccountIndexEntry, CredentialRecord};
pub use challenge::{Challenge, ChallengePurpose};
pub use dish::Dish;
pub use personalization::{FavoriteEntry, NewShoppingItem, Review, ShoppingListItem};
