//! Personalization collections: favorites, shopping list, reviews.
//!
//! Every mutation resolves the account from the current session — never
//! from a caller-supplied account id — and performs one read-modify-write
//! cycle against the dual store. Mutations are idempotent under retry
//! except [`PersonalizationService::add_review`], which is append-only by
//! design.

mod error;

pub use error::PersonalizationError;

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use daily_dish_core::{DishId, DishRating};

use crate::models::{
    AccountDocument, Dish, FavoriteEntry, NewShoppingItem, Review, ShoppingListItem,
    personalization::normalized_name,
};
use crate::session::{Session, SessionBroadcaster};
use crate::store::remote::RemoteStore;
use crate::store::{self, DualStore, StoreError, paths};

/// Outcome of a favorite toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteToggle {
    /// Whether the dish is a favorite after the toggle.
    pub now_favorite: bool,
}

/// Outcome of a deduplicating shopping list add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShoppingAddOutcome {
    /// The item was appended.
    Added(ShoppingListItem),
    /// An entry with the same normalized name already exists; nothing was
    /// written. Not an error, so repeated UI-triggered calls are safe.
    DuplicateIgnored,
}

/// Outcome of a positional shopping list removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The entry that was removed.
    Removed(ShoppingListItem),
    /// The index was past the end of the current snapshot; nothing was
    /// written. The caller should re-fetch the list.
    OutOfRange,
}

/// Personalization collections service.
pub struct PersonalizationService<R: RemoteStore> {
    store: Arc<DualStore<R>>,
    sessions: Arc<SessionBroadcaster>,
}

impl<R: RemoteStore> PersonalizationService<R> {
    /// Create the service from its collaborators.
    #[must_use]
    pub fn new(store: Arc<DualStore<R>>, sessions: Arc<SessionBroadcaster>) -> Self {
        Self { store, sessions }
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Toggle a dish in the favorites set.
    ///
    /// Removes the entry if present, appends it otherwise; calling twice
    /// returns to the starting state.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Unauthenticated` without a session.
    pub async fn toggle_favorite(
        &self,
        dish: &Dish,
    ) -> Result<FavoriteToggle, PersonalizationError> {
        let session = self.require_session()?;
        let path = paths::account(session.account_id);
        let dish_id = dish.id;
        let dish_name = dish.name.clone();

        let closure_path = path.clone();
        let now_favorite = self
            .store
            .write_with(&path, move |current| {
                let mut doc = account_document(&closure_path, current, &session)?;

                let now_favorite = match doc.favorites.iter().position(|f| f.dish_id == dish_id) {
                    Some(index) => {
                        doc.favorites.remove(index);
                        false
                    }
                    None => {
                        doc.favorites.push(FavoriteEntry {
                            dish_id,
                            name: dish_name,
                            added_at: Utc::now(),
                        });
                        true
                    }
                };

                Ok((store::encode(&closure_path, &doc)?, now_favorite))
            })
            .await?;

        tracing::info!(dish_id = %dish_id, now_favorite, "favorite toggled");
        Ok(FavoriteToggle { now_favorite })
    }

    /// True if the dish is currently favorited. Always false without a
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Store` for store failures.
    pub async fn is_favorite(&self, dish_id: DishId) -> Result<bool, PersonalizationError> {
        Ok(self
            .get_favorites()
            .await?
            .iter()
            .any(|f| f.dish_id == dish_id))
    }

    /// The favorites list in insertion order. Empty without a session.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Store` for store failures.
    pub async fn get_favorites(&self) -> Result<Vec<FavoriteEntry>, PersonalizationError> {
        let Some(session) = self.sessions.current() else {
            return Ok(Vec::new());
        };
        Ok(self.read_account_document(&session).await?.favorites)
    }

    // =========================================================================
    // Shopping list
    // =========================================================================

    /// Add an item, deduplicating by case-insensitive trimmed name.
    ///
    /// A duplicate reports [`ShoppingAddOutcome::DuplicateIgnored`] and
    /// leaves the list untouched, so retries are harmless.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Unauthenticated` without a session.
    pub async fn add_to_shopping_list(
        &self,
        item: NewShoppingItem,
    ) -> Result<ShoppingAddOutcome, PersonalizationError> {
        let session = self.require_session()?;
        let path = paths::account(session.account_id);

        let closure_path = path.clone();
        let outcome = self
            .store
            .write_with(&path, move |current| {
                let mut doc = account_document(&closure_path, current, &session)?;

                let key = normalized_name(&item.name);
                if doc
                    .shopping_list
                    .iter()
                    .any(|existing| existing.normalized_name() == key)
                {
                    let unchanged = store::encode(&closure_path, &doc)?;
                    return Ok((unchanged, ShoppingAddOutcome::DuplicateIgnored));
                }

                let entry = ShoppingListItem::new(item, Utc::now());
                doc.shopping_list.push(entry.clone());
                Ok((
                    store::encode(&closure_path, &doc)?,
                    ShoppingAddOutcome::Added(entry),
                ))
            })
            .await?;

        if let ShoppingAddOutcome::Added(entry) = &outcome {
            tracing::info!(item = %entry.name, "shopping list item added");
        }
        Ok(outcome)
    }

    /// Add an item without deduplication.
    ///
    /// The escape hatch for bulk "add all ingredients": each recipe's
    /// ingredient list is a separate planned purchase, so the same
    /// literal name legitimately appears once per recipe instead of
    /// merging with unrelated entries.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Unauthenticated` without a session.
    pub async fn force_add_to_shopping_list(
        &self,
        item: NewShoppingItem,
    ) -> Result<ShoppingListItem, PersonalizationError> {
        let session = self.require_session()?;
        let path = paths::account(session.account_id);

        let closure_path = path.clone();
        let entry = self
            .store
            .write_with(&path, move |current| {
                let mut doc = account_document(&closure_path, current, &session)?;
                let entry = ShoppingListItem::new(item, Utc::now());
                doc.shopping_list.push(entry.clone());
                Ok((store::encode(&closure_path, &doc)?, entry))
            })
            .await?;

        tracing::info!(item = %entry.name, "shopping list item force-added");
        Ok(entry)
    }

    /// Add every ingredient of a dish to the shopping list.
    ///
    /// Uses the non-deduplicating path, one awaited write per ingredient:
    /// bulk writes must be serialized, never fired concurrently, to keep
    /// remote read-modify-write cycles ordered.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Unauthenticated` without a session.
    pub async fn add_dish_ingredients(
        &self,
        dish: &Dish,
    ) -> Result<Vec<ShoppingListItem>, PersonalizationError> {
        let mut added = Vec::with_capacity(dish.ingredients.len());
        for ingredient in &dish.ingredients {
            added.push(
                self.force_add_to_shopping_list(NewShoppingItem::ingredient(ingredient))
                    .await?,
            );
        }
        Ok(added)
    }

    /// Remove the entry at `index` in the current snapshot.
    ///
    /// Position is the only identity this design guarantees; after a
    /// concurrent mutation the caller must re-fetch before removing
    /// again.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Unauthenticated` without a session.
    pub async fn remove_from_shopping_list(
        &self,
        index: usize,
    ) -> Result<RemoveOutcome, PersonalizationError> {
        let session = self.require_session()?;
        let path = paths::account(session.account_id);

        let closure_path = path.clone();
        let outcome = self
            .store
            .write_with(&path, move |current| {
                let mut doc = account_document(&closure_path, current, &session)?;

                if index >= doc.shopping_list.len() {
                    let unchanged = store::encode(&closure_path, &doc)?;
                    return Ok((unchanged, RemoveOutcome::OutOfRange));
                }

                let removed = doc.shopping_list.remove(index);
                Ok((
                    store::encode(&closure_path, &doc)?,
                    RemoveOutcome::Removed(removed),
                ))
            })
            .await?;

        if let RemoveOutcome::Removed(item) = &outcome {
            tracing::info!(item = %item.name, "shopping list item removed");
        }
        Ok(outcome)
    }

    /// The shopping list. Empty without a session.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Store` for store failures.
    pub async fn get_shopping_list(&self) -> Result<Vec<ShoppingListItem>, PersonalizationError> {
        let Some(session) = self.sessions.current() else {
            return Ok(Vec::new());
        };
        Ok(self.read_account_document(&session).await?.shopping_list)
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Append a review for a dish.
    ///
    /// Deliberately not idempotent: resubmitting creates a second review,
    /// so callers must debounce at the UI layer. The author email always
    /// comes from the session; `author_name` falls back to the session
    /// display name.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Unauthenticated` without a session,
    /// `EmptyComment` for a blank comment, and `InvalidRating` for a
    /// rating outside 1-5.
    pub async fn add_review(
        &self,
        dish: &Dish,
        rating: u8,
        comment: &str,
        author_name: Option<&str>,
    ) -> Result<Review, PersonalizationError> {
        let session = self.require_session()?;

        let comment = comment.trim();
        if comment.is_empty() {
            return Err(PersonalizationError::EmptyComment);
        }
        let rating = daily_dish_core::Rating::new(rating)?;

        let review = Review {
            dish_id: dish.id,
            rating,
            comment: comment.to_string(),
            author_name: author_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(&session.display_name)
                .to_string(),
            author_email: session.email.clone(),
            created_at: Utc::now(),
        };

        let path = paths::dish_reviews(dish.id);
        let closure_path = path.clone();
        let stored = review.clone();
        self.store
            .write(&path, move |current| {
                let mut reviews: Vec<Review> = match current {
                    Some(doc) => store::decode(&closure_path, doc)?,
                    None => Vec::new(),
                };
                reviews.push(stored);
                store::encode(&closure_path, &reviews)
            })
            .await?;

        tracing::info!(dish_id = %dish.id, rating = %review.rating, "review added");
        Ok(review)
    }

    /// All reviews for a dish, oldest first. Readable without a session.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Store` for store failures.
    pub async fn get_dish_reviews(
        &self,
        dish_id: DishId,
    ) -> Result<Vec<Review>, PersonalizationError> {
        let path = paths::dish_reviews(dish_id);
        match self.store.read(&path).await? {
            Some(doc) => Ok(store::decode(&path, doc)?),
            None => Ok(Vec::new()),
        }
    }

    /// Aggregate rating for a dish: mean to one decimal, zero when
    /// unrated. Readable without a session.
    ///
    /// # Errors
    ///
    /// Returns `PersonalizationError::Store` for store failures.
    pub async fn get_dish_rating(
        &self,
        dish_id: DishId,
    ) -> Result<DishRating, PersonalizationError> {
        let reviews = self.get_dish_reviews(dish_id).await?;
        Ok(DishRating::from_ratings(reviews.iter().map(|r| r.rating)))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_session(&self) -> Result<Session, PersonalizationError> {
        self.sessions
            .current()
            .ok_or(PersonalizationError::Unauthenticated)
    }

    async fn read_account_document(
        &self,
        session: &Session,
    ) -> Result<AccountDocument, StoreError> {
        let path = paths::account(session.account_id);
        account_document(&path, self.store.read(&path).await?, session)
    }
}

/// Decode the account document, or start a fresh one for the session's
/// account if none exists yet.
fn account_document(
    path: &str,
    current: Option<Value>,
    session: &Session,
) -> Result<AccountDocument, StoreError> {
    match current {
        Some(doc) => store::decode(path, doc),
        None => Ok(AccountDocument {
            username: session.display_name.clone(),
            email: session.email.to_string(),
            favorites: Vec::new(),
            shopping_list: Vec::new(),
            created_at: session.established_at,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use daily_dish_core::{AccountId, Email};

    use crate::session::SessionProvider;
    use crate::store::LocalStore;
    use crate::store::remote::testing::MemoryRemote;

    struct Fixture {
        _dir: tempfile::TempDir,
        remote: Arc<MemoryRemote>,
        sessions: Arc<SessionBroadcaster>,
        service: PersonalizationService<Arc<MemoryRemote>>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let local =
            Arc::new(LocalStore::open(dir.path().join("state.json"), 1024 * 1024).unwrap());
        let remote = Arc::new(MemoryRemote::default());
        let store = Arc::new(DualStore::new(Arc::clone(&remote), local));
        let sessions = Arc::new(SessionBroadcaster::new());
        let service = PersonalizationService::new(store, Arc::clone(&sessions));

        Fixture {
            _dir: dir,
            remote,
            sessions,
            service,
        }
    }

    fn sign_in(fx: &Fixture) {
        fx.sessions.establish(Session {
            account_id: AccountId::generate(),
            email: Email::parse("ana@example.com").unwrap(),
            display_name: "Ana".to_string(),
            provider: SessionProvider::Password,
            established_at: Utc::now(),
        });
    }

    fn dish(id: i64, name: &str) -> Dish {
        Dish {
            id: DishId::new(id),
            name: name.to_string(),
            ingredients: vec!["eggs".to_string(), "olive oil".to_string()],
            category: "breakfast".to_string(),
            kind: "veg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mutations_require_session() {
        let fx = fixture();
        let err = fx.service.toggle_favorite(&dish(7, "Shakshuka")).await.unwrap_err();
        assert!(matches!(err, PersonalizationError::Unauthenticated));

        let err = fx
            .service
            .add_to_shopping_list(NewShoppingItem::ingredient("eggs"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersonalizationError::Unauthenticated));

        let err = fx.service.remove_from_shopping_list(0).await.unwrap_err();
        assert!(matches!(err, PersonalizationError::Unauthenticated));

        let err = fx
            .service
            .add_review(&dish(7, "Shakshuka"), 5, "great", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersonalizationError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_toggle_favorite_roundtrip() {
        let fx = fixture();
        sign_in(&fx);
        let shakshuka = dish(7, "Shakshuka");

        assert!(!fx.service.is_favorite(shakshuka.id).await.unwrap());

        let on = fx.service.toggle_favorite(&shakshuka).await.unwrap();
        assert!(on.now_favorite);
        assert!(fx.service.is_favorite(shakshuka.id).await.unwrap());

        let off = fx.service.toggle_favorite(&shakshuka).await.unwrap();
        assert!(!off.now_favorite);
        assert!(!fx.service.is_favorite(shakshuka.id).await.unwrap());
        assert!(fx.service.get_favorites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorites_preserve_insertion_order() {
        let fx = fixture();
        sign_in(&fx);
        fx.service.toggle_favorite(&dish(1, "First")).await.unwrap();
        fx.service.toggle_favorite(&dish(2, "Second")).await.unwrap();

        let favorites = fx.service.get_favorites().await.unwrap();
        let names: Vec<_> = favorites.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_shopping_list_dedups_by_normalized_name() {
        let fx = fixture();
        sign_in(&fx);

        let first = fx
            .service
            .add_to_shopping_list(NewShoppingItem::ingredient("Olive Oil"))
            .await
            .unwrap();
        assert!(matches!(first, ShoppingAddOutcome::Added(_)));

        // Case and whitespace variants collapse to the same entry.
        let second = fx
            .service
            .add_to_shopping_list(NewShoppingItem::ingredient("  olive oil "))
            .await
            .unwrap();
        assert_eq!(second, ShoppingAddOutcome::DuplicateIgnored);

        let list = fx.service.get_shopping_list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.first().unwrap().name, "Olive Oil");
    }

    #[tokio::test]
    async fn test_force_add_bypasses_dedup() {
        let fx = fixture();
        sign_in(&fx);

        fx.service
            .add_to_shopping_list(NewShoppingItem::ingredient("eggs"))
            .await
            .unwrap();
        fx.service
            .force_add_to_shopping_list(NewShoppingItem::ingredient("eggs"))
            .await
            .unwrap();

        assert_eq!(fx.service.get_shopping_list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_dish_ingredients_adds_all() {
        let fx = fixture();
        sign_in(&fx);

        let added = fx
            .service
            .add_dish_ingredients(&dish(7, "Shakshuka"))
            .await
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(fx.service.get_shopping_list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_by_position() {
        let fx = fixture();
        sign_in(&fx);
        fx.service
            .add_to_shopping_list(NewShoppingItem::ingredient("eggs"))
            .await
            .unwrap();
        fx.service
            .add_to_shopping_list(NewShoppingItem::ingredient("olive oil"))
            .await
            .unwrap();

        let outcome = fx.service.remove_from_shopping_list(0).await.unwrap();
        match outcome {
            RemoveOutcome::Removed(item) => assert_eq!(item.name, "eggs"),
            RemoveOutcome::OutOfRange => panic!("expected removal"),
        }

        let list = fx.service.get_shopping_list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.first().unwrap().name, "olive oil");

        let outcome = fx.service.remove_from_shopping_list(5).await.unwrap();
        assert_eq!(outcome, RemoveOutcome::OutOfRange);
    }

    #[tokio::test]
    async fn test_add_review_validation() {
        let fx = fixture();
        sign_in(&fx);
        let shakshuka = dish(7, "Shakshuka");

        let err = fx
            .service
            .add_review(&shakshuka, 5, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersonalizationError::EmptyComment));

        let err = fx
            .service
            .add_review(&shakshuka, 6, "too good", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersonalizationError::InvalidRating(_)));
    }

    #[tokio::test]
    async fn test_review_attribution_from_session() {
        let fx = fixture();
        sign_in(&fx);

        let review = fx
            .service
            .add_review(&dish(7, "Shakshuka"), 5, "lovely", None)
            .await
            .unwrap();
        assert_eq!(review.author_name, "Ana");
        assert_eq!(review.author_email.as_str(), "ana@example.com");

        let named = fx
            .service
            .add_review(&dish(7, "Shakshuka"), 4, "still lovely", Some("A. Lima"))
            .await
            .unwrap();
        assert_eq!(named.author_name, "A. Lima");
    }

    #[tokio::test]
    async fn test_reviews_append_and_aggregate() {
        let fx = fixture();
        sign_in(&fx);
        let shakshuka = dish(7, "Shakshuka");

        for (rating, comment) in [(5, "great"), (4, "good"), (3, "fine")] {
            fx.service
                .add_review(&shakshuka, rating, comment, None)
                .await
                .unwrap();
        }

        // Resubmission appends; reviews are not deduplicated.
        assert_eq!(fx.service.get_dish_reviews(shakshuka.id).await.unwrap().len(), 3);

        let rating = fx.service.get_dish_rating(shakshuka.id).await.unwrap();
        assert!((rating.average - 4.0).abs() < f64::EPSILON);
        assert_eq!(rating.count, 3);
    }

    #[tokio::test]
    async fn test_unrated_dish_reports_zero() {
        let fx = fixture();
        let rating = fx.service.get_dish_rating(DishId::new(99)).await.unwrap();
        assert_eq!(rating.count, 0);
        assert!((rating.average - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_reads_without_session_are_empty() {
        let fx = fixture();
        assert!(fx.service.get_favorites().await.unwrap().is_empty());
        assert!(fx.service.get_shopping_list().await.unwrap().is_empty());
        assert!(!fx.service.is_favorite(DishId::new(7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_mutations_survive_remote_failure() {
        let fx = fixture();
        sign_in(&fx);
        fx.remote.set_failing(true);

        let on = fx.service.toggle_favorite(&dish(7, "Shakshuka")).await.unwrap();
        assert!(on.now_favorite);
        assert!(fx.service.is_favorite(DishId::new(7)).await.unwrap());
    }
}
