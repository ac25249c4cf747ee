//! Personalization collection entries: favorites, shopping list, reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use daily_dish_core::{DishId, Email, Rating};

/// A favorited dish.
///
/// Favorites have set semantics keyed by `dish_id`; insertion order is
/// preserved for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    /// The favorited dish.
    pub dish_id: DishId,
    /// Dish name at the time it was favorited.
    pub name: String,
    /// When the favorite was added.
    pub added_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new shopping list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShoppingItem {
    /// Item name; also the dedup key after trimming and case folding.
    pub name: String,
    /// Display category, e.g. `Shopping Item`.
    pub category: String,
}

impl NewShoppingItem {
    /// Convenience constructor for a plain ingredient.
    #[must_use]
    pub fn ingredient(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: "Shopping Item".to_string(),
        }
    }
}

/// A shopping list entry.
///
/// Uniqueness is by case-insensitive trimmed *name*, not by `id`: two
/// dishes contributing the same ingredient name collapse to one entry on
/// the deduplicating add path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    /// Entry identifier; unique per entry, not the dedup key.
    pub id: Uuid,
    /// Item name.
    pub name: String,
    /// Display category.
    pub category: String,
    /// When the entry was added.
    pub added_at: DateTime<Utc>,
    /// Planned quantity.
    pub quantity: u32,
    /// Whether the item was checked off.
    pub purchased: bool,
}

impl ShoppingListItem {
    /// Build a fresh entry from caller-supplied fields.
    #[must_use]
    pub fn new(item: NewShoppingItem, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: item.name,
            category: item.category,
            added_at: now,
            quantity: 1,
            purchased: false,
        }
    }

    /// The dedup key: trimmed, case-folded name.
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalized_name(&self.name)
    }
}

/// Trimmed, lowercased form of an item name, the shopping list dedup key.
#[must_use]
pub fn normalized_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A dish review.
///
/// Append-only; the same account may review a dish more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// The reviewed dish.
    pub dish_id: DishId,
    /// Star rating.
    pub rating: Rating,
    /// Free-text comment, never empty.
    pub comment: String,
    /// Display name of the reviewer.
    pub author_name: String,
    /// Reviewer email, taken from the session.
    pub author_email: Email,
    /// When the review was submitted.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_name() {
        assert_eq!(normalized_name("  Olive Oil "), "olive oil");
        assert_eq!(normalized_name("EGGS"), "eggs");
    }

    #[test]
    fn test_new_item_defaults() {
        let now = Utc::now();
        let item = ShoppingListItem::new(NewShoppingItem::ingredient("Eggs"), now);
        assert_eq!(item.quantity, 1);
        assert!(!item.purchased);
        assert_eq!(item.added_at, now);
        assert_eq!(item.normalized_name(), "eggs");
    }

    #[test]
    fn test_distinct_ids_for_same_name() {
        let now = Utc::now();
        let a = ShoppingListItem::new(NewShoppingItem::ingredient("Eggs"), now);
        let b = ShoppingListItem::new(NewShoppingItem::ingredient("Eggs"), now);
        assert_ne!(a.id, b.id);
    }
}
