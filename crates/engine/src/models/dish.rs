//! Catalog dish record, consumed read-only from the recipe catalog.

use serde::{Deserialize, Serialize};

use daily_dish_core::DishId;

/// A dish as supplied by the recipe catalog.
///
/// The engine never owns or mutates these; they arrive as arguments to
/// personalization operations and only the fields the engine persists
/// (`id`, `name`, `category`, `kind`, `ingredients`) are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    /// Catalog-assigned identifier.
    pub id: DishId,
    /// Dish name.
    pub name: String,
    /// Ingredient names, used for bulk shopping-list adds.
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Catalog category, e.g. `breakfast`.
    pub category: String,
    /// Dish type, e.g. `veg`.
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dish_decodes_catalog_shape() {
        let dish: Dish = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Shakshuka",
            "ingredients": ["eggs", "tomatoes", "olive oil"],
            "category": "breakfast",
            "type": "veg",
        }))
        .unwrap();
        assert_eq!(dish.id, DishId::new(7));
        assert_eq!(dish.kind, "veg");
        assert_eq!(dish.ingredients.len(), 3);
    }
}
