//! Dish rating types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Rating`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingError {
    /// The value is outside the 1-5 star range.
    #[error("rating must be between {min} and {max} stars, got {value}")]
    OutOfRange {
        /// Rejected input value.
        value: u8,
        /// Lowest accepted rating.
        min: u8,
        /// Highest accepted rating.
        max: u8,
    },
}

/// A star rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Lowest accepted rating.
    pub const MIN: u8 = 1;
    /// Highest accepted rating.
    pub const MAX: u8 = 5;

    /// Construct a rating, rejecting values outside 1-5.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::OutOfRange`] for 0 or anything above 5.
    pub const fn new(value: u8) -> Result<Self, RatingError> {
        if value >= Self::MIN && value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(RatingError::OutOfRange {
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    /// Get the star count.
    #[must_use]
    pub const fn stars(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// Aggregated rating for a dish.
///
/// `average` is rounded to one decimal place; a dish with no ratings
/// reports `{ average: 0.0, count: 0 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DishRating {
    /// Mean star rating, rounded to one decimal.
    pub average: f64,
    /// Number of ratings aggregated.
    pub count: usize,
}

impl DishRating {
    /// The empty aggregate.
    pub const NONE: Self = Self {
        average: 0.0,
        count: 0,
    };

    /// Aggregate a set of ratings.
    #[must_use]
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = Rating>,
    {
        let mut sum: u32 = 0;
        let mut count: usize = 0;
        for rating in ratings {
            sum += u32::from(rating.stars());
            count += 1;
        }

        if count == 0 {
            return Self::NONE;
        }

        #[allow(clippy::cast_precision_loss)] // rating sums stay far below f64 precision
        let average = (f64::from(sum) / count as f64 * 10.0).round() / 10.0;
        Self { average, count }
    }
}

impl Default for DishRating {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_accepts_1_through_5() {
        for value in 1..=5 {
            assert!(Rating::new(value).is_ok());
        }
    }

    #[test]
    fn test_rating_rejects_out_of_range() {
        assert!(matches!(
            Rating::new(0),
            Err(RatingError::OutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            Rating::new(6),
            Err(RatingError::OutOfRange { value: 6, .. })
        ));
    }

    #[test]
    fn test_rating_serde_rejects_invalid() {
        let rating: Rating = serde_json::from_str("4").unwrap();
        assert_eq!(rating.stars(), 4);
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn test_aggregate_five_four_three() {
        let ratings = [5, 4, 3].map(|v| Rating::new(v).unwrap());
        let agg = DishRating::from_ratings(ratings);
        assert!((agg.average - 4.0).abs() < f64::EPSILON);
        assert_eq!(agg.count, 3);
    }

    #[test]
    fn test_aggregate_rounds_to_one_decimal() {
        // 5 + 4 = 9, 9 / 2 = 4.5; 5 + 4 + 4 = 13, 13 / 3 = 4.333... -> 4.3
        let ratings = [5, 4, 4].map(|v| Rating::new(v).unwrap());
        let agg = DishRating::from_ratings(ratings);
        assert!((agg.average - 4.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        let agg = DishRating::from_ratings(std::iter::empty());
        assert_eq!(agg, DishRating::NONE);
        assert_eq!(agg.count, 0);
        assert!((agg.average - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rating_display() {
        assert_eq!(Rating::new(4).unwrap().to_string(), "4/5");
    }
}
