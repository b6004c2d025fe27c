use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

/// Mean rating over the loaded reviews, recomputed on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub review_count: u32,
}

impl RatingSummary {
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = i16>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0u32), |(sum, count), r| (sum + i64::from(r), count + 1));

        let average_rating = (count > 0).then(|| round_to_tenth(sum as f64 / f64::from(count)));
        Self { average_rating, review_count: count }
    }
}

/// Half away from zero: 4.25 -> 4.3.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Groups `(restaurant_id, rating)` rows into per-restaurant summaries.
pub fn summarize_by_restaurant(rows: &[(Uuid, i16)]) -> HashMap<Uuid, RatingSummary> {
    let mut grouped: HashMap<Uuid, Vec<i16>> = HashMap::new();
    for (restaurant_id, rating) in rows {
        grouped.entry(*restaurant_id).or_default().push(*rating);
    }
    grouped
        .into_iter()
        .map(|(id, ratings)| (id, RatingSummary::from_ratings(ratings)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reviews_means_no_average() {
        let summary = RatingSummary::from_ratings(Vec::new());
        assert_eq!(summary.average_rating, None);
        assert_eq!(summary.review_count, 0);
    }

    #[test]
    fn mean_is_rounded_to_one_decimal() {
        assert_eq!(RatingSummary::from_ratings([5, 4]).average_rating, Some(4.5));
        assert_eq!(RatingSummary::from_ratings([1, 2, 2]).average_rating, Some(1.7));
        assert_eq!(RatingSummary::from_ratings([4, 4, 5, 4]).average_rating, Some(4.3));
        assert_eq!(RatingSummary::from_ratings([3]).average_rating, Some(3.0));
    }

    #[test]
    fn grouping_keeps_restaurants_apart() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let summaries = summarize_by_restaurant(&[(a, 5), (b, 1), (a, 3), (b, 2)]);

        assert_eq!(summaries[&a], RatingSummary { average_rating: Some(4.0), review_count: 2 });
        assert_eq!(summaries[&b], RatingSummary { average_rating: Some(1.5), review_count: 2 });
    }
}
