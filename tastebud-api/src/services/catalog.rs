use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Restaurant;

use super::rating::RatingSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Rating,
    Newest,
    Name,
    PriceLow,
    PriceHigh,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestaurantFilter {
    pub q: Option<String>,
    pub cuisine: Option<String>,
    /// 1 (`$`) through 4 (`$$$$`).
    pub price_range: Option<i16>,
    #[serde(default)]
    pub sort: SortOrder,
}

/// A restaurant with its read-time aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantCard {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub price_label: String,
    #[serde(flatten)]
    pub rating: RatingSummary,
    pub like_count: i64,
    pub liked_by_me: bool,
}

impl RestaurantCard {
    pub fn new(restaurant: Restaurant, rating: RatingSummary, like_count: i64, liked_by_me: bool) -> Self {
        let price_label = price_label(restaurant.price_range);
        Self { restaurant, price_label, rating, like_count, liked_by_me }
    }
}

/// `$` through `$$$$`; out-of-range values are clamped.
pub fn price_label(price_range: i16) -> String {
    "$".repeat(price_range.clamp(1, 4) as usize)
}

/// Case-insensitive substring match; a blank query matches everything.
pub fn name_matches(name: &str, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || name.to_lowercase().contains(&query.to_lowercase())
}

/// Comparison key for cuisines, so "Mexican", " mexican " and "MEXICAN" agree.
pub fn cuisine_key(cuisine: &str) -> String {
    cuisine.trim().to_lowercase()
}

fn cuisine_matches(cuisine: &str, wanted: Option<&str>) -> bool {
    match wanted.map(cuisine_key).filter(|w| !w.is_empty()) {
        Some(w) => cuisine_key(cuisine) == w,
        None => true,
    }
}

/// Filters and orders cards for the explore page.
pub fn apply(filter: &RestaurantFilter, cards: Vec<RestaurantCard>) -> Vec<RestaurantCard> {
    let query = filter.q.as_deref().unwrap_or_default();
    let mut cards: Vec<RestaurantCard> = cards
        .into_iter()
        .filter(|c| name_matches(&c.restaurant.name, query))
        .filter(|c| cuisine_matches(&c.restaurant.cuisine, filter.cuisine.as_deref()))
        .filter(|c| filter.price_range.map_or(true, |p| c.restaurant.price_range == p))
        .collect();

    cards.sort_by(|a, b| compare(filter.sort, a, b));
    cards
}

fn compare(sort: SortOrder, a: &RestaurantCard, b: &RestaurantCard) -> Ordering {
    let by_name = || a.restaurant.name.to_lowercase().cmp(&b.restaurant.name.to_lowercase());
    match sort {
        // Unrated restaurants sort after every rated one.
        SortOrder::Rating => match (a.rating.average_rating, b.rating.average_rating) {
            (Some(x), Some(y)) => y
                .partial_cmp(&x)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.rating.review_count.cmp(&a.rating.review_count))
                .then_with(by_name),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => by_name(),
        },
        SortOrder::Newest => b.restaurant.created_at.cmp(&a.restaurant.created_at).then_with(by_name),
        SortOrder::Name => by_name(),
        SortOrder::PriceLow => a.restaurant.price_range.cmp(&b.restaurant.price_range).then_with(by_name),
        SortOrder::PriceHigh => b.restaurant.price_range.cmp(&a.restaurant.price_range).then_with(by_name),
    }
}

/// One entry per cuisine regardless of case, ordered by that key. Where spellings
/// differ the lexically smallest wins, so "Mexican" beats "mexican".
pub fn distinct_cuisines<'a, I>(cuisines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut by_key: BTreeMap<String, &str> = BTreeMap::new();
    for cuisine in cuisines.into_iter().map(str::trim).filter(|c| !c.is_empty()) {
        by_key
            .entry(cuisine_key(cuisine))
            .and_modify(|kept| {
                if cuisine < *kept {
                    *kept = cuisine;
                }
            })
            .or_insert(cuisine);
    }
    by_key.into_values().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn card(name: &str, cuisine: &str, price: i16, avg: Option<f64>, age_days: i64) -> RestaurantCard {
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            name: name.into(),
            cuisine: cuisine.into(),
            address: "1 Main St".into(),
            image_url: None,
            price_range: price,
            created_at: Utc::now() - Duration::days(age_days),
        };
        let rating = RatingSummary { average_rating: avg, review_count: u32::from(avg.is_some()) };
        RestaurantCard::new(restaurant, rating, 0, false)
    }

    fn names(cards: &[RestaurantCard]) -> Vec<&str> {
        cards.iter().map(|c| c.restaurant.name.as_str()).collect()
    }

    fn sample() -> Vec<RestaurantCard> {
        vec![
            card("Taco Loco", "Mexican", 1, Some(4.2), 3),
            card("Sushi Zen", "Japanese", 4, Some(4.8), 10),
            card("La Taqueria", "mexican", 2, None, 1),
            card("Burger Barn", "American", 2, Some(3.1), 30),
        ]
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        assert!(name_matches("Taco Loco", "TACO"));
        assert!(name_matches("La Taqueria", "taq"));
        assert!(name_matches("Sushi Zen", "  "));
        assert!(!name_matches("Sushi Zen", "taco"));
    }

    #[test]
    fn filter_by_query() {
        let filter = RestaurantFilter { q: Some("ta".into()), ..Default::default() };
        let result = apply(&filter, sample());
        assert_eq!(names(&result), vec!["Taco Loco", "La Taqueria"]);
    }

    #[test]
    fn filter_by_cuisine_ignores_case() {
        let filter = RestaurantFilter {
            cuisine: Some("MEXICAN".into()),
            sort: SortOrder::Name,
            ..Default::default()
        };
        assert_eq!(names(&apply(&filter, sample())), vec!["La Taqueria", "Taco Loco"]);
    }

    #[test]
    fn filter_by_price_range() {
        let filter = RestaurantFilter { price_range: Some(2), sort: SortOrder::Name, ..Default::default() };
        assert_eq!(names(&apply(&filter, sample())), vec!["Burger Barn", "La Taqueria"]);

        let none = RestaurantFilter { price_range: Some(3), ..Default::default() };
        assert!(apply(&none, sample()).is_empty());
    }

    #[test]
    fn price_range_deserializes() {
        let filter: RestaurantFilter = serde_json::from_value(serde_json::json!({ "price_range": 4 })).unwrap();
        assert_eq!(filter.price_range, Some(4));
    }

    #[test]
    fn cuisine_filter_handles_non_ascii_case() {
        let mut cards = sample();
        cards.push(card("Café Ängel", "Österreichisch", 3, None, 2));
        let filter = RestaurantFilter { cuisine: Some("österreichisch".into()), ..Default::default() };
        assert_eq!(names(&apply(&filter, cards)), vec!["Café Ängel"]);
    }

    #[test]
    fn rating_sort_puts_unrated_last() {
        let result = apply(&RestaurantFilter::default(), sample());
        assert_eq!(names(&result), vec!["Sushi Zen", "Taco Loco", "Burger Barn", "La Taqueria"]);
    }

    #[test]
    fn newest_and_price_sorts() {
        let newest = RestaurantFilter { sort: SortOrder::Newest, ..Default::default() };
        assert_eq!(names(&apply(&newest, sample()))[0], "La Taqueria");

        let cheap = RestaurantFilter { sort: SortOrder::PriceLow, ..Default::default() };
        assert_eq!(names(&apply(&cheap, sample())), vec!["Taco Loco", "Burger Barn", "La Taqueria", "Sushi Zen"]);

        let pricey = RestaurantFilter { sort: SortOrder::PriceHigh, ..Default::default() };
        assert_eq!(names(&apply(&pricey, sample()))[0], "Sushi Zen");
    }

    #[test]
    fn sort_order_parses_from_query_values() {
        let filter: RestaurantFilter = serde_json::from_value(serde_json::json!({ "sort": "price_high" })).unwrap();
        assert_eq!(filter.sort, SortOrder::PriceHigh);
    }

    #[test]
    fn price_labels() {
        assert_eq!(price_label(1), "$");
        assert_eq!(price_label(4), "$$$$");
        assert_eq!(price_label(9), "$$$$");
    }

    #[test]
    fn cuisines_are_deduplicated_and_sorted() {
        assert_eq!(
            distinct_cuisines(["Thai", "Italian", " Thai ", ""]),
            vec!["Italian".to_string(), "Thai".to_string()]
        );
    }

    #[test]
    fn cuisines_differing_only_in_case_collapse() {
        assert_eq!(
            distinct_cuisines(["mexican", "Mexican", "ÉTHIOPIEN", "éthiopien"]),
            vec!["Mexican".to_string(), "ÉTHIOPIEN".to_string()]
        );
    }
}
