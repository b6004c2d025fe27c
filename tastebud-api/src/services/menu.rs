use serde::Serialize;

use tastebud_shared::errors::{AppError, ErrorCode};

use crate::models::MenuItem;

pub const MAX_NAME_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_CATEGORY_CHARS: usize = 60;
pub const MAX_PRICE_CENTS: i64 = 10_000_000;

/// Menu item fields that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidMenuItem {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i32,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItemView {
    #[serde(flatten)]
    pub item: MenuItem,
    pub price: String,
}

impl From<MenuItem> for MenuItemView {
    fn from(item: MenuItem) -> Self {
        let price = format_price(item.price_cents);
        Self { item, price }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuCategory {
    pub category: String,
    pub items: Vec<MenuItemView>,
}

fn required(field: &str, value: Option<&str>, max_chars: usize) -> Result<String, AppError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, format!("{field} is required")));
    }
    if value.chars().count() > max_chars {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("{field} must be at most {max_chars} characters"),
        ));
    }
    Ok(value.to_string())
}

pub fn validate_item(
    name: Option<&str>,
    description: Option<&str>,
    price: Option<&str>,
    category: Option<&str>,
) -> Result<ValidMenuItem, AppError> {
    let name = required("name", name, MAX_NAME_CHARS)?;
    let category = required("category", category, MAX_CATEGORY_CHARS)?;

    let description = description.map(str::trim).filter(|d| !d.is_empty());
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS) {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("description must be at most {MAX_DESCRIPTION_CHARS} characters"),
        ));
    }

    let price = price.ok_or_else(|| AppError::new(ErrorCode::InvalidPrice, "price is required"))?;

    Ok(ValidMenuItem {
        name,
        description: description.map(str::to_string),
        price_cents: parse_price(price)?,
        category,
    })
}

/// Parses a decimal amount such as `12`, `12.5` or `0.99` into cents. Must be positive.
pub fn parse_price(raw: &str) -> Result<i32, AppError> {
    let invalid = || AppError::new(ErrorCode::InvalidPrice, "price must be a positive amount with at most two decimals");

    let raw = raw.trim();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty())
        || fraction.len() > 2
        || !all_digits(whole)
        || !all_digits(fraction)
        || (raw.contains('.') && fraction.is_empty())
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    let cents = whole.checked_mul(100).and_then(|c| c.checked_add(fraction)).ok_or_else(invalid)?;
    if cents <= 0 {
        return Err(invalid());
    }
    if cents > MAX_PRICE_CENTS {
        return Err(AppError::new(ErrorCode::InvalidPrice, "price is too large"));
    }
    i32::try_from(cents).map_err(|_| invalid())
}

pub fn format_price(cents: i32) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Groups items by category (case-insensitive), categories then names in order.
pub fn group_by_category(mut items: Vec<MenuItem>) -> Vec<MenuCategory> {
    items.sort_by_cached_key(|i| (i.category.trim().to_lowercase(), i.name.to_lowercase()));

    let mut groups: Vec<MenuCategory> = Vec::new();
    for item in items {
        match groups.last_mut() {
            Some(group) if group.category.to_lowercase() == item.category.trim().to_lowercase() => {
                group.items.push(MenuItemView::from(item));
            }
            _ => groups.push(MenuCategory {
                category: item.category.trim().to_string(),
                items: vec![MenuItemView::from(item)],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn item(name: &str, category: &str, price_cents: i32) -> MenuItem {
        MenuItem {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::nil(),
            created_by: Uuid::nil(),
            name: name.into(),
            description: None,
            price_cents,
            category: category.into(),
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn prices_parse_to_cents() {
        assert_eq!(parse_price("12").unwrap(), 1200);
        assert_eq!(parse_price(" 12.5 ").unwrap(), 1250);
        assert_eq!(parse_price("0.99").unwrap(), 99);
        assert_eq!(parse_price(".5").unwrap(), 50);
    }

    #[test]
    fn non_positive_or_malformed_prices_are_rejected() {
        for raw in ["0", "0.00", "-3", "abc", "", "1.234", "12.", "1e3", "1,50", "99999999999999999999"] {
            let err = parse_price(raw).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::InvalidPrice, "{raw:?}");
        }
    }

    #[test]
    fn price_above_the_ceiling_is_rejected() {
        assert!(parse_price("100000").is_ok());
        assert!(parse_price("100000.01").is_err());
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(1250), "12.50");
        assert_eq!(format_price(7), "0.07");
    }

    #[test]
    fn item_requires_name_price_and_category() {
        let err = validate_item(Some("  "), None, Some("4"), Some("Mains")).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);

        let err = validate_item(Some("Pho"), None, None, Some("Mains")).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidPrice);

        let err = validate_item(Some("Pho"), None, Some("4"), None).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn valid_item_is_trimmed_and_blank_description_dropped() {
        let valid = validate_item(Some(" Pho "), Some("   "), Some("11.5"), Some(" Soups ")).unwrap();
        assert_eq!(
            valid,
            ValidMenuItem { name: "Pho".into(), description: None, price_cents: 1150, category: "Soups".into() }
        );
    }

    #[test]
    fn overlong_description_is_rejected() {
        let long = "d".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(validate_item(Some("Pho"), Some(&long), Some("4"), Some("Soups")).is_err());
    }

    #[test]
    fn items_are_grouped_by_category_then_sorted_by_name() {
        let groups = group_by_category(vec![
            item("Tiramisu", "Desserts", 700),
            item("Lasagna", "Mains", 1600),
            item("Arancini", "mains", 900),
            item("Gelato", "Desserts", 500),
        ]);

        let layout: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|g| (g.category.as_str(), g.items.iter().map(|i| i.item.name.as_str()).collect()))
            .collect();
        assert_eq!(layout, vec![("Desserts", vec!["Gelato", "Tiramisu"]), ("mains", vec!["Arancini", "Lasagna"])]);
        assert_eq!(groups[1].items[1].price, "16.00");
    }
}
