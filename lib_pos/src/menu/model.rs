//! # Menu Data Model
//!
//! Strongly-typed representation of a menu row as served either by the
//! custom HTTP endpoint (`price_cents` + `currency`, free-form category) or by
//! the hosted `menus` table (float `price`, closed category set).
//!
//! Both shapes decode into the same [`MenuItem`] through an intermediate raw
//! record so the rest of the crate never sees the difference.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cart::Money;

/// Currency assumed when a row carries none.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Menu section. The five named sections are the ones the kitchen uses;
/// anything else the HTTP endpoint sends is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Mains,
    Sushi,
    Donburi,
    Sides,
    Drinks,
    Other(String),
}

impl Category {
    /// The named sections, in menu-tab order.
    pub const KNOWN: [Category; 5] = [
        Category::Mains,
        Category::Sushi,
        Category::Donburi,
        Category::Sides,
        Category::Drinks,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::Mains => "Mains",
            Category::Sushi => "Sushi",
            Category::Donburi => "Donburi",
            Category::Sides => "Sides",
            Category::Drinks => "Drinks",
            Category::Other(name) => name,
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        Category::KNOWN
            .iter()
            .find(|known| known.as_str().eq_ignore_ascii_case(trimmed))
            .cloned()
            .unwrap_or_else(|| Category::Other(trimmed.to_string()))
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from(value.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Category {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::from(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchasable menu item. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMenuItem")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "price_cents")]
    pub price: Money,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_available: bool,
}

impl MenuItem {
    /// An available item with the default currency and no category.
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            price,
            currency: DEFAULT_CURRENCY.to_string(),
            category: None,
            image_url: None,
            is_available: true,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ids arrive as strings from the HTTP endpoint and sometimes as numbers
/// from the database.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Deserialize)]
struct RawMenuItem {
    id: RawId,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    price_cents: Option<i64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    is_available: Option<bool>,
}

impl TryFrom<RawMenuItem> for MenuItem {
    type Error = String;

    fn try_from(raw: RawMenuItem) -> Result<Self, Self::Error> {
        let id = match raw.id {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        };
        if id.is_empty() {
            return Err("menu item id is empty".to_string());
        }

        // integer minor units win over the float column
        let price = match (raw.price_cents, raw.price) {
            (Some(cents), _) => Money::from_cents(cents),
            (None, Some(major)) if major.is_finite() => Money::from_major(major),
            _ => return Err(format!("menu item {} has no usable price", id)),
        };

        Ok(MenuItem {
            id,
            name: raw.name,
            description: raw.description,
            price,
            currency: raw
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            category: raw
                .category
                .filter(|c| !c.trim().is_empty())
                .map(Category::from),
            image_url: raw.image_url,
            is_available: raw.is_available.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn http_shape_decodes_with_default_currency() {
        let item: MenuItem = serde_json::from_value(json!({
            "id": "1", "name": "Udon", "price_cents": 1200
        }))
        .unwrap();
        assert_eq!(item.price, Money::from_cents(1200));
        assert_eq!(item.currency, "USD");
        assert_eq!(item.category, None);
        assert!(item.is_available);
    }

    #[test]
    fn table_shape_decodes_float_price_and_category() {
        let item: MenuItem = serde_json::from_value(json!({
            "id": 42, "name": "Salmon Nigiri", "price": 6.5,
            "category": "sushi", "image_url": null, "is_available": true,
            "created_at": "2025-09-01T00:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(item.id, "42");
        assert_eq!(item.price.cents(), 650);
        assert_eq!(item.category, Some(Category::Sushi));
    }

    #[test]
    fn free_form_category_is_kept() {
        let item: MenuItem = serde_json::from_value(json!({
            "id": "d1", "name": "Mochi", "price_cents": 400, "category": "Dessert", "currency": "AUD"
        }))
        .unwrap();
        assert_eq!(item.category, Some(Category::Other("Dessert".into())));
        assert_eq!(item.currency, "AUD");
    }

    #[test]
    fn missing_price_is_rejected() {
        let res = serde_json::from_value::<MenuItem>(json!({"id": "x", "name": "Mystery"}));
        assert!(res.is_err());
    }

    #[test]
    fn serialized_form_decodes_back() {
        let item = MenuItem::new("7", "Katsu Don", Money::from_cents(1650)).with_category(Category::Donburi);
        let text = serde_json::to_string(&item).unwrap();
        assert!(text.contains("\"price_cents\":1650"));
        let back: MenuItem = serde_json::from_str(&text).unwrap();
        assert_eq!(back, item);
    }
}
