//! Product records and the field rules every write must satisfy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

const MAX_NAME_LEN: usize = 200;
const MAX_CATEGORY_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 4000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub category: String,
    pub image_url: Option<String>,
    pub stock: i32,
    #[serde(serialize_with = "time::serde::rfc3339::serialize")]
    pub created_at: OffsetDateTime,
    #[serde(serialize_with = "time::serde::rfc3339::serialize")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductList {
    pub items: Vec<Product>,
    pub total: u64,
}

impl ProductList {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.iter().any(|product| product.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStats {
    pub total_products: u64,
    pub total_stock: i64,
    pub out_of_stock: u64,
    pub categories: Vec<CategoryCount>,
}

/// Non-negative amount in minor units, rendered with exactly two decimals.
///
/// Serialized as a numeric string (`"15.00"`) so clients never see float drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);
    /// Largest amount the `NUMERIC(12, 2)` column holds: 9999999999.99.
    pub const MAX_CENTS: i64 = 999_999_999_999;

    pub fn from_cents(cents: i64) -> Result<Self, DomainError> {
        if cents < 0 {
            return Err(DomainError::invalid("price", "must not be negative"));
        }
        if cents > Self::MAX_CENTS {
            return Err(DomainError::invalid("price", "value is out of range"));
        }
        Ok(Self(cents))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::missing("price"));
        }
        if trimmed.starts_with('-') {
            return Err(DomainError::invalid("price", "must not be negative"));
        }

        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        let digits_only = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction)
        {
            return Err(DomainError::invalid(
                "price",
                format!("`{trimmed}` is not a decimal number"),
            ));
        }
        if fraction.len() > 2 {
            return Err(DomainError::invalid(
                "price",
                "must have at most two decimal places",
            ));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| DomainError::invalid("price", "value is out of range"))?
        };
        let fraction_value: i64 = match fraction.len() {
            0 => 0,
            1 => i64::from(fraction.as_bytes()[0] - b'0') * 10,
            _ => fraction
                .parse()
                .map_err(|_| DomainError::invalid("price", "value is out of range"))?,
        };

        whole_value
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction_value))
            .ok_or_else(|| DomainError::invalid("price", "value is out of range"))
            .and_then(Self::from_cents)
    }

    pub fn from_f64(value: f64) -> Result<Self, DomainError> {
        if !value.is_finite() {
            return Err(DomainError::invalid("price", "must be a finite number"));
        }
        if value < 0.0 {
            return Err(DomainError::invalid("price", "must not be negative"));
        }
        let scaled = value * 100.0;
        let cents = scaled.round();
        if (cents - scaled).abs() > 1e-6 {
            return Err(DomainError::invalid(
                "price",
                "must have at most two decimal places",
            ));
        }
        if cents > Self::MAX_CENTS as f64 {
            return Err(DomainError::invalid("price", "value is out of range"));
        }
        Self::from_cents(cents as i64)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Price::parse(&text),
            Repr::Number(value) => Price::from_f64(value),
        }
        .map_err(serde::de::Error::custom)
    }
}

pub fn validate_name(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::missing("name"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::invalid(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Lowercases and hyphenates a category so it can double as a path segment.
pub fn normalize_category(raw: &str) -> Result<String, DomainError> {
    let normalized = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    if normalized.is_empty() {
        return Err(DomainError::missing("category"));
    }
    if normalized.len() > MAX_CATEGORY_LEN {
        return Err(DomainError::invalid(
            "category",
            format!("must be at most {MAX_CATEGORY_LEN} characters"),
        ));
    }
    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(DomainError::invalid(
            "category",
            "may only contain letters, digits, spaces and hyphens",
        ));
    }
    Ok(normalized)
}

pub fn validate_stock(value: i64) -> Result<i32, DomainError> {
    if value < 0 {
        return Err(DomainError::invalid("stock", "must not be negative"));
    }
    i32::try_from(value).map_err(|_| DomainError::invalid("stock", "value is out of range"))
}

pub fn validate_description(raw: Option<&str>) -> Result<Option<String>, DomainError> {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(DomainError::invalid(
            "description",
            format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
        ));
    }
    Ok(Some(text.to_string()))
}

pub fn validate_image_url(raw: Option<&str>) -> Result<Option<String>, DomainError> {
    let Some(url) = raw.map(str::trim).filter(|url| !url.is_empty()) else {
        return Ok(None);
    };
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
        Ok(Some(url.to_string()))
    } else {
        Err(DomainError::invalid(
            "image_url",
            "must be an absolute http(s) URL or a site-relative path",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_parses_common_shapes() {
        assert_eq!(Price::parse("15").unwrap().cents(), 1500);
        assert_eq!(Price::parse("15.0").unwrap().cents(), 1500);
        assert_eq!(Price::parse("19.99").unwrap().cents(), 1999);
        assert_eq!(Price::parse(" .5 ").unwrap().cents(), 50);
        assert_eq!(Price::parse("0").unwrap(), Price::ZERO);
    }

    #[test]
    fn price_rejects_malformed_input() {
        assert_eq!(Price::parse("  "), Err(DomainError::missing("price")));
        assert!(Price::parse("-1").is_err());
        assert!(Price::parse("1.999").is_err());
        assert!(Price::parse("abc").is_err());
        assert!(Price::parse(".").is_err());
        assert!(Price::parse("1.2.3").is_err());
        assert!(Price::parse("99999999999999999999").is_err());
    }

    #[test]
    fn price_is_capped_at_the_stored_precision() {
        let max = Price::parse("9999999999.99").unwrap();
        assert_eq!(max.cents(), Price::MAX_CENTS);
        assert_eq!(max.to_string(), "9999999999.99");
        assert!(Price::parse("10000000000").is_err());
        assert!(Price::parse("99999999999").is_err());
        assert!(Price::from_cents(Price::MAX_CENTS + 1).is_err());
        assert!(Price::from_cents(i64::MAX).is_err());
        assert!(Price::from_f64(1e11).is_err());
        assert_eq!(Price::from_f64(9_999_999_999.0).unwrap().cents(), 999_999_999_900);
    }

    #[test]
    fn price_from_float_tolerates_binary_representation() {
        assert_eq!(Price::from_f64(19.99).unwrap().cents(), 1999);
        assert_eq!(Price::from_f64(10.0).unwrap().cents(), 1000);
        assert!(Price::from_f64(0.001).is_err());
        assert!(Price::from_f64(f64::NAN).is_err());
        assert!(Price::from_f64(-3.0).is_err());
    }

    #[test]
    fn price_displays_two_decimals_and_serializes_as_string() {
        let price = Price::parse("15").unwrap();
        assert_eq!(price.to_string(), "15.00");
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"15.00\"");

        let decoded: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(decoded.to_string(), "12.50");
    }

    #[test]
    fn category_is_normalized_to_a_path_segment() {
        assert_eq!(normalize_category("  Fish Oil ").unwrap(), "fish-oil");
        assert_eq!(normalize_category("vitamins").unwrap(), "vitamins");
        assert!(normalize_category("").is_err());
        assert!(normalize_category("a/b").is_err());
    }

    #[test]
    fn stock_must_fit_and_be_non_negative() {
        assert_eq!(validate_stock(5).unwrap(), 5);
        assert!(validate_stock(-1).is_err());
        assert!(validate_stock(i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn optional_text_fields_collapse_blank_values() {
        assert_eq!(validate_description(Some("   ")).unwrap(), None);
        assert_eq!(validate_image_url(None).unwrap(), None);
        assert_eq!(
            validate_image_url(Some("/img/omega.png")).unwrap().as_deref(),
            Some("/img/omega.png")
        );
        assert!(validate_image_url(Some("ftp://x")).is_err());
    }
}
