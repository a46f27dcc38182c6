use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    application::repos::RepoError,
    domain::{error::DomainError, products::Price},
};

pub const DEFAULT_CATEGORY: &str = "uncategorized";

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(String),
    #[error("Product not found")]
    NotFound,
    #[error("Product not found: {0}")]
    MissingInBatch(Uuid),
    #[error("Insufficient stock")]
    InsufficientStock,
    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: RepoError,
    },
}

impl ActionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Maps a repository failure, keeping the domain outcomes distinct and
    /// hiding storage detail behind `message`.
    pub fn from_repo(err: RepoError, message: &'static str) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            RepoError::RecordNotFound { id } => Self::MissingInBatch(id),
            RepoError::InsufficientStock => Self::InsufficientStock,
            other => Self::Storage {
                message,
                source: other,
            },
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    pub fn kind(&self) -> ActionErrorKind {
        match self {
            Self::Validation(_) => ActionErrorKind::Validation,
            Self::NotFound | Self::MissingInBatch(_) => ActionErrorKind::NotFound,
            Self::InsufficientStock => ActionErrorKind::Conflict,
            Self::Storage { .. } => ActionErrorKind::Storage,
        }
    }
}

/// Coarse failure class carried alongside a failed [`ActionResult`] so
/// transports can pick a status without parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl From<DomainError> for ActionError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Uniform outcome returned by every mutation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub kind: Option<ActionErrorKind>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: ActionErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl<T> From<Result<T, ActionError>> for ActionResult<T> {
    fn from(result: Result<T, ActionError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failed(err.to_string()).with_kind(err.kind()),
        }
    }
}

/// Numeric field accepted either as a JSON number or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Integer(i64),
    Float(f64),
    Text(String),
    Other(Value),
}

impl NumericInput {
    pub fn to_price(&self) -> Result<Price, DomainError> {
        match self {
            Self::Integer(value) => value
                .checked_mul(100)
                .ok_or_else(|| DomainError::invalid("price", "value is out of range"))
                .and_then(Price::from_cents),
            Self::Float(value) => Price::from_f64(*value),
            Self::Text(text) => Price::parse(text),
            Self::Other(_) => Err(DomainError::invalid("price", "must be a number")),
        }
    }

    pub fn to_integer(&self, field: &'static str) -> Result<i64, DomainError> {
        match self {
            Self::Integer(value) => Ok(*value),
            Self::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                if *value >= i64::MIN as f64 && *value <= i64::MAX as f64 {
                    Ok(*value as i64)
                } else {
                    Err(DomainError::invalid(field, "value is out of range"))
                }
            }
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| DomainError::invalid(field, "must be a whole number")),
            Self::Float(_) | Self::Other(_) => {
                Err(DomainError::invalid(field, "must be a whole number"))
            }
        }
    }
}

impl From<i64> for NumericInput {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<NumericInput>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: Option<NumericInput>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<NumericInput>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: Option<NumericInput>,
}

impl UpdateProductInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.image_url.is_none()
            && self.stock.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceUpdateInput {
    pub id: String,
    pub price: NumericInput,
}

pub fn parse_product_id(raw: &str) -> Result<Uuid, ActionError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ActionError::validation("Invalid product id"))
}
