mod commands;
mod service;
pub mod types;

pub use service::*;
pub use types::{
    ActionError, ActionErrorKind, ActionResult, CreateProductInput, DEFAULT_CATEGORY, NumericInput,
    PriceUpdateInput, UpdateProductInput, parse_product_id,
};
