use serde::Deserialize;

use crate::application::products::{NumericInput, PriceUpdateInput};

pub const DEFAULT_INVALIDATION_LIMIT: usize = 50;
pub const MAX_INVALIDATION_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustmentRequest {
    pub delta: NumericInput,
}

#[derive(Debug, Deserialize)]
pub struct PriceBatchRequest {
    pub updates: Vec<PriceUpdateInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvalidationQuery {
    pub limit: Option<usize>,
}

impl InvalidationQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_INVALIDATION_LIMIT)
            .clamp(1, MAX_INVALIDATION_LIMIT)
    }
}
