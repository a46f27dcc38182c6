use std::collections::HashSet;
use std::time::Instant;

use metrics::histogram;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::report::{ErrorContext, Severity};
use crate::application::repos::{CreateProductParams, PriceChange, UpdateProductParams};
use crate::cache::{InvalidationPlan, ProductChange};
use crate::domain::error::DomainError;
use crate::domain::products::{
    Product, normalize_category, validate_description, validate_image_url, validate_name,
    validate_stock,
};

use super::service::ProductActions;
use super::types::{
    ActionError, ActionResult, CreateProductInput, DEFAULT_CATEGORY, NumericInput,
    PriceUpdateInput, UpdateProductInput, parse_product_id,
};

const METRIC_ACTION_MS: &str = "storefront_action_ms";

impl ProductActions {
    #[instrument(skip(self, input))]
    pub async fn create_product(&self, input: CreateProductInput) -> ActionResult<Product> {
        let started = Instant::now();
        let result = self.try_create_product(input).await;
        self.finish("actions::create_product", started, result, Value::Null)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: &str,
        input: UpdateProductInput,
    ) -> ActionResult<Product> {
        let started = Instant::now();
        let result = self.try_update_product(id, input).await;
        self.finish("actions::update_product", started, result, json!({ "id": id }))
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str) -> ActionResult<Product> {
        let started = Instant::now();
        let result = self.try_delete_product(id).await;
        self.finish("actions::delete_product", started, result, json!({ "id": id }))
    }

    /// Adds `delta` to the product's stock, refusing any change that would
    /// leave it negative. The delta may arrive as a number or a numeric string.
    #[instrument(skip(self, delta))]
    pub async fn update_product_stock(
        &self,
        id: &str,
        delta: impl Into<NumericInput>,
    ) -> ActionResult<Product> {
        let started = Instant::now();
        let delta = delta.into();
        let result = self.try_update_product_stock(id, &delta).await;
        self.finish(
            "actions::update_product_stock",
            started,
            result,
            json!({ "id": id, "delta": delta }),
        )
    }

    /// Records a request that never reached an action, e.g. an undecodable
    /// body, the same way a failed action is recorded.
    pub fn reject<T>(&self, endpoint: &'static str, message: impl Into<String>) -> ActionResult<T> {
        self.finish(
            endpoint,
            Instant::now(),
            Err(ActionError::validation(message)),
            Value::Null,
        )
    }

    /// Applies every price change or none. The first failing item aborts the
    /// batch and nothing is invalidated.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn bulk_update_prices(
        &self,
        updates: Vec<PriceUpdateInput>,
    ) -> ActionResult<Vec<Product>> {
        let started = Instant::now();
        let ids: Vec<String> = updates.iter().map(|update| update.id.clone()).collect();
        let result = self.try_bulk_update_prices(updates).await;
        self.finish(
            "actions::bulk_update_prices",
            started,
            result,
            json!({ "ids": ids }),
        )
    }

    async fn try_create_product(&self, input: CreateProductInput) -> Result<Product, ActionError> {
        let name = validate_name(input.name.as_deref().unwrap_or_default())?;
        let price = input
            .price
            .as_ref()
            .ok_or_else(|| DomainError::missing("price"))?
            .to_price()?;
        let category = normalize_category(
            input
                .category
                .as_deref()
                .filter(|category| !category.trim().is_empty())
                .unwrap_or(DEFAULT_CATEGORY),
        )?;
        let stock = match &input.stock {
            Some(stock) => validate_stock(stock.to_integer("stock")?)?,
            None => 0,
        };

        let params = CreateProductParams {
            name,
            description: validate_description(input.description.as_deref())?,
            price,
            category,
            image_url: validate_image_url(input.image_url.as_deref())?,
            stock,
        };

        let product = self
            .writer
            .create_product(params)
            .await
            .map_err(|err| ActionError::from_repo(err, "Failed to create product"))?;

        self.invalidate(ProductChange::Created {
            id: product.id,
            category: product.category.clone(),
        });
        Ok(product)
    }

    async fn try_update_product(
        &self,
        id: &str,
        input: UpdateProductInput,
    ) -> Result<Product, ActionError> {
        let id = parse_product_id(id)?;
        if input.is_empty() {
            return Err(ActionError::validation("No fields to update"));
        }

        let params = UpdateProductParams {
            id,
            name: input.name.as_deref().map(validate_name).transpose()?,
            description: validate_description(input.description.as_deref())?,
            price: input
                .price
                .as_ref()
                .map(|price| price.to_price())
                .transpose()?,
            category: input
                .category
                .as_deref()
                .map(normalize_category)
                .transpose()?,
            image_url: validate_image_url(input.image_url.as_deref())?,
            stock: input
                .stock
                .as_ref()
                .map(|stock| stock.to_integer("stock").and_then(validate_stock))
                .transpose()?,
        };

        let updated = self
            .writer
            .update_product(params)
            .await
            .map_err(|err| ActionError::from_repo(err, "Failed to update product"))?;

        self.invalidate(ProductChange::Updated {
            id,
            category: updated.product.category.clone(),
            previous_category: updated.previous_category,
        });
        Ok(updated.product)
    }

    async fn try_delete_product(&self, id: &str) -> Result<Product, ActionError> {
        let id = parse_product_id(id)?;
        let product = self
            .writer
            .delete_product(id)
            .await
            .map_err(|err| ActionError::from_repo(err, "Failed to delete product"))?;

        self.invalidate(ProductChange::Deleted {
            id,
            category: product.category.clone(),
        });
        Ok(product)
    }

    async fn try_update_product_stock(
        &self,
        id: &str,
        delta: &NumericInput,
    ) -> Result<Product, ActionError> {
        let id = parse_product_id(id)?;
        let delta = i32::try_from(delta.to_integer("delta")?)
            .map_err(|_| DomainError::invalid("delta", "value is out of range"))?;

        let product = self
            .writer
            .adjust_stock(id, delta)
            .await
            .map_err(|err| ActionError::from_repo(err, "Failed to update stock"))?;

        self.invalidate(ProductChange::StockAdjusted {
            id,
            category: product.category.clone(),
        });
        Ok(product)
    }

    async fn try_bulk_update_prices(
        &self,
        updates: Vec<PriceUpdateInput>,
    ) -> Result<Vec<Product>, ActionError> {
        if updates.is_empty() {
            return Err(ActionError::validation("No price updates provided"));
        }

        let mut seen = HashSet::with_capacity(updates.len());
        let mut changes = Vec::with_capacity(updates.len());
        for update in &updates {
            let id = Uuid::parse_str(update.id.trim()).map_err(|_| {
                ActionError::validation(format!("Invalid product id: {}", update.id))
            })?;
            if !seen.insert(id) {
                return Err(ActionError::validation(format!(
                    "Duplicate product id in batch: {id}"
                )));
            }
            changes.push(PriceChange {
                id,
                price: update.price.to_price()?,
            });
        }

        let products = self
            .writer
            .update_prices(&changes)
            .await
            .map_err(|err| ActionError::from_repo(err, "Failed to update prices"))?;

        self.invalidate(ProductChange::PricesUpdated {
            items: products
                .iter()
                .map(|product| (product.id, product.category.clone()))
                .collect(),
        });
        Ok(products)
    }

    fn invalidate(&self, change: ProductChange) {
        debug!(change = ?change, "Applying invalidation for committed write");
        self.invalidator
            .apply(&InvalidationPlan::for_change(&change));
    }

    fn finish<T>(
        &self,
        endpoint: &'static str,
        started: Instant,
        result: Result<T, ActionError>,
        extra: Value,
    ) -> ActionResult<T> {
        let outcome = if result.is_ok() { "success" } else { "failure" };
        histogram!(METRIC_ACTION_MS, "action" => endpoint, "outcome" => outcome)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        if let Err(err) = &result {
            let severity = if err.is_storage() {
                Severity::Error
            } else {
                Severity::Warning
            };
            self.sink.report(
                err,
                &ErrorContext::new(endpoint)
                    .with_severity(severity)
                    .with_extra(extra),
            );
        }

        result.into()
    }
}
