use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateProductParams, PriceChange, ProductQuery, ProductsRepo, ProductsWriteRepo, RepoError,
    UpdateProductParams, UpdatedProduct,
};
use crate::domain::products::{CategoryCount, Price, Product, ProductList, ProductStats};

use super::PostgresRepositories;
use super::util::{convert_count, map_sqlx_error};

const PRODUCT_COLUMNS: &str = "id, name, description, price::text AS price, category, \
     image_url, stock, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) price: String,
    pub(crate) category: String,
    pub(crate) image_url: Option<String>,
    pub(crate) stock: i32,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepoError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Price::parse(&row.price).map_err(RepoError::from_persistence)?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price,
            category: row.category,
            image_url: row.image_url,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UpdatedProductRow {
    #[sqlx(flatten)]
    product: ProductRow,
    previous_category: String,
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepoError> {
    rows.into_iter().map(Product::try_from).collect()
}

#[async_trait]
impl ProductsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductList, RepoError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1::text IS NULL OR category = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(query.category.as_deref())
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM products WHERE ($1::text IS NULL OR category = $1)",
        )
        .bind(query.category.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ProductList {
            items: into_products(rows)?,
            total: convert_count(total)?,
        })
    }

    async fn product_stats(&self) -> Result<ProductStats, RepoError> {
        let (total_products, total_stock, out_of_stock): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*)::bigint,
                   COALESCE(SUM(stock), 0)::bigint,
                   (COUNT(*) FILTER (WHERE stock = 0))::bigint
            FROM products
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let categories: Vec<(String, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*)::bigint FROM products GROUP BY category ORDER BY category",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ProductStats {
            total_products: convert_count(total_products)?,
            total_stock,
            out_of_stock: convert_count(out_of_stock)?,
            categories: categories
                .into_iter()
                .map(|(category, count)| {
                    convert_count(count).map(|count| CategoryCount { category, count })
                })
                .collect::<Result<_, _>>()?,
        })
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ProductsWriteRepo for PostgresRepositories {
    async fn create_product(&self, params: CreateProductParams) -> Result<Product, RepoError> {
        let CreateProductParams {
            name,
            description,
            price,
            category,
            image_url,
            stock,
        } = params;

        let sql = format!(
            "INSERT INTO products \
                 (id, name, description, price, category, image_url, stock, created_at, updated_at) \
             VALUES ($1, $2, $3, $4::numeric, $5, $6, $7, $8, $8) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(description)
            .bind(price.to_string())
            .bind(category)
            .bind(image_url)
            .bind(stock)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Product::try_from(row)
    }

    async fn update_product(
        &self,
        params: UpdateProductParams,
    ) -> Result<UpdatedProduct, RepoError> {
        let UpdateProductParams {
            id,
            name,
            description,
            price,
            category,
            image_url,
            stock,
        } = params;

        let row = sqlx::query_as::<_, UpdatedProductRow>(
            r#"
            UPDATE products p SET
                name = COALESCE($2, p.name),
                description = COALESCE($3, p.description),
                price = COALESCE($4::numeric, p.price),
                category = COALESCE($5, p.category),
                image_url = COALESCE($6, p.image_url),
                stock = COALESCE($7, p.stock),
                updated_at = $8
            FROM (SELECT id, category FROM products WHERE id = $1 FOR UPDATE) old
            WHERE p.id = old.id
            RETURNING p.id, p.name, p.description, p.price::text AS price, p.category,
                      p.image_url, p.stock, p.created_at, p.updated_at,
                      old.category AS previous_category
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(price.map(|price| price.to_string()))
        .bind(category)
        .bind(image_url)
        .bind(stock)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(UpdatedProduct {
            product: Product::try_from(row.product)?,
            previous_category: row.previous_category,
        })
    }

    async fn delete_product(&self, id: Uuid) -> Result<Product, RepoError> {
        let sql = format!("DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Product::try_from(row)
    }

    async fn adjust_stock(&self, id: Uuid, delta: i32) -> Result<Product, RepoError> {
        let sql = format!(
            "UPDATE products SET stock = stock + $2, updated_at = $3 \
             WHERE id = $1 AND stock + $2 >= 0 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(delta)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return Product::try_from(row);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Err(if exists {
            RepoError::InsufficientStock
        } else {
            RepoError::NotFound
        })
    }

    async fn update_prices(&self, changes: &[PriceChange]) -> Result<Vec<Product>, RepoError> {
        let sql = format!(
            "UPDATE products SET price = $2::numeric, updated_at = $3 \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let mut rows = Vec::with_capacity(changes.len());

        for change in changes {
            let row = sqlx::query_as::<_, ProductRow>(&sql)
                .bind(change.id)
                .bind(change.price.to_string())
                .bind(now)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .ok_or(RepoError::RecordNotFound { id: change.id })?;
            rows.push(row);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        into_products(rows)
    }
}
