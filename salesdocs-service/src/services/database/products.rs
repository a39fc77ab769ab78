//! Product catalog operations.

use crate::models::{CreateProduct, ListProductsFilter, Product, UpdateProduct};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use platform_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str =
    "product_id, workspace_id, name, unit_price, tax_rate, unit_label, active, created_utc";

/// Outcome of a product delete: referenced products are deactivated so
/// historical documents keep resolving, unreferenced ones are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRemoval {
    Deleted,
    Deactivated,
}

impl Database {
    /// Create a new product.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product_id = Uuid::new_v4();
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (product_id, workspace_id, name, unit_price, tax_rate, unit_label, active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(input.workspace_id)
        .bind(&input.name)
        .bind(input.unit_price)
        .bind(input.tax_rate)
        .bind(&input.unit_label)
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)))?;

        timer.observe_duration();

        info!(product_id = %product.product_id, name = %product.name, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, product_id = %product_id))]
    pub async fn get_product(
        &self,
        workspace_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE workspace_id = $1 AND product_id = $2"
        ))
        .bind(workspace_id)
        .bind(product_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products for a workspace.
    #[instrument(skip(self, filter), fields(workspace_id = %workspace_id))]
    pub async fn list_products(
        &self,
        workspace_id: Uuid,
        filter: &ListProductsFilter,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let products = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Product>(&format!(
                r#"
                SELECT {PRODUCT_COLUMNS}
                FROM products
                WHERE workspace_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                  AND product_id > $3
                ORDER BY product_id
                LIMIT $4
                "#
            ))
            .bind(workspace_id)
            .bind(filter.active_only)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, Product>(&format!(
                r#"
                SELECT {PRODUCT_COLUMNS}
                FROM products
                WHERE workspace_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                ORDER BY product_id
                LIMIT $3
                "#
            ))
            .bind(workspace_id)
            .bind(filter.active_only)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Update a product.
    #[instrument(skip(self, input), fields(workspace_id = %workspace_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        workspace_id: Uuid,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($3, name),
                unit_price = COALESCE($4, unit_price),
                tax_rate = COALESCE($5, tax_rate),
                unit_label = COALESCE($6, unit_label),
                active = COALESCE($7, active)
            WHERE workspace_id = $1 AND product_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(product_id)
        .bind(&input.name)
        .bind(input.unit_price)
        .bind(input.tax_rate)
        .bind(&input.unit_label)
        .bind(input.active)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// Delete a product, or deactivate it when historical documents
    /// reference it.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, product_id = %product_id))]
    pub async fn delete_product(
        &self,
        workspace_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<ProductRemoval>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM line_items
                WHERE workspace_id = $1 AND product_id = $2
            )
            "#,
        )
        .bind(workspace_id)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check references: {}", e))
        })?;

        let outcome = if referenced {
            let result = sqlx::query(
                "UPDATE products SET active = FALSE WHERE workspace_id = $1 AND product_id = $2",
            )
            .bind(workspace_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate product: {}", e))
            })?;

            (result.rows_affected() > 0).then_some(ProductRemoval::Deactivated)
        } else {
            let result = sqlx::query(
                "DELETE FROM products WHERE workspace_id = $1 AND product_id = $2",
            )
            .bind(workspace_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete product: {}", e))
            })?;

            (result.rows_affected() > 0).then_some(ProductRemoval::Deleted)
        };

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        if let Some(outcome) = outcome {
            info!(product_id = %product_id, ?outcome, "Product removed");
        }

        Ok(outcome)
    }
}
