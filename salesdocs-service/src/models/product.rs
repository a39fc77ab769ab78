//! Catalog product model for salesdocs-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog item priced per unit. Products referenced by historical
/// documents are deactivated rather than deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub unit_label: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub workspace_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub unit_label: String,
}

/// Input for updating a product.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub unit_label: Option<String>,
    pub active: Option<bool>,
}

/// Filter parameters for listing products.
#[derive(Debug, Clone, Default)]
pub struct ListProductsFilter {
    pub active_only: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
