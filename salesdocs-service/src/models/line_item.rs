//! Line item model for salesdocs-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The document a line item belongs to. Exactly one of the three parent
/// columns is set per row, enforced by a table check constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemParent {
    Quotation(Uuid),
    Invoice(Uuid),
    CreditNote(Uuid),
}

impl LineItemParent {
    pub fn id(&self) -> Uuid {
        match self {
            LineItemParent::Quotation(id)
            | LineItemParent::Invoice(id)
            | LineItemParent::CreditNote(id) => *id,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            LineItemParent::Quotation(_) => "quotation_id",
            LineItemParent::Invoice(_) => "invoice_id",
            LineItemParent::CreditNote(_) => "credit_note_id",
        }
    }
}

/// One priced row within a quotation, invoice or credit note. The derived
/// columns (subtotal, discount_amount, tax_amount, total) are recomputed
/// from the input columns on every write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub workspace_id: Uuid,
    pub quotation_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub credit_note_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for adding a line item to a draft document.
#[derive(Debug, Clone)]
pub struct CreateLineItem {
    pub workspace_id: Uuid,
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub sort_order: i32,
}

/// Input for updating a line item on a draft document.
#[derive(Debug, Clone, Default)]
pub struct UpdateLineItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub sort_order: Option<i32>,
}
