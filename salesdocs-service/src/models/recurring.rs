//! Recurring invoice template model for salesdocs-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Template a scheduled run stamps concrete invoices from. The line-item
/// snapshot lives in `recurring_template_items`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurringTemplate {
    pub template_id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: String,
    pub frequency: String,
    pub next_run_date: NaiveDate,
    pub active: bool,
    pub auto_send: bool,
    pub payment_terms_days: i32,
    pub invoices_generated: i32,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Snapshot row copied onto every generated invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateItem {
    pub item_id: Uuid,
    pub template_id: Uuid,
    pub workspace_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub sort_order: i32,
}

/// Input for creating a recurring template.
#[derive(Debug, Clone)]
pub struct CreateRecurringTemplate {
    pub workspace_id: Uuid,
    pub name: String,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: Option<String>,
    pub frequency: String,
    pub next_run_date: NaiveDate,
    pub auto_send: bool,
    pub payment_terms_days: Option<i32>,
    pub notes: Option<String>,
    pub items: Vec<CreateTemplateItem>,
}

/// Input for one snapshot line.
#[derive(Debug, Clone)]
pub struct CreateTemplateItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub sort_order: i32,
}

/// Input for updating a template.
#[derive(Debug, Clone, Default)]
pub struct UpdateRecurringTemplate {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub frequency: Option<String>,
    pub next_run_date: Option<NaiveDate>,
    pub auto_send: Option<bool>,
    pub payment_terms_days: Option<i32>,
    pub notes: Option<String>,
}

/// Filter parameters for listing templates.
#[derive(Debug, Clone, Default)]
pub struct ListTemplatesFilter {
    pub active_only: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
