//! Request/response shapes for products, settings and recurring templates.

use crate::dtos::documents::default_page_size;
use crate::models::{RecurringTemplate, TemplateItem};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// -----------------------------------------------------------------------------
// Products
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default = "default_unit_label")]
    #[validate(length(min = 1, max = 50))]
    pub unit_label: String,
}

fn default_unit_label() -> String {
    "unit".to_string()
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    #[validate(length(min = 1, max = 50))]
    pub unit_label: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Recurring templates
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub contact_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub contact_name: String,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub frequency: String,
    pub next_run_date: NaiveDate,
    #[serde(default)]
    pub auto_send: bool,
    pub payment_terms_days: Option<i32>,
    pub notes: Option<String>,
    pub items: Vec<TemplateItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TemplateItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateTemplateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub contact_name: Option<String>,
    pub frequency: Option<String>,
    pub next_run_date: Option<NaiveDate>,
    pub auto_send: Option<bool>,
    pub payment_terms_days: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListTemplatesQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TemplateDetail {
    #[serde(flatten)]
    pub template: RecurringTemplate,
    pub items: Vec<TemplateItem>,
}

// -----------------------------------------------------------------------------
// Settings
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateSettingsRequest {
    #[validate(length(min = 1, max = 10))]
    pub quotation_prefix: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub invoice_prefix: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub credit_note_prefix: Option<String>,
    #[validate(length(equal = 3))]
    pub default_currency: Option<String>,
    pub default_payment_terms_days: Option<i32>,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    #[validate(length(max = 500))]
    pub company_address: Option<String>,
    #[validate(length(max = 50))]
    pub company_tax_id: Option<String>,
    #[validate(length(max = 20))]
    pub accent_color: Option<String>,
    #[validate(url)]
    pub automation_webhook_url: Option<String>,
    pub automation_webhook_secret: Option<String>,
}
