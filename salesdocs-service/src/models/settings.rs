//! Per-workspace invoice settings for salesdocs-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per workspace: numbering prefixes and counters, document
/// defaults and letterhead/branding fields. Created with defaults on
/// first use.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceSettings {
    pub workspace_id: Uuid,
    pub quotation_prefix: String,
    pub invoice_prefix: String,
    pub credit_note_prefix: String,
    pub quotation_counter: i64,
    pub invoice_counter: i64,
    pub credit_note_counter: i64,
    pub default_currency: String,
    pub default_payment_terms_days: i32,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_tax_id: Option<String>,
    pub accent_color: Option<String>,
    pub automation_webhook_url: Option<String>,
    pub automation_webhook_secret: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for updating workspace settings. Counters are never set
/// directly; they move only through number allocation.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoiceSettings {
    pub quotation_prefix: Option<String>,
    pub invoice_prefix: Option<String>,
    pub credit_note_prefix: Option<String>,
    pub default_currency: Option<String>,
    pub default_payment_terms_days: Option<i32>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_tax_id: Option<String>,
    pub accent_color: Option<String>,
    pub automation_webhook_url: Option<String>,
    pub automation_webhook_secret: Option<String>,
}
