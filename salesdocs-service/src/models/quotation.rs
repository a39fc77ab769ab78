//! Quotation model for salesdocs-service.

use crate::services::lifecycle::StatusMachine;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Quotation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => QuotationStatus::Sent,
            "accepted" => QuotationStatus::Accepted,
            "rejected" => QuotationStatus::Rejected,
            "expired" => QuotationStatus::Expired,
            _ => QuotationStatus::Draft,
        }
    }
}

impl StatusMachine for QuotationStatus {
    const DOCUMENT: &'static str = "quotation";

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn next_states(&self) -> &'static [Self] {
        match self {
            QuotationStatus::Draft => &[QuotationStatus::Sent],
            QuotationStatus::Sent => &[
                QuotationStatus::Accepted,
                QuotationStatus::Rejected,
                QuotationStatus::Expired,
            ],
            QuotationStatus::Accepted
            | QuotationStatus::Rejected
            | QuotationStatus::Expired => &[],
        }
    }
}

/// Quotation document. Totals are derived from line items and persisted
/// alongside the header whenever line items change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quotation {
    pub quotation_id: Uuid,
    pub workspace_id: Uuid,
    pub quotation_number: String,
    pub status: String,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub opportunity_id: Option<Uuid>,
    pub converted_to_invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub sent_utc: Option<DateTime<Utc>>,
    pub decided_utc: Option<DateTime<Utc>>,
}

/// Input for creating a quotation.
#[derive(Debug, Clone)]
pub struct CreateQuotation {
    pub workspace_id: Uuid,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub opportunity_id: Option<Uuid>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for updating a quotation (draft only).
#[derive(Debug, Clone, Default)]
pub struct UpdateQuotation {
    pub contact_name: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

/// Filter parameters for listing quotations.
#[derive(Debug, Clone, Default)]
pub struct ListQuotationsFilter {
    pub status: Option<QuotationStatus>,
    pub contact_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
