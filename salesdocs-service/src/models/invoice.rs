//! Invoice model for salesdocs-service.

use crate::services::lifecycle::StatusMachine;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status as stored. `overdue` is intentionally absent: it is
/// derived from `due_date` at read time, never written to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Viewed => "viewed",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "viewed" => InvoiceStatus::Viewed,
            "paid" => InvoiceStatus::Paid,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }

    /// True when an invoice in this status past its due date counts as
    /// overdue. Paid and cancelled invoices never do.
    pub fn can_be_overdue(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Viewed)
    }

    /// Display status: the stored status, or `overdue` when the due date
    /// has passed on an open invoice.
    pub fn effective(&self, due_date: Option<NaiveDate>, today: NaiveDate) -> &'static str {
        match due_date {
            Some(due) if self.can_be_overdue() && due < today => "overdue",
            _ => self.as_str(),
        }
    }
}

impl StatusMachine for InvoiceStatus {
    const DOCUMENT: &'static str = "invoice";

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn next_states(&self) -> &'static [Self] {
        match self {
            InvoiceStatus::Draft => &[InvoiceStatus::Sent],
            InvoiceStatus::Sent => &[
                InvoiceStatus::Viewed,
                InvoiceStatus::Paid,
                InvoiceStatus::Cancelled,
            ],
            InvoiceStatus::Viewed => &[InvoiceStatus::Paid, InvoiceStatus::Cancelled],
            InvoiceStatus::Paid | InvoiceStatus::Cancelled => &[],
        }
    }
}

/// Invoice document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub workspace_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub payment_terms_days: i32,
    pub quotation_id: Option<Uuid>,
    pub recurring_template_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub sent_utc: Option<DateTime<Utc>>,
    pub paid_utc: Option<DateTime<Utc>>,
    pub cancelled_utc: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Display status with overdue derived from the due date.
    pub fn effective_status(&self, today: NaiveDate) -> &'static str {
        InvoiceStatus::from_string(&self.status).effective(self.due_date, today)
    }
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub workspace_id: Uuid,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms_days: Option<i32>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub quotation_id: Option<Uuid>,
    pub recurring_template_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Input for updating an invoice (draft only).
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub contact_name: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms_days: Option<i32>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

/// Filter parameters for listing invoices.
///
/// `overdue_only` filters on the due date in SQL; it never consults the
/// stored status column for `overdue`.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub contact_id: Option<Uuid>,
    pub overdue_only: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
