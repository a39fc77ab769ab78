//! Credit note model for salesdocs-service.

use crate::services::lifecycle::StatusMachine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Credit note status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    Draft,
    Issued,
    Applied,
    Refunded,
    Cancelled,
}

impl CreditNoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditNoteStatus::Draft => "draft",
            CreditNoteStatus::Issued => "issued",
            CreditNoteStatus::Applied => "applied",
            CreditNoteStatus::Refunded => "refunded",
            CreditNoteStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "issued" => CreditNoteStatus::Issued,
            "applied" => CreditNoteStatus::Applied,
            "refunded" => CreditNoteStatus::Refunded,
            "cancelled" => CreditNoteStatus::Cancelled,
            _ => CreditNoteStatus::Draft,
        }
    }
}

impl StatusMachine for CreditNoteStatus {
    const DOCUMENT: &'static str = "credit_note";

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn next_states(&self) -> &'static [Self] {
        match self {
            CreditNoteStatus::Draft => &[CreditNoteStatus::Issued],
            CreditNoteStatus::Issued => &[
                CreditNoteStatus::Applied,
                CreditNoteStatus::Refunded,
                CreditNoteStatus::Cancelled,
            ],
            CreditNoteStatus::Applied
            | CreditNoteStatus::Refunded
            | CreditNoteStatus::Cancelled => &[],
        }
    }
}

/// Credit note: negative-value counterpart to an invoice. Amounts are
/// stored positive; the document type carries the sign.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditNote {
    pub credit_note_id: Uuid,
    pub workspace_id: Uuid,
    pub credit_note_number: String,
    pub status: String,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub invoice_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub issued_utc: Option<DateTime<Utc>>,
    pub settled_utc: Option<DateTime<Utc>>,
}

/// Input for creating a credit note.
#[derive(Debug, Clone)]
pub struct CreateCreditNote {
    pub workspace_id: Uuid,
    pub contact_id: Uuid,
    pub contact_name: String,
    pub currency: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// Input for updating a credit note (draft only).
#[derive(Debug, Clone, Default)]
pub struct UpdateCreditNote {
    pub contact_name: Option<String>,
    pub reason: Option<String>,
}

/// Filter parameters for listing credit notes.
#[derive(Debug, Clone, Default)]
pub struct ListCreditNotesFilter {
    pub status: Option<CreditNoteStatus>,
    pub invoice_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
