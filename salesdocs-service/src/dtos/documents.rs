//! Request/response shapes for quotations, invoices and credit notes.

use crate::models::invoice::InvoiceStatus;
use crate::models::quotation::QuotationStatus;
use crate::models::credit_note::CreditNoteStatus;
use crate::models::{CreditNote, Invoice, LineItem, Payment, Quotation};
use chrono::NaiveDate;
use platform_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Reject discount fields that cannot be aggregated.
pub fn validate_document_discount(
    kind: &Option<String>,
    value: &Option<Decimal>,
) -> Result<(), AppError> {
    match (kind.as_deref(), value) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(AppError::BadRequest(anyhow::anyhow!(
            "document_discount_value requires document_discount_kind"
        ))),
        (Some(_), None) => Err(AppError::BadRequest(anyhow::anyhow!(
            "document_discount_kind requires document_discount_value"
        ))),
        (Some("fixed"), Some(v)) if *v >= Decimal::ZERO => Ok(()),
        (Some("percent"), Some(v))
            if *v >= Decimal::ZERO && *v <= Decimal::ONE_HUNDRED =>
        {
            Ok(())
        }
        (Some("percent"), Some(_)) => Err(AppError::BadRequest(anyhow::anyhow!(
            "Percent discount must be between 0 and 100"
        ))),
        (Some("fixed"), Some(_)) => Err(AppError::BadRequest(anyhow::anyhow!(
            "Fixed discount must not be negative"
        ))),
        (Some(other), _) => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown discount kind: {}",
            other
        ))),
    }
}

/// Reject line item numbers outside their domain.
pub fn validate_line_item_numbers(
    quantity: Decimal,
    unit_price: Decimal,
    tax_rate: Decimal,
    discount_percent: Decimal,
) -> Result<(), AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Quantity must be positive"
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unit price must not be negative"
        )));
    }
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tax rate must be between 0 and 100"
        )));
    }
    if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount percent must be between 0 and 100"
        )));
    }
    Ok(())
}

/// Validate the fields a partial line-item update actually carries.
pub fn validate_line_item_update(request: &UpdateLineItemRequest) -> Result<(), AppError> {
    validate_line_item_numbers(
        request.quantity.unwrap_or(Decimal::ONE),
        request.unit_price.unwrap_or(Decimal::ZERO),
        request.tax_rate.unwrap_or(Decimal::ZERO),
        request.discount_percent.unwrap_or(Decimal::ZERO),
    )
}

// -----------------------------------------------------------------------------
// Quotations
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationRequest {
    pub contact_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub contact_name: String,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub opportunity_id: Option<Uuid>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateQuotationRequest {
    #[validate(length(min = 1, max = 200))]
    pub contact_name: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuotationsQuery {
    pub status: Option<QuotationStatus>,
    pub contact_id: Option<Uuid>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct QuotationDetail {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub line_items: Vec<LineItem>,
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub contact_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub contact_name: String,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms_days: Option<i32>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 1, max = 200))]
    pub contact_name: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms_days: Option<i32>,
    pub document_discount_kind: Option<String>,
    pub document_discount_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub overdue: bool,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Invoice with the display status derived from the due date. The stored
/// column never holds `overdue`, so every read path goes through this.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub effective_status: String,
}

impl InvoiceResponse {
    pub fn new(invoice: Invoice, today: NaiveDate) -> Self {
        let effective_status = invoice.effective_status(today).to_string();
        InvoiceResponse {
            invoice,
            effective_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: InvoiceResponse,
    pub line_items: Vec<LineItem>,
    pub payments: Vec<Payment>,
}

// -----------------------------------------------------------------------------
// Credit notes
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCreditNoteRequest {
    pub contact_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub contact_name: String,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateCreditNoteRequest {
    #[validate(length(min = 1, max = 200))]
    pub contact_name: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListCreditNotesQuery {
    pub status: Option<CreditNoteStatus>,
    pub invoice_id: Option<Uuid>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreditNoteDetail {
    #[serde(flatten)]
    pub credit_note: CreditNote,
    pub line_items: Vec<LineItem>,
}

// -----------------------------------------------------------------------------
// Line items and payments
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLineItemRequest {
    pub product_id: Option<Uuid>,
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
pub struct UpdateLineItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub method: String,
    pub reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

pub(crate) fn default_page_size() -> i32 {
    20
}
