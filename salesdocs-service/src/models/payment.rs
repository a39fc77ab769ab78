//! Payment model for salesdocs-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment recorded against an issued invoice. The invoice's amount_paid
/// is recomputed from the sum of its payments on every write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub workspace_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub workspace_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
}
