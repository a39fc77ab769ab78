//! Follow-up sweep: quotation expiry and payment reminders.
//!
//! Quotation expiry is a stored transition (a quotation past validity is
//! decided); invoice overdue stays derived, so this sweep only emits
//! reminder events and never writes an `overdue` status.

use crate::services::Database;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Outcome of one reminder sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReminderRunSummary {
    pub quotations_expired: u64,
    pub reminders_emitted: usize,
    pub failed: usize,
}

pub struct ReminderSweep {
    db: Arc<Database>,
}

impl ReminderSweep {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReminderRunSummary, platform_core::error::AppError> {
        let mut summary = ReminderRunSummary::default();

        summary.quotations_expired = self.db.expire_overdue_quotations().await?;

        let today = Utc::now().date_naive();
        let overdue = self.db.list_overdue_invoices(500).await?;

        for invoice in overdue {
            let days_overdue = invoice
                .due_date
                .map(|due| (today - due).num_days())
                .unwrap_or(0);

            let result = self
                .db
                .enqueue_workspace_event(
                    invoice.workspace_id,
                    "invoice.payment_reminder",
                    json!({
                        "invoice_id": invoice.invoice_id,
                        "invoice_number": invoice.invoice_number,
                        "contact_id": invoice.contact_id,
                        "amount_due": invoice.amount_due,
                        "due_date": invoice.due_date,
                        "days_overdue": days_overdue,
                    }),
                )
                .await;

            match result {
                Ok(()) => summary.reminders_emitted += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        invoice_id = %invoice.invoice_id,
                        error = %e,
                        "Failed to emit payment reminder"
                    );
                }
            }
        }

        info!(
            quotations_expired = summary.quotations_expired,
            reminders_emitted = summary.reminders_emitted,
            failed = summary.failed,
            "Reminder sweep finished"
        );

        Ok(summary)
    }
}
