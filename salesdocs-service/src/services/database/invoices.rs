//! Invoice operations.
//!
//! The stored status column never holds `overdue`; list filtering and
//! responses derive it from the due date (see `InvoiceStatus::effective`).

use crate::models::invoice::InvoiceStatus;
use crate::models::{
    CreateInvoice, CreatePayment, Invoice, LineItemParent, ListInvoicesFilter, Payment,
    UpdateInvoice,
};
use crate::services::database::line_items::recompute_parent_totals;
use crate::services::database::{outbox, settings, Database};
use crate::services::lifecycle::StatusMachine;
use crate::services::metrics::{DB_QUERY_DURATION, DOCUMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL};
use crate::services::numbering::{allocate_number, DocumentKind};
use crate::services::totals::DocumentDiscount;
use chrono::{Days, Utc};
use platform_core::error::AppError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

pub(crate) const INVOICE_COLUMNS: &str = "invoice_id, workspace_id, invoice_number, status, \
    contact_id, contact_name, currency, subtotal, discount_total, tax_total, total, \
    amount_paid, amount_due, document_discount_kind, document_discount_value, issue_date, \
    due_date, payment_terms_days, quotation_id, recurring_template_id, notes, created_utc, \
    sent_utc, paid_utc, cancelled_utc";

const PAYMENT_COLUMNS: &str = "payment_id, workspace_id, invoice_id, amount, method, \
    reference, payment_date, notes, created_utc";

impl Database {
    /// Create a new draft invoice, allocating its number atomically in the
    /// same transaction. Currency, payment terms and due date default from
    /// workspace settings when absent.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let workspace_settings = settings::get_or_create_on(&mut tx, input.workspace_id).await?;
        let currency = input
            .currency
            .clone()
            .unwrap_or(workspace_settings.default_currency);
        let terms = input
            .payment_terms_days
            .unwrap_or(workspace_settings.default_payment_terms_days);
        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input
            .due_date
            .unwrap_or(issue_date + Days::new(terms.max(0) as u64));

        let number = allocate_number(&mut tx, input.workspace_id, DocumentKind::Invoice).await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, workspace_id, invoice_number, status, contact_id, contact_name,
                currency, document_discount_kind, document_discount_value, issue_date, due_date,
                payment_terms_days, quotation_id, recurring_template_id, notes
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.workspace_id)
        .bind(&number)
        .bind(input.contact_id)
        .bind(&input.contact_name)
        .bind(&currency)
        .bind(&input.document_discount_kind)
        .bind(input.document_discount_value)
        .bind(issue_date)
        .bind(due_date)
        .bind(terms)
        .bind(input.quotation_id)
        .bind(input.recurring_template_id)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        DOCUMENTS_TOTAL
            .with_label_values(&["invoice", "draft"])
            .inc();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Draft invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE workspace_id = $1 AND invoice_id = $2"
        ))
        .bind(workspace_id)
        .bind(invoice_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// List invoices for a workspace. The overdue filter compares the due
    /// date in SQL rather than trusting the stored status column.
    #[instrument(skip(self, filter), fields(workspace_id = %workspace_id))]
    pub async fn list_invoices(
        &self,
        workspace_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {INVOICE_COLUMNS}
                FROM invoices
                WHERE workspace_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR contact_id = $3)
                  AND ($4::bool = FALSE OR (
                        status IN ('sent', 'viewed')
                        AND due_date IS NOT NULL AND due_date < CURRENT_DATE))
                  AND invoice_id > $5
                ORDER BY invoice_id
                LIMIT $6
                "#
            ))
            .bind(workspace_id)
            .bind(&status_str)
            .bind(filter.contact_id)
            .bind(filter.overdue_only)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {INVOICE_COLUMNS}
                FROM invoices
                WHERE workspace_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR contact_id = $3)
                  AND ($4::bool = FALSE OR (
                        status IN ('sent', 'viewed')
                        AND due_date IS NOT NULL AND due_date < CURRENT_DATE))
                ORDER BY invoice_id
                LIMIT $5
                "#
            ))
            .bind(workspace_id)
            .bind(&status_str)
            .bind(filter.contact_id)
            .bind(filter.overdue_only)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update a draft invoice and recompute totals.
    #[instrument(skip(self, input), fields(workspace_id = %workspace_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE workspace_id = $1 AND invoice_id = $2 FOR UPDATE"
        ))
        .bind(workspace_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let Some(existing) = existing else {
            return Ok(None);
        };
        if existing.status != "draft" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only draft invoices can be updated"
            )));
        }

        let discount_kind = input
            .document_discount_kind
            .clone()
            .or(existing.document_discount_kind);
        let discount_value = input
            .document_discount_value
            .or(existing.document_discount_value);

        sqlx::query(
            r#"
            UPDATE invoices
            SET contact_name = COALESCE($3, contact_name),
                issue_date = COALESCE($4, issue_date),
                due_date = COALESCE($5, due_date),
                payment_terms_days = COALESCE($6, payment_terms_days),
                document_discount_kind = $7,
                document_discount_value = $8,
                notes = COALESCE($9, notes)
            WHERE workspace_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(workspace_id)
        .bind(invoice_id)
        .bind(&input.contact_name)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.payment_terms_days)
        .bind(&discount_kind)
        .bind(discount_value)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        let discount = DocumentDiscount::from_columns(discount_kind.as_deref(), discount_value);
        recompute_parent_totals(
            &mut tx,
            workspace_id,
            &LineItemParent::Invoice(invoice_id),
            discount,
        )
        .await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE workspace_id = $1 AND invoice_id = $2"
        ))
        .bind(workspace_id)
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to reload invoice: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Invoice updated");

        Ok(Some(invoice))
    }

    /// Delete a draft invoice.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM invoices
            WHERE workspace_id = $1 AND invoice_id = $2 AND status = 'draft'
            "#,
        )
        .bind(workspace_id)
        .bind(invoice_id)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Draft invoice deleted");
        }

        Ok(deleted)
    }

    /// Send an invoice (draft -> sent). Requires at least one line item.
    pub async fn send_invoice(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        self.transition_invoice(workspace_id, invoice_id, InvoiceStatus::Sent)
            .await
    }

    /// Record that the recipient opened the invoice (sent -> viewed).
    pub async fn mark_invoice_viewed(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        self.transition_invoice(workspace_id, invoice_id, InvoiceStatus::Viewed)
            .await
    }

    /// Cancel an open invoice.
    pub async fn cancel_invoice(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        self.transition_invoice(workspace_id, invoice_id, InvoiceStatus::Cancelled)
            .await
    }

    #[instrument(skip(self), fields(workspace_id = %workspace_id, invoice_id = %invoice_id, to = to.as_str()))]
    async fn transition_invoice(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_invoice"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE workspace_id = $1 AND invoice_id = $2 FOR UPDATE"
        ))
        .bind(workspace_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        InvoiceStatus::from_string(&existing.status).ensure_transition(to)?;

        if to == InvoiceStatus::Sent {
            let has_items: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM line_items WHERE invoice_id = $1)",
            )
            .bind(invoice_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check line items: {}", e))
            })?;
            if !has_items {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cannot send an invoice without line items"
                )));
            }
        }

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = $3,
                sent_utc = CASE WHEN $3 = 'sent' THEN NOW() ELSE sent_utc END,
                cancelled_utc = CASE WHEN $3 = 'cancelled' THEN NOW() ELSE cancelled_utc END
            WHERE workspace_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(invoice_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to transition invoice: {}", e))
        })?;

        outbox::enqueue_event(
            &mut tx,
            workspace_id,
            &format!("invoice.{}", to.as_str()),
            json!({
                "invoice_id": invoice.invoice_id,
                "invoice_number": invoice.invoice_number,
                "contact_id": invoice.contact_id,
                "total": invoice.total,
                "amount_due": invoice.amount_due,
            }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        DOCUMENTS_TOTAL
            .with_label_values(&["invoice", to.as_str()])
            .inc();

        info!(
            invoice_id = %invoice.invoice_id,
            status = %invoice.status,
            "Invoice transitioned"
        );

        Ok(Some(invoice))
    }

    /// Record a payment against an open invoice.
    ///
    /// The payment may not exceed the amount due. `amount_paid` is
    /// recomputed from the sum of payments inside the transaction; a fully
    /// paid invoice transitions to `paid`.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id, invoice_id = %input.invoice_id))]
    pub async fn record_payment(
        &self,
        input: &CreatePayment,
    ) -> Result<(Payment, Invoice), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE workspace_id = $1 AND invoice_id = $2 FOR UPDATE"
        ))
        .bind(input.workspace_id)
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let Some(invoice) = invoice else {
            return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
        };

        let status = InvoiceStatus::from_string(&invoice.status);
        if !matches!(status, InvoiceStatus::Sent | InvoiceStatus::Viewed) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Can only record payments against sent invoices; status is {}",
                invoice.status
            )));
        }

        if input.amount > invoice.amount_due {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount {} exceeds amount due {}",
                input.amount,
                invoice.amount_due
            )));
        }

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (
                payment_id, workspace_id, invoice_id, amount, method, reference,
                payment_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.workspace_id)
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(&input.method)
        .bind(&input.reference)
        .bind(input.payment_date)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        // Recompute from the payment rows rather than incrementing, so the
        // stored amount always equals the sum of its payments.
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET amount_paid = pay.sum,
                amount_due = total - pay.sum
            FROM (
                SELECT COALESCE(SUM(amount), 0) AS sum
                FROM payments
                WHERE workspace_id = $1 AND invoice_id = $2
            ) AS pay
            WHERE workspace_id = $1 AND invoice_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(input.workspace_id)
        .bind(input.invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to recompute amounts: {}", e))
        })?;

        let invoice = if invoice.amount_due == Decimal::ZERO {
            status.ensure_transition(InvoiceStatus::Paid)?;

            let paid = sqlx::query_as::<_, Invoice>(&format!(
                r#"
                UPDATE invoices
                SET status = 'paid', paid_utc = NOW()
                WHERE workspace_id = $1 AND invoice_id = $2
                RETURNING {INVOICE_COLUMNS}
                "#
            ))
            .bind(input.workspace_id)
            .bind(input.invoice_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to mark invoice paid: {}", e))
            })?;

            outbox::enqueue_event(
                &mut tx,
                input.workspace_id,
                "invoice.paid",
                json!({
                    "invoice_id": paid.invoice_id,
                    "invoice_number": paid.invoice_number,
                    "contact_id": paid.contact_id,
                    "total": paid.total,
                }),
            )
            .await?;

            DOCUMENTS_TOTAL.with_label_values(&["invoice", "paid"]).inc();

            paid
        } else {
            outbox::enqueue_event(
                &mut tx,
                input.workspace_id,
                "invoice.payment_recorded",
                json!({
                    "invoice_id": invoice.invoice_id,
                    "invoice_number": invoice.invoice_number,
                    "amount": payment.amount,
                    "amount_due": invoice.amount_due,
                }),
            )
            .await?;

            invoice
        };

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&[invoice.currency.as_str()])
            .inc_by(payment.amount.to_f64().unwrap_or(0.0));

        info!(
            payment_id = %payment.payment_id,
            invoice_id = %invoice.invoice_id,
            amount = %payment.amount,
            "Payment recorded"
        );

        Ok((payment, invoice))
    }

    /// List payments for an invoice.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, invoice_id = %invoice_id))]
    pub async fn list_payments(
        &self,
        workspace_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE workspace_id = $1 AND invoice_id = $2
            ORDER BY payment_date, created_utc
            "#
        ))
        .bind(workspace_id)
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Open invoices past their due date, for the reminder sweep. Derived
    /// from `due_date`, never from the stored status column.
    #[instrument(skip(self))]
    pub async fn list_overdue_invoices(&self, limit: i64) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_overdue_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE status IN ('sent', 'viewed')
              AND due_date IS NOT NULL AND due_date < CURRENT_DATE
            ORDER BY due_date
            LIMIT $1
            "#
        ))
        .bind(limit.clamp(1, 1000))
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list overdue invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoices)
    }
}
