//! Quotation operations.

use crate::models::{
    CreateQuotation, Invoice, ListQuotationsFilter, Quotation, UpdateQuotation,
};
use crate::models::quotation::QuotationStatus;
use crate::services::database::invoices::INVOICE_COLUMNS;
use crate::services::database::line_items::recompute_parent_totals;
use crate::services::database::{outbox, settings, Database};
use crate::services::lifecycle::StatusMachine;
use crate::services::metrics::{CONVERSIONS_TOTAL, DB_QUERY_DURATION, DOCUMENTS_TOTAL};
use crate::services::numbering::{allocate_number, DocumentKind};
use crate::services::totals::DocumentDiscount;
use crate::models::LineItemParent;
use chrono::{Days, Utc};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

pub(crate) const QUOTATION_COLUMNS: &str = "quotation_id, workspace_id, quotation_number, \
    status, contact_id, contact_name, currency, subtotal, discount_total, tax_total, total, \
    document_discount_kind, document_discount_value, valid_until, opportunity_id, \
    converted_to_invoice_id, notes, created_utc, sent_utc, decided_utc";

impl Database {
    /// Create a new draft quotation, allocating its number atomically in
    /// the same transaction.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id))]
    pub async fn create_quotation(&self, input: &CreateQuotation) -> Result<Quotation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_quotation"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let workspace_settings = settings::get_or_create_on(&mut tx, input.workspace_id).await?;
        let currency = input
            .currency
            .clone()
            .unwrap_or(workspace_settings.default_currency);
        let number =
            allocate_number(&mut tx, input.workspace_id, DocumentKind::Quotation).await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            INSERT INTO quotations (
                quotation_id, workspace_id, quotation_number, status, contact_id, contact_name,
                currency, document_discount_kind, document_discount_value, valid_until,
                opportunity_id, notes
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {QUOTATION_COLUMNS}
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
        .bind(input.valid_until)
        .bind(input.opportunity_id)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create quotation: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        DOCUMENTS_TOTAL
            .with_label_values(&["quotation", "draft"])
            .inc();

        info!(
            quotation_id = %quotation.quotation_id,
            quotation_number = %quotation.quotation_number,
            "Draft quotation created"
        );

        Ok(quotation)
    }

    /// Get a quotation by ID.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, quotation_id = %quotation_id))]
    pub async fn get_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
    ) -> Result<Option<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_quotation"])
            .start_timer();

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations \
             WHERE workspace_id = $1 AND quotation_id = $2"
        ))
        .bind(workspace_id)
        .bind(quotation_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quotation: {}", e)))?;

        timer.observe_duration();

        Ok(quotation)
    }

    /// List quotations for a workspace.
    #[instrument(skip(self, filter), fields(workspace_id = %workspace_id))]
    pub async fn list_quotations(
        &self,
        workspace_id: Uuid,
        filter: &ListQuotationsFilter,
    ) -> Result<Vec<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_quotations"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let quotations = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Quotation>(&format!(
                r#"
                SELECT {QUOTATION_COLUMNS}
                FROM quotations
                WHERE workspace_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR contact_id = $3)
                  AND quotation_id > $4
                ORDER BY quotation_id
                LIMIT $5
                "#
            ))
            .bind(workspace_id)
            .bind(&status_str)
            .bind(filter.contact_id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, Quotation>(&format!(
                r#"
                SELECT {QUOTATION_COLUMNS}
                FROM quotations
                WHERE workspace_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR contact_id = $3)
                ORDER BY quotation_id
                LIMIT $4
                "#
            ))
            .bind(workspace_id)
            .bind(&status_str)
            .bind(filter.contact_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list quotations: {}", e)))?;

        timer.observe_duration();

        Ok(quotations)
    }

    /// Update a draft quotation and recompute totals (the document-level
    /// discount may have changed).
    #[instrument(skip(self, input), fields(workspace_id = %workspace_id, quotation_id = %quotation_id))]
    pub async fn update_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
        input: &UpdateQuotation,
    ) -> Result<Option<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quotation"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations \
             WHERE workspace_id = $1 AND quotation_id = $2 FOR UPDATE"
        ))
        .bind(workspace_id)
        .bind(quotation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quotation: {}", e)))?;

        let Some(existing) = existing else {
            return Ok(None);
        };
        if existing.status != "draft" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only draft quotations can be updated"
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
            UPDATE quotations
            SET contact_name = COALESCE($3, contact_name),
                valid_until = COALESCE($4, valid_until),
                document_discount_kind = $5,
                document_discount_value = $6,
                notes = COALESCE($7, notes)
            WHERE workspace_id = $1 AND quotation_id = $2
            "#,
        )
        .bind(workspace_id)
        .bind(quotation_id)
        .bind(&input.contact_name)
        .bind(input.valid_until)
        .bind(&discount_kind)
        .bind(discount_value)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update quotation: {}", e))
        })?;

        let discount = DocumentDiscount::from_columns(discount_kind.as_deref(), discount_value);
        recompute_parent_totals(
            &mut tx,
            workspace_id,
            &LineItemParent::Quotation(quotation_id),
            discount,
        )
        .await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations \
             WHERE workspace_id = $1 AND quotation_id = $2"
        ))
        .bind(workspace_id)
        .bind(quotation_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to reload quotation: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(quotation_id = %quotation_id, "Quotation updated");

        Ok(Some(quotation))
    }

    /// Delete a draft quotation.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, quotation_id = %quotation_id))]
    pub async fn delete_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_quotation"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM quotations
            WHERE workspace_id = $1 AND quotation_id = $2 AND status = 'draft'
            "#,
        )
        .bind(workspace_id)
        .bind(quotation_id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete quotation: {}", e))
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(quotation_id = %quotation_id, "Draft quotation deleted");
        }

        Ok(deleted)
    }

    /// Send a quotation (draft -> sent). Requires at least one line item.
    pub async fn send_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
    ) -> Result<Option<Quotation>, AppError> {
        self.transition_quotation(workspace_id, quotation_id, QuotationStatus::Sent)
            .await
    }

    /// Accept a sent quotation.
    pub async fn accept_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
    ) -> Result<Option<Quotation>, AppError> {
        self.transition_quotation(workspace_id, quotation_id, QuotationStatus::Accepted)
            .await
    }

    /// Reject a sent quotation.
    pub async fn reject_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
    ) -> Result<Option<Quotation>, AppError> {
        self.transition_quotation(workspace_id, quotation_id, QuotationStatus::Rejected)
            .await
    }

    /// Expire a sent quotation.
    pub async fn expire_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
    ) -> Result<Option<Quotation>, AppError> {
        self.transition_quotation(workspace_id, quotation_id, QuotationStatus::Expired)
            .await
    }

    #[instrument(skip(self), fields(workspace_id = %workspace_id, quotation_id = %quotation_id, to = to.as_str()))]
    async fn transition_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
        to: QuotationStatus,
    ) -> Result<Option<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_quotation"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations \
             WHERE workspace_id = $1 AND quotation_id = $2 FOR UPDATE"
        ))
        .bind(workspace_id)
        .bind(quotation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quotation: {}", e)))?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        QuotationStatus::from_string(&existing.status).ensure_transition(to)?;

        if to == QuotationStatus::Sent {
            let has_items: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM line_items WHERE quotation_id = $1)",
            )
            .bind(quotation_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check line items: {}", e))
            })?;
            if !has_items {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cannot send a quotation without line items"
                )));
            }
        }

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            UPDATE quotations
            SET status = $3,
                sent_utc = CASE WHEN $3 = 'sent' THEN NOW() ELSE sent_utc END,
                decided_utc = CASE WHEN $3 IN ('accepted', 'rejected', 'expired') THEN NOW() ELSE decided_utc END
            WHERE workspace_id = $1 AND quotation_id = $2
            RETURNING {QUOTATION_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(quotation_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to transition quotation: {}", e))
        })?;

        outbox::enqueue_event(
            &mut tx,
            workspace_id,
            &format!("quotation.{}", to.as_str()),
            json!({
                "quotation_id": quotation.quotation_id,
                "quotation_number": quotation.quotation_number,
                "contact_id": quotation.contact_id,
                "total": quotation.total,
            }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        DOCUMENTS_TOTAL
            .with_label_values(&["quotation", to.as_str()])
            .inc();

        info!(
            quotation_id = %quotation.quotation_id,
            status = %quotation.status,
            "Quotation transitioned"
        );

        Ok(Some(quotation))
    }

    /// Convert an accepted quotation into a draft invoice.
    ///
    /// Atomic: invoice creation, line-item copies, number allocation and
    /// the conversion back-reference commit together. At most one
    /// conversion per quotation, guarded by `converted_to_invoice_id`
    /// under the row lock.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, quotation_id = %quotation_id))]
    pub async fn convert_quotation(
        &self,
        workspace_id: Uuid,
        quotation_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_quotation"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations \
             WHERE workspace_id = $1 AND quotation_id = $2 FOR UPDATE"
        ))
        .bind(workspace_id)
        .bind(quotation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quotation: {}", e)))?;

        let Some(quotation) = existing else {
            return Ok(None);
        };

        if quotation.status != QuotationStatus::Accepted.as_str() {
            CONVERSIONS_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only accepted quotations can be converted; status is {}",
                quotation.status
            )));
        }
        if let Some(invoice_id) = quotation.converted_to_invoice_id {
            CONVERSIONS_TOTAL.with_label_values(&["duplicate"]).inc();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quotation already converted to invoice {}",
                invoice_id
            )));
        }

        let workspace_settings = settings::get_or_create_on(&mut tx, workspace_id).await?;
        let number = allocate_number(&mut tx, workspace_id, DocumentKind::Invoice).await?;

        let issue_date = Utc::now().date_naive();
        let terms = workspace_settings.default_payment_terms_days;
        let due_date = issue_date + Days::new(terms.max(0) as u64);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, workspace_id, invoice_number, status, contact_id, contact_name,
                currency, subtotal, discount_total, tax_total, total, amount_paid, amount_due,
                document_discount_kind, document_discount_value, issue_date, due_date,
                payment_terms_days, quotation_id, notes
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(&number)
        .bind(quotation.contact_id)
        .bind(&quotation.contact_name)
        .bind(&quotation.currency)
        .bind(quotation.subtotal)
        .bind(quotation.discount_total)
        .bind(quotation.tax_total)
        .bind(quotation.total)
        .bind(Decimal::ZERO)
        .bind(quotation.total)
        .bind(&quotation.document_discount_kind)
        .bind(quotation.document_discount_value)
        .bind(issue_date)
        .bind(due_date)
        .bind(terms)
        .bind(quotation_id)
        .bind(&quotation.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        // Copy line items as new rows with an independent lifecycle.
        sqlx::query(
            r#"
            INSERT INTO line_items (
                line_item_id, workspace_id, invoice_id, product_id, description,
                quantity, unit_price, tax_rate, discount_percent,
                subtotal, discount_amount, tax_amount, total, sort_order
            )
            SELECT gen_random_uuid(), workspace_id, $3, product_id, description,
                   quantity, unit_price, tax_rate, discount_percent,
                   subtotal, discount_amount, tax_amount, total, sort_order
            FROM line_items
            WHERE workspace_id = $1 AND quotation_id = $2
            "#,
        )
        .bind(workspace_id)
        .bind(quotation_id)
        .bind(invoice.invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to copy line items: {}", e)))?;

        sqlx::query(
            "UPDATE quotations SET converted_to_invoice_id = $3 \
             WHERE workspace_id = $1 AND quotation_id = $2",
        )
        .bind(workspace_id)
        .bind(quotation_id)
        .bind(invoice.invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark quotation converted: {}", e))
        })?;

        outbox::enqueue_event(
            &mut tx,
            workspace_id,
            "quotation.converted",
            json!({
                "quotation_id": quotation_id,
                "quotation_number": quotation.quotation_number,
                "invoice_id": invoice.invoice_id,
                "invoice_number": invoice.invoice_number,
            }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        CONVERSIONS_TOTAL.with_label_values(&["converted"]).inc();
        DOCUMENTS_TOTAL
            .with_label_values(&["invoice", "draft"])
            .inc();

        info!(
            quotation_id = %quotation_id,
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Quotation converted to invoice"
        );

        Ok(Some(invoice))
    }

    /// Expire sent quotations whose validity window has passed. Returns
    /// the number of quotations expired. Used by the reminder sweep.
    #[instrument(skip(self))]
    pub async fn expire_overdue_quotations(&self) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["expire_overdue_quotations"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let expired: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
            r#"
            UPDATE quotations
            SET status = 'expired', decided_utc = NOW()
            WHERE status = 'sent' AND valid_until IS NOT NULL AND valid_until < CURRENT_DATE
            RETURNING quotation_id, workspace_id, quotation_number
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to expire quotations: {}", e))
        })?;

        for (quotation_id, ws_id, number) in &expired {
            outbox::enqueue_event(
                &mut tx,
                *ws_id,
                "quotation.expired",
                json!({
                    "quotation_id": quotation_id,
                    "quotation_number": number,
                }),
            )
            .await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        let count = expired.len() as u64;
        if count > 0 {
            DOCUMENTS_TOTAL
                .with_label_values(&["quotation", "expired"])
                .inc_by(count as f64);
            info!(count = count, "Expired overdue quotations");
        }

        Ok(count)
    }
}
