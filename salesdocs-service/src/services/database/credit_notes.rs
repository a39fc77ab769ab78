//! Credit note operations.

use crate::models::credit_note::CreditNoteStatus;
use crate::models::{CreateCreditNote, CreditNote, ListCreditNotesFilter, UpdateCreditNote};
use crate::services::database::{outbox, settings, Database};
use crate::services::lifecycle::StatusMachine;
use crate::services::metrics::{DB_QUERY_DURATION, DOCUMENTS_TOTAL};
use crate::services::numbering::{allocate_number, DocumentKind};
use platform_core::error::AppError;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

const CREDIT_NOTE_COLUMNS: &str = "credit_note_id, workspace_id, credit_note_number, status, \
    contact_id, contact_name, currency, subtotal, discount_total, tax_total, total, invoice_id, \
    reason, created_utc, issued_utc, settled_utc";

impl Database {
    /// Create a new draft credit note, optionally referencing the invoice
    /// it corrects.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id))]
    pub async fn create_credit_note(
        &self,
        input: &CreateCreditNote,
    ) -> Result<CreditNote, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_credit_note"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        if let Some(invoice_id) = input.invoice_id {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM invoices WHERE workspace_id = $1 AND invoice_id = $2)",
            )
            .bind(input.workspace_id)
            .bind(invoice_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check invoice: {}", e))
            })?;
            if !exists {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Referenced invoice not found"
                )));
            }
        }

        let workspace_settings = settings::get_or_create_on(&mut tx, input.workspace_id).await?;
        let currency = input
            .currency
            .clone()
            .unwrap_or(workspace_settings.default_currency);
        let number =
            allocate_number(&mut tx, input.workspace_id, DocumentKind::CreditNote).await?;

        let credit_note = sqlx::query_as::<_, CreditNote>(&format!(
            r#"
            INSERT INTO credit_notes (
                credit_note_id, workspace_id, credit_note_number, status, contact_id,
                contact_name, currency, invoice_id, reason
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8)
            RETURNING {CREDIT_NOTE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.workspace_id)
        .bind(&number)
        .bind(input.contact_id)
        .bind(&input.contact_name)
        .bind(&currency)
        .bind(input.invoice_id)
        .bind(&input.reason)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create credit note: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        DOCUMENTS_TOTAL
            .with_label_values(&["credit_note", "draft"])
            .inc();

        info!(
            credit_note_id = %credit_note.credit_note_id,
            credit_note_number = %credit_note.credit_note_number,
            "Draft credit note created"
        );

        Ok(credit_note)
    }

    /// Get a credit note by ID.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, credit_note_id = %credit_note_id))]
    pub async fn get_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
    ) -> Result<Option<CreditNote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_credit_note"])
            .start_timer();

        let credit_note = sqlx::query_as::<_, CreditNote>(&format!(
            "SELECT {CREDIT_NOTE_COLUMNS} FROM credit_notes \
             WHERE workspace_id = $1 AND credit_note_id = $2"
        ))
        .bind(workspace_id)
        .bind(credit_note_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get credit note: {}", e))
        })?;

        timer.observe_duration();

        Ok(credit_note)
    }

    /// List credit notes for a workspace.
    #[instrument(skip(self, filter), fields(workspace_id = %workspace_id))]
    pub async fn list_credit_notes(
        &self,
        workspace_id: Uuid,
        filter: &ListCreditNotesFilter,
    ) -> Result<Vec<CreditNote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_credit_notes"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let credit_notes = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, CreditNote>(&format!(
                r#"
                SELECT {CREDIT_NOTE_COLUMNS}
                FROM credit_notes
                WHERE workspace_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR invoice_id = $3)
                  AND credit_note_id > $4
                ORDER BY credit_note_id
                LIMIT $5
                "#
            ))
            .bind(workspace_id)
            .bind(&status_str)
            .bind(filter.invoice_id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, CreditNote>(&format!(
                r#"
                SELECT {CREDIT_NOTE_COLUMNS}
                FROM credit_notes
                WHERE workspace_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR invoice_id = $3)
                ORDER BY credit_note_id
                LIMIT $4
                "#
            ))
            .bind(workspace_id)
            .bind(&status_str)
            .bind(filter.invoice_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        }
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list credit notes: {}", e))
        })?;

        timer.observe_duration();

        Ok(credit_notes)
    }

    /// Update a draft credit note.
    #[instrument(skip(self, input), fields(workspace_id = %workspace_id, credit_note_id = %credit_note_id))]
    pub async fn update_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
        input: &UpdateCreditNote,
    ) -> Result<Option<CreditNote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_credit_note"])
            .start_timer();

        let existing = self.get_credit_note(workspace_id, credit_note_id).await?;
        match existing {
            Some(note) if note.status == "draft" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft credit notes can be updated"
                )))
            }
            None => return Ok(None),
        };

        let credit_note = sqlx::query_as::<_, CreditNote>(&format!(
            r#"
            UPDATE credit_notes
            SET contact_name = COALESCE($3, contact_name),
                reason = COALESCE($4, reason)
            WHERE workspace_id = $1 AND credit_note_id = $2 AND status = 'draft'
            RETURNING {CREDIT_NOTE_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(credit_note_id)
        .bind(&input.contact_name)
        .bind(&input.reason)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update credit note: {}", e))
        })?;

        timer.observe_duration();

        Ok(credit_note)
    }

    /// Delete a draft credit note.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, credit_note_id = %credit_note_id))]
    pub async fn delete_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_credit_note"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM credit_notes
            WHERE workspace_id = $1 AND credit_note_id = $2 AND status = 'draft'
            "#,
        )
        .bind(workspace_id)
        .bind(credit_note_id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete credit note: {}", e))
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(credit_note_id = %credit_note_id, "Draft credit note deleted");
        }

        Ok(deleted)
    }

    /// Issue a credit note (draft -> issued). Requires at least one line item.
    pub async fn issue_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
    ) -> Result<Option<CreditNote>, AppError> {
        self.transition_credit_note(workspace_id, credit_note_id, CreditNoteStatus::Issued)
            .await
    }

    /// Mark an issued credit note as applied against an invoice balance.
    pub async fn apply_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
    ) -> Result<Option<CreditNote>, AppError> {
        self.transition_credit_note(workspace_id, credit_note_id, CreditNoteStatus::Applied)
            .await
    }

    /// Mark an issued credit note as refunded to the contact.
    pub async fn refund_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
    ) -> Result<Option<CreditNote>, AppError> {
        self.transition_credit_note(workspace_id, credit_note_id, CreditNoteStatus::Refunded)
            .await
    }

    /// Cancel an issued credit note.
    pub async fn cancel_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
    ) -> Result<Option<CreditNote>, AppError> {
        self.transition_credit_note(workspace_id, credit_note_id, CreditNoteStatus::Cancelled)
            .await
    }

    #[instrument(skip(self), fields(workspace_id = %workspace_id, credit_note_id = %credit_note_id, to = to.as_str()))]
    async fn transition_credit_note(
        &self,
        workspace_id: Uuid,
        credit_note_id: Uuid,
        to: CreditNoteStatus,
    ) -> Result<Option<CreditNote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_credit_note"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, CreditNote>(&format!(
            "SELECT {CREDIT_NOTE_COLUMNS} FROM credit_notes \
             WHERE workspace_id = $1 AND credit_note_id = $2 FOR UPDATE"
        ))
        .bind(workspace_id)
        .bind(credit_note_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get credit note: {}", e))
        })?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        CreditNoteStatus::from_string(&existing.status).ensure_transition(to)?;

        if to == CreditNoteStatus::Issued {
            let has_items: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM line_items WHERE credit_note_id = $1)",
            )
            .bind(credit_note_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check line items: {}", e))
            })?;
            if !has_items {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cannot issue a credit note without line items"
                )));
            }
        }

        let credit_note = sqlx::query_as::<_, CreditNote>(&format!(
            r#"
            UPDATE credit_notes
            SET status = $3,
                issued_utc = CASE WHEN $3 = 'issued' THEN NOW() ELSE issued_utc END,
                settled_utc = CASE WHEN $3 IN ('applied', 'refunded') THEN NOW() ELSE settled_utc END
            WHERE workspace_id = $1 AND credit_note_id = $2
            RETURNING {CREDIT_NOTE_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(credit_note_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to transition credit note: {}", e))
        })?;

        outbox::enqueue_event(
            &mut tx,
            workspace_id,
            &format!("credit_note.{}", to.as_str()),
            json!({
                "credit_note_id": credit_note.credit_note_id,
                "credit_note_number": credit_note.credit_note_number,
                "invoice_id": credit_note.invoice_id,
                "total": credit_note.total,
            }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        DOCUMENTS_TOTAL
            .with_label_values(&["credit_note", to.as_str()])
            .inc();

        info!(
            credit_note_id = %credit_note.credit_note_id,
            status = %credit_note.status,
            "Credit note transitioned"
        );

        Ok(Some(credit_note))
    }
}
