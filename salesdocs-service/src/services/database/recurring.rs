//! Recurring invoice template operations.
//!
//! Stamping locks the template row and advances `next_run_date` in the
//! same transaction, so an overlapping scheduled run finds nothing due.

use crate::models::{
    CreateRecurringTemplate, Invoice, ListTemplatesFilter, RecurringTemplate, TemplateItem,
    UpdateRecurringTemplate,
};
use crate::models::invoice::InvoiceStatus;
use crate::models::LineItemParent;
use crate::services::database::invoices::INVOICE_COLUMNS;
use crate::services::database::line_items::recompute_parent_totals;
use crate::services::database::{outbox, settings, Database};
use crate::services::metrics::{DB_QUERY_DURATION, DOCUMENTS_TOTAL};
use crate::services::numbering::{allocate_number, DocumentKind};
use crate::services::recurrence::Frequency;
use crate::services::totals;
use chrono::{Days, Utc};
use platform_core::error::AppError;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

const TEMPLATE_COLUMNS: &str = "template_id, workspace_id, name, contact_id, contact_name, \
    currency, frequency, next_run_date, active, auto_send, payment_terms_days, \
    invoices_generated, notes, created_utc";

const TEMPLATE_ITEM_COLUMNS: &str = "item_id, template_id, workspace_id, description, \
    quantity, unit_price, tax_rate, discount_percent, sort_order";

fn parse_frequency(value: &str) -> Result<Frequency, AppError> {
    Frequency::from_string(value)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown frequency: {}", value)))
}

impl Database {
    /// Create a recurring template with its line-item snapshot.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id))]
    pub async fn create_recurring_template(
        &self,
        input: &CreateRecurringTemplate,
    ) -> Result<RecurringTemplate, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_recurring_template"])
            .start_timer();

        parse_frequency(&input.frequency)?;
        if input.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "A recurring template needs at least one line item"
            )));
        }

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

        let template = sqlx::query_as::<_, RecurringTemplate>(&format!(
            r#"
            INSERT INTO recurring_templates (
                template_id, workspace_id, name, contact_id, contact_name, currency,
                frequency, next_run_date, active, auto_send, payment_terms_days, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $11)
            RETURNING {TEMPLATE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.workspace_id)
        .bind(&input.name)
        .bind(input.contact_id)
        .bind(&input.contact_name)
        .bind(&currency)
        .bind(&input.frequency)
        .bind(input.next_run_date)
        .bind(input.auto_send)
        .bind(terms)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create template: {}", e)))?;

        for item in &input.items {
            sqlx::query(
                r#"
                INSERT INTO recurring_template_items (
                    item_id, template_id, workspace_id, description, quantity, unit_price,
                    tax_rate, discount_percent, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(template.template_id)
            .bind(input.workspace_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.tax_rate)
            .bind(item.discount_percent)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert template item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            template_id = %template.template_id,
            name = %template.name,
            "Recurring template created"
        );

        Ok(template)
    }

    /// Get a template by ID.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, template_id = %template_id))]
    pub async fn get_recurring_template(
        &self,
        workspace_id: Uuid,
        template_id: Uuid,
    ) -> Result<Option<RecurringTemplate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_recurring_template"])
            .start_timer();

        let template = sqlx::query_as::<_, RecurringTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_templates \
             WHERE workspace_id = $1 AND template_id = $2"
        ))
        .bind(workspace_id)
        .bind(template_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get template: {}", e)))?;

        timer.observe_duration();

        Ok(template)
    }

    /// Get a template's line-item snapshot.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, template_id = %template_id))]
    pub async fn list_template_items(
        &self,
        workspace_id: Uuid,
        template_id: Uuid,
    ) -> Result<Vec<TemplateItem>, AppError> {
        let items = sqlx::query_as::<_, TemplateItem>(&format!(
            "SELECT {TEMPLATE_ITEM_COLUMNS} FROM recurring_template_items \
             WHERE workspace_id = $1 AND template_id = $2 ORDER BY sort_order"
        ))
        .bind(workspace_id)
        .bind(template_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list template items: {}", e))
        })?;

        Ok(items)
    }

    /// List templates for a workspace.
    #[instrument(skip(self, filter), fields(workspace_id = %workspace_id))]
    pub async fn list_recurring_templates(
        &self,
        workspace_id: Uuid,
        filter: &ListTemplatesFilter,
    ) -> Result<Vec<RecurringTemplate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_recurring_templates"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let templates = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, RecurringTemplate>(&format!(
                r#"
                SELECT {TEMPLATE_COLUMNS}
                FROM recurring_templates
                WHERE workspace_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                  AND template_id > $3
                ORDER BY template_id
                LIMIT $4
                "#
            ))
            .bind(workspace_id)
            .bind(filter.active_only)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        } else {
            sqlx::query_as::<_, RecurringTemplate>(&format!(
                r#"
                SELECT {TEMPLATE_COLUMNS}
                FROM recurring_templates
                WHERE workspace_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                ORDER BY template_id
                LIMIT $3
                "#
            ))
            .bind(workspace_id)
            .bind(filter.active_only)
            .bind(limit)
            .fetch_all(self.pool())
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list templates: {}", e)))?;

        timer.observe_duration();

        Ok(templates)
    }

    /// Update a template.
    #[instrument(skip(self, input), fields(workspace_id = %workspace_id, template_id = %template_id))]
    pub async fn update_recurring_template(
        &self,
        workspace_id: Uuid,
        template_id: Uuid,
        input: &UpdateRecurringTemplate,
    ) -> Result<Option<RecurringTemplate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_recurring_template"])
            .start_timer();

        if let Some(frequency) = &input.frequency {
            parse_frequency(frequency)?;
        }

        let template = sqlx::query_as::<_, RecurringTemplate>(&format!(
            r#"
            UPDATE recurring_templates
            SET name = COALESCE($3, name),
                contact_name = COALESCE($4, contact_name),
                frequency = COALESCE($5, frequency),
                next_run_date = COALESCE($6, next_run_date),
                auto_send = COALESCE($7, auto_send),
                payment_terms_days = COALESCE($8, payment_terms_days),
                notes = COALESCE($9, notes)
            WHERE workspace_id = $1 AND template_id = $2
            RETURNING {TEMPLATE_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(template_id)
        .bind(&input.name)
        .bind(&input.contact_name)
        .bind(&input.frequency)
        .bind(input.next_run_date)
        .bind(input.auto_send)
        .bind(input.payment_terms_days)
        .bind(&input.notes)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update template: {}", e)))?;

        timer.observe_duration();

        Ok(template)
    }

    /// Activate or deactivate a template.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, template_id = %template_id))]
    pub async fn set_template_active(
        &self,
        workspace_id: Uuid,
        template_id: Uuid,
        active: bool,
    ) -> Result<Option<RecurringTemplate>, AppError> {
        let template = sqlx::query_as::<_, RecurringTemplate>(&format!(
            "UPDATE recurring_templates SET active = $3 \
             WHERE workspace_id = $1 AND template_id = $2 \
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(workspace_id)
        .bind(template_id)
        .bind(active)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set template active: {}", e))
        })?;

        if let Some(ref t) = template {
            info!(template_id = %t.template_id, active = active, "Template active flag set");
        }

        Ok(template)
    }

    /// IDs of active templates due for generation.
    #[instrument(skip(self))]
    pub async fn list_due_template_ids(&self) -> Result<Vec<(Uuid, Uuid)>, AppError> {
        let ids: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT workspace_id, template_id
            FROM recurring_templates
            WHERE active = TRUE AND next_run_date <= CURRENT_DATE
            ORDER BY next_run_date
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list due templates: {}", e))
        })?;

        Ok(ids)
    }

    /// Stamp one concrete invoice from a due template.
    ///
    /// Returns `None` when the template is gone, inactive or no longer due
    /// (an overlapping run already handled it).
    #[instrument(skip(self), fields(workspace_id = %workspace_id, template_id = %template_id))]
    pub async fn generate_invoice_from_template(
        &self,
        workspace_id: Uuid,
        template_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_invoice_from_template"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let template = sqlx::query_as::<_, RecurringTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_templates \
             WHERE workspace_id = $1 AND template_id = $2 FOR UPDATE"
        ))
        .bind(workspace_id)
        .bind(template_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get template: {}", e)))?;

        let today = Utc::now().date_naive();
        let Some(template) = template else {
            return Ok(None);
        };
        if !template.active || template.next_run_date > today {
            return Ok(None);
        }

        let frequency = parse_frequency(&template.frequency)?;

        let items = sqlx::query_as::<_, TemplateItem>(&format!(
            "SELECT {TEMPLATE_ITEM_COLUMNS} FROM recurring_template_items \
             WHERE workspace_id = $1 AND template_id = $2 ORDER BY sort_order"
        ))
        .bind(workspace_id)
        .bind(template_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load template items: {}", e))
        })?;

        if items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Template {} has no line items",
                template.name
            )));
        }

        let number = allocate_number(&mut tx, workspace_id, DocumentKind::Invoice).await?;
        let due_date = today + Days::new(template.payment_terms_days.max(0) as u64);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, workspace_id, invoice_number, status, contact_id, contact_name,
                currency, issue_date, due_date, payment_terms_days, recurring_template_id, notes
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(workspace_id)
        .bind(&number)
        .bind(template.contact_id)
        .bind(&template.contact_name)
        .bind(&template.currency)
        .bind(today)
        .bind(due_date)
        .bind(template.payment_terms_days)
        .bind(template_id)
        .bind(&template.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to stamp invoice: {}", e)))?;

        for item in &items {
            let amounts = totals::line_amounts(
                item.quantity,
                item.unit_price,
                item.tax_rate,
                item.discount_percent,
            );
            sqlx::query(
                r#"
                INSERT INTO line_items (
                    line_item_id, workspace_id, invoice_id, description, quantity, unit_price,
                    tax_rate, discount_percent, subtotal, discount_amount, tax_amount, total,
                    sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(workspace_id)
            .bind(invoice.invoice_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.tax_rate)
            .bind(item.discount_percent)
            .bind(amounts.subtotal)
            .bind(amounts.discount_amount)
            .bind(amounts.tax_amount)
            .bind(amounts.total)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to copy template item: {}", e))
            })?;
        }

        recompute_parent_totals(
            &mut tx,
            workspace_id,
            &LineItemParent::Invoice(invoice.invoice_id),
            None,
        )
        .await?;

        // Advancing from the scheduled date (not from today) lets a
        // template that missed runs catch up one period per sweep.
        let next_run = frequency.advance(template.next_run_date);
        sqlx::query(
            r#"
            UPDATE recurring_templates
            SET next_run_date = $3, invoices_generated = invoices_generated + 1
            WHERE workspace_id = $1 AND template_id = $2
            "#,
        )
        .bind(workspace_id)
        .bind(template_id)
        .bind(next_run)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to advance template: {}", e)))?;

        let invoice = if template.auto_send {
            let sent = sqlx::query_as::<_, Invoice>(&format!(
                r#"
                UPDATE invoices
                SET status = 'sent', sent_utc = NOW()
                WHERE workspace_id = $1 AND invoice_id = $2
                RETURNING {INVOICE_COLUMNS}
                "#
            ))
            .bind(workspace_id)
            .bind(invoice.invoice_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to auto-send invoice: {}", e))
            })?;

            outbox::enqueue_event(
                &mut tx,
                workspace_id,
                &format!("invoice.{}", InvoiceStatus::Sent.as_str()),
                json!({
                    "invoice_id": sent.invoice_id,
                    "invoice_number": sent.invoice_number,
                    "contact_id": sent.contact_id,
                    "total": sent.total,
                    "amount_due": sent.amount_due,
                }),
            )
            .await?;

            sent
        } else {
            invoice
        };

        outbox::enqueue_event(
            &mut tx,
            workspace_id,
            "invoice.generated",
            json!({
                "invoice_id": invoice.invoice_id,
                "invoice_number": invoice.invoice_number,
                "template_id": template_id,
                "next_run_date": next_run,
            }),
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        DOCUMENTS_TOTAL
            .with_label_values(&["invoice", "generated"])
            .inc();

        info!(
            template_id = %template_id,
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            next_run_date = %next_run,
            "Invoice generated from template"
        );

        Ok(Some(invoice))
    }
}
