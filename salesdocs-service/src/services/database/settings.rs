//! Workspace settings operations.

use crate::models::{InvoiceSettings, UpdateInvoiceSettings};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use platform_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

const SETTINGS_COLUMNS: &str = "workspace_id, quotation_prefix, invoice_prefix, \
    credit_note_prefix, quotation_counter, invoice_counter, credit_note_counter, \
    default_currency, default_payment_terms_days, company_name, company_address, \
    company_tax_id, accent_color, automation_webhook_url, automation_webhook_secret, \
    created_utc";

/// Fetch (creating with defaults when missing) on an existing connection,
/// so settings reads participate in the caller's transaction.
pub(crate) async fn get_or_create_on(
    conn: &mut PgConnection,
    workspace_id: Uuid,
) -> Result<InvoiceSettings, AppError> {
    sqlx::query(
        r#"
        INSERT INTO invoice_settings (workspace_id)
        VALUES ($1)
        ON CONFLICT (workspace_id) DO NOTHING
        "#,
    )
    .bind(workspace_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to ensure settings: {}", e)))?;

    let settings = sqlx::query_as::<_, InvoiceSettings>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM invoice_settings WHERE workspace_id = $1"
    ))
    .bind(workspace_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get settings: {}", e)))?;

    Ok(settings)
}

impl Database {
    /// Get workspace settings, creating the row with defaults on first use.
    #[instrument(skip(self), fields(workspace_id = %workspace_id))]
    pub async fn get_settings(&self, workspace_id: Uuid) -> Result<InvoiceSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_settings"])
            .start_timer();

        let mut conn = self.pool().acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        let settings = get_or_create_on(&mut conn, workspace_id).await?;

        timer.observe_duration();

        Ok(settings)
    }

    /// Update workspace settings. Numbering counters are not updatable.
    #[instrument(skip(self, input), fields(workspace_id = %workspace_id))]
    pub async fn update_settings(
        &self,
        workspace_id: Uuid,
        input: &UpdateInvoiceSettings,
    ) -> Result<InvoiceSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_settings"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        get_or_create_on(&mut tx, workspace_id).await?;

        let settings = sqlx::query_as::<_, InvoiceSettings>(&format!(
            r#"
            UPDATE invoice_settings
            SET quotation_prefix = COALESCE($2, quotation_prefix),
                invoice_prefix = COALESCE($3, invoice_prefix),
                credit_note_prefix = COALESCE($4, credit_note_prefix),
                default_currency = COALESCE($5, default_currency),
                default_payment_terms_days = COALESCE($6, default_payment_terms_days),
                company_name = COALESCE($7, company_name),
                company_address = COALESCE($8, company_address),
                company_tax_id = COALESCE($9, company_tax_id),
                accent_color = COALESCE($10, accent_color),
                automation_webhook_url = COALESCE($11, automation_webhook_url),
                automation_webhook_secret = COALESCE($12, automation_webhook_secret)
            WHERE workspace_id = $1
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(&input.quotation_prefix)
        .bind(&input.invoice_prefix)
        .bind(&input.credit_note_prefix)
        .bind(&input.default_currency)
        .bind(input.default_payment_terms_days)
        .bind(&input.company_name)
        .bind(&input.company_address)
        .bind(&input.company_tax_id)
        .bind(&input.accent_color)
        .bind(&input.automation_webhook_url)
        .bind(&input.automation_webhook_secret)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update settings: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(workspace_id = %workspace_id, "Workspace settings updated");

        Ok(settings)
    }
}
