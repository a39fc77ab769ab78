//! Workspace settings handlers.

use crate::dtos::UpdateSettingsRequest;
use crate::middleware::WorkspaceContext;
use crate::models::UpdateInvoiceSettings;
use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use platform_core::error::AppError;
use validator::Validate;

pub async fn get_settings(
    State(state): State<AppState>,
    ws: WorkspaceContext,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.db.get_settings(ws.workspace_id).await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    if request.default_payment_terms_days.is_some_and(|d| d < 0) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment terms must not be negative"
        )));
    }

    let settings = state
        .db
        .update_settings(
            ws.workspace_id,
            &UpdateInvoiceSettings {
                quotation_prefix: request.quotation_prefix,
                invoice_prefix: request.invoice_prefix,
                credit_note_prefix: request.credit_note_prefix,
                default_currency: request.default_currency,
                default_payment_terms_days: request.default_payment_terms_days,
                company_name: request.company_name,
                company_address: request.company_address,
                company_tax_id: request.company_tax_id,
                accent_color: request.accent_color,
                automation_webhook_url: request.automation_webhook_url,
                automation_webhook_secret: request.automation_webhook_secret,
            },
        )
        .await?;

    Ok(Json(settings))
}
