//! Recurring template handlers.

use crate::dtos::{
    validate_line_item_numbers, CreateTemplateRequest, ListResponse, ListTemplatesQuery,
    TemplateDetail, UpdateTemplateRequest,
};
use crate::middleware::WorkspaceContext;
use crate::models::{
    CreateRecurringTemplate, CreateTemplateItem, ListTemplatesFilter, UpdateRecurringTemplate,
};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use platform_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn create_template(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    for item in &request.items {
        item.validate()?;
        validate_line_item_numbers(
            item.quantity,
            item.unit_price,
            item.tax_rate,
            item.discount_percent,
        )?;
    }

    let items = request
        .items
        .into_iter()
        .map(|item| CreateTemplateItem {
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate: item.tax_rate,
            discount_percent: item.discount_percent,
            sort_order: item.sort_order,
        })
        .collect();

    let template = state
        .db
        .create_recurring_template(&CreateRecurringTemplate {
            workspace_id: ws.workspace_id,
            name: request.name,
            contact_id: request.contact_id,
            contact_name: request.contact_name,
            currency: request.currency,
            frequency: request.frequency,
            next_run_date: request.next_run_date,
            auto_send: request.auto_send,
            payment_terms_days: request.payment_terms_days,
            notes: request.notes,
            items,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn get_template(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(template_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let template = state
        .db
        .get_recurring_template(ws.workspace_id, template_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Template not found")))?;

    let items = state
        .db
        .list_template_items(ws.workspace_id, template_id)
        .await?;

    Ok(Json(TemplateDetail { template, items }))
}

pub async fn list_templates(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Query(params): Query<ListTemplatesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListTemplatesFilter {
        active_only: params.active_only,
        page_size: params.page_size,
        page_token: params.page_token,
    };
    let templates = state
        .db
        .list_recurring_templates(ws.workspace_id, &filter)
        .await?;

    Ok(Json(ListResponse::new(templates, params.page_size, |t| {
        t.template_id
    })))
}

pub async fn update_template(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(template_id): Path<Uuid>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let template = state
        .db
        .update_recurring_template(
            ws.workspace_id,
            template_id,
            &UpdateRecurringTemplate {
                name: request.name,
                contact_name: request.contact_name,
                frequency: request.frequency,
                next_run_date: request.next_run_date,
                auto_send: request.auto_send,
                payment_terms_days: request.payment_terms_days,
                notes: request.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Template not found")))?;

    Ok(Json(template))
}

pub async fn activate_template(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(template_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let template = state
        .db
        .set_template_active(ws.workspace_id, template_id, true)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Template not found")))?;

    Ok(Json(template))
}

pub async fn deactivate_template(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(template_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let template = state
        .db
        .set_template_active(ws.workspace_id, template_id, false)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Template not found")))?;

    Ok(Json(template))
}
