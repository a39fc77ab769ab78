//! Quotation handlers.

use crate::dtos::{
    validate_document_discount, validate_line_item_numbers, validate_line_item_update, CreateLineItemRequest,
    CreateQuotationRequest, ListQuotationsQuery, ListResponse, QuotationDetail,
    UpdateLineItemRequest, UpdateQuotationRequest,
};
use crate::middleware::WorkspaceContext;
use crate::models::{
    CreateLineItem, CreateQuotation, LineItemParent, ListQuotationsFilter, UpdateLineItem,
    UpdateQuotation,
};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use platform_core::error::AppError;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

pub async fn create_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Json(request): Json<CreateQuotationRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_document_discount(
        &request.document_discount_kind,
        &request.document_discount_value,
    )?;

    let quotation = state
        .db
        .create_quotation(&CreateQuotation {
            workspace_id: ws.workspace_id,
            contact_id: request.contact_id,
            contact_name: request.contact_name,
            currency: request.currency,
            valid_until: request.valid_until,
            opportunity_id: request.opportunity_id,
            document_discount_kind: request.document_discount_kind,
            document_discount_value: request.document_discount_value,
            notes: request.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quotation = state
        .db
        .get_quotation(ws.workspace_id, quotation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    let line_items = state
        .db
        .list_line_items(ws.workspace_id, LineItemParent::Quotation(quotation_id))
        .await?;

    Ok(Json(QuotationDetail {
        quotation,
        line_items,
    }))
}

pub async fn list_quotations(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Query(params): Query<ListQuotationsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListQuotationsFilter {
        status: params.status,
        contact_id: params.contact_id,
        page_size: params.page_size,
        page_token: params.page_token,
    };
    let quotations = state.db.list_quotations(ws.workspace_id, &filter).await?;

    Ok(Json(ListResponse::new(quotations, params.page_size, |q| {
        q.quotation_id
    })))
}

pub async fn update_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
    Json(request): Json<UpdateQuotationRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_document_discount(
        &request.document_discount_kind,
        &request.document_discount_value,
    )?;

    let quotation = state
        .db
        .update_quotation(
            ws.workspace_id,
            quotation_id,
            &UpdateQuotation {
                contact_name: request.contact_name,
                valid_until: request.valid_until,
                document_discount_kind: request.document_discount_kind,
                document_discount_value: request.document_discount_value,
                notes: request.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    Ok(Json(quotation))
}

pub async fn delete_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .db
        .delete_quotation(ws.workspace_id, quotation_id)
        .await?;

    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Quotation not found or not in draft"
        )));
    }

    Ok(Json(json!({"deleted": true})))
}

pub async fn send_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quotation = state
        .db
        .send_quotation(ws.workspace_id, quotation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    Ok(Json(quotation))
}

pub async fn accept_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quotation = state
        .db
        .accept_quotation(ws.workspace_id, quotation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    Ok(Json(quotation))
}

pub async fn reject_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quotation = state
        .db
        .reject_quotation(ws.workspace_id, quotation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    Ok(Json(quotation))
}

pub async fn expire_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quotation = state
        .db
        .expire_quotation(ws.workspace_id, quotation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    Ok(Json(quotation))
}

pub async fn convert_quotation(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .convert_quotation(ws.workspace_id, quotation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn add_line_item(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(quotation_id): Path<Uuid>,
    Json(request): Json<CreateLineItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_line_item_numbers(
        request.quantity,
        request.unit_price,
        request.tax_rate,
        request.discount_percent,
    )?;

    let line_item = state
        .db
        .add_line_item(
            LineItemParent::Quotation(quotation_id),
            &CreateLineItem {
                workspace_id: ws.workspace_id,
                product_id: request.product_id,
                description: request.description,
                quantity: request.quantity,
                unit_price: request.unit_price,
                tax_rate: request.tax_rate,
                discount_percent: request.discount_percent,
                sort_order: request.sort_order,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(line_item)))
}

pub async fn update_line_item(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path((quotation_id, line_item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateLineItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_line_item_update(&request)?;

    let line_item = state
        .db
        .update_line_item(
            ws.workspace_id,
            LineItemParent::Quotation(quotation_id),
            line_item_id,
            &UpdateLineItem {
                description: request.description,
                quantity: request.quantity,
                unit_price: request.unit_price,
                tax_rate: request.tax_rate,
                discount_percent: request.discount_percent,
                sort_order: request.sort_order,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Line item not found")))?;

    Ok(Json(line_item))
}

pub async fn remove_line_item(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path((quotation_id, line_item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .db
        .remove_line_item(
            ws.workspace_id,
            LineItemParent::Quotation(quotation_id),
            line_item_id,
        )
        .await?;

    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Line item not found")));
    }

    Ok(Json(json!({"deleted": true})))
}
