//! Credit note handlers.

use crate::dtos::{
    validate_line_item_numbers, validate_line_item_update, CreateCreditNoteRequest, CreateLineItemRequest, CreditNoteDetail,
    ListCreditNotesQuery, ListResponse, UpdateCreditNoteRequest, UpdateLineItemRequest,
};
use crate::middleware::WorkspaceContext;
use crate::models::{
    CreateCreditNote, CreateLineItem, LineItemParent, ListCreditNotesFilter, UpdateCreditNote,
    UpdateLineItem,
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

pub async fn create_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Json(request): Json<CreateCreditNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let credit_note = state
        .db
        .create_credit_note(&CreateCreditNote {
            workspace_id: ws.workspace_id,
            contact_id: request.contact_id,
            contact_name: request.contact_name,
            currency: request.currency,
            invoice_id: request.invoice_id,
            reason: request.reason,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(credit_note)))
}

pub async fn get_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let credit_note = state
        .db
        .get_credit_note(ws.workspace_id, credit_note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;

    let line_items = state
        .db
        .list_line_items(ws.workspace_id, LineItemParent::CreditNote(credit_note_id))
        .await?;

    Ok(Json(CreditNoteDetail {
        credit_note,
        line_items,
    }))
}

pub async fn list_credit_notes(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Query(params): Query<ListCreditNotesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListCreditNotesFilter {
        status: params.status,
        invoice_id: params.invoice_id,
        page_size: params.page_size,
        page_token: params.page_token,
    };
    let credit_notes = state.db.list_credit_notes(ws.workspace_id, &filter).await?;

    Ok(Json(ListResponse::new(credit_notes, params.page_size, |c| {
        c.credit_note_id
    })))
}

pub async fn update_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
    Json(request): Json<UpdateCreditNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let credit_note = state
        .db
        .update_credit_note(
            ws.workspace_id,
            credit_note_id,
            &UpdateCreditNote {
                contact_name: request.contact_name,
                reason: request.reason,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;

    Ok(Json(credit_note))
}

pub async fn delete_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .db
        .delete_credit_note(ws.workspace_id, credit_note_id)
        .await?;

    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Credit note not found or not in draft"
        )));
    }

    Ok(Json(json!({"deleted": true})))
}

pub async fn issue_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let credit_note = state
        .db
        .issue_credit_note(ws.workspace_id, credit_note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;

    Ok(Json(credit_note))
}

pub async fn apply_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let credit_note = state
        .db
        .apply_credit_note(ws.workspace_id, credit_note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;

    Ok(Json(credit_note))
}

pub async fn refund_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let credit_note = state
        .db
        .refund_credit_note(ws.workspace_id, credit_note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;

    Ok(Json(credit_note))
}

pub async fn cancel_credit_note(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let credit_note = state
        .db
        .cancel_credit_note(ws.workspace_id, credit_note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credit note not found")))?;

    Ok(Json(credit_note))
}

pub async fn add_line_item(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(credit_note_id): Path<Uuid>,
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
            LineItemParent::CreditNote(credit_note_id),
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
    Path((credit_note_id, line_item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateLineItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_line_item_update(&request)?;

    let line_item = state
        .db
        .update_line_item(
            ws.workspace_id,
            LineItemParent::CreditNote(credit_note_id),
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
    Path((credit_note_id, line_item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .db
        .remove_line_item(
            ws.workspace_id,
            LineItemParent::CreditNote(credit_note_id),
            line_item_id,
        )
        .await?;

    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Line item not found")));
    }

    Ok(Json(json!({"deleted": true})))
}
