//! Invoice handlers. Responses carry `effective_status` so overdue is
//! always derived from the due date, never read from the stored column.

use crate::dtos::{
    validate_document_discount, validate_line_item_numbers, validate_line_item_update, CreateInvoiceRequest,
    CreateLineItemRequest, InvoiceDetail, InvoiceResponse, ListInvoicesQuery, ListResponse,
    RecordPaymentRequest, UpdateInvoiceRequest, UpdateLineItemRequest,
};
use crate::middleware::WorkspaceContext;
use crate::models::{
    CreateInvoice, CreateLineItem, CreatePayment, LineItemParent, ListInvoicesFilter,
    UpdateInvoice, UpdateLineItem,
};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use platform_core::error::AppError;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

pub async fn create_invoice(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_document_discount(
        &request.document_discount_kind,
        &request.document_discount_value,
    )?;
    if request.payment_terms_days.is_some_and(|d| d < 0) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment terms must not be negative"
        )));
    }

    let invoice = state
        .db
        .create_invoice(&CreateInvoice {
            workspace_id: ws.workspace_id,
            contact_id: request.contact_id,
            contact_name: request.contact_name,
            currency: request.currency,
            issue_date: request.issue_date,
            due_date: request.due_date,
            payment_terms_days: request.payment_terms_days,
            document_discount_kind: request.document_discount_kind,
            document_discount_value: request.document_discount_value,
            quotation_id: None,
            recurring_template_id: None,
            notes: request.notes,
        })
        .await?;

    let today = Utc::now().date_naive();
    Ok((StatusCode::CREATED, Json(InvoiceResponse::new(invoice, today))))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .get_invoice(ws.workspace_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let line_items = state
        .db
        .list_line_items(ws.workspace_id, LineItemParent::Invoice(invoice_id))
        .await?;
    let payments = state.db.list_payments(ws.workspace_id, invoice_id).await?;

    let today = Utc::now().date_naive();
    Ok(Json(InvoiceDetail {
        invoice: InvoiceResponse::new(invoice, today),
        line_items,
        payments,
    }))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Query(params): Query<ListInvoicesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListInvoicesFilter {
        status: params.status,
        contact_id: params.contact_id,
        overdue_only: params.overdue,
        page_size: params.page_size,
        page_token: params.page_token,
    };
    let invoices = state.db.list_invoices(ws.workspace_id, &filter).await?;

    let today = Utc::now().date_naive();
    let responses: Vec<InvoiceResponse> = invoices
        .into_iter()
        .map(|invoice| InvoiceResponse::new(invoice, today))
        .collect();

    Ok(Json(ListResponse::new(responses, params.page_size, |r| {
        r.invoice.invoice_id
    })))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_document_discount(
        &request.document_discount_kind,
        &request.document_discount_value,
    )?;

    let invoice = state
        .db
        .update_invoice(
            ws.workspace_id,
            invoice_id,
            &UpdateInvoice {
                contact_name: request.contact_name,
                issue_date: request.issue_date,
                due_date: request.due_date,
                payment_terms_days: request.payment_terms_days,
                document_discount_kind: request.document_discount_kind,
                document_discount_value: request.document_discount_value,
                notes: request.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let today = Utc::now().date_naive();
    Ok(Json(InvoiceResponse::new(invoice, today)))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.db.delete_invoice(ws.workspace_id, invoice_id).await?;

    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Invoice not found or not in draft"
        )));
    }

    Ok(Json(json!({"deleted": true})))
}

pub async fn send_invoice(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .send_invoice(ws.workspace_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let today = Utc::now().date_naive();
    Ok(Json(InvoiceResponse::new(invoice, today)))
}

pub async fn mark_viewed(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .mark_invoice_viewed(ws.workspace_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let today = Utc::now().date_naive();
    Ok(Json(InvoiceResponse::new(invoice, today)))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .cancel_invoice(ws.workspace_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let today = Utc::now().date_naive();
    Ok(Json(InvoiceResponse::new(invoice, today)))
}

pub async fn record_payment(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let payment_date = request
        .payment_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let (payment, invoice) = state
        .db
        .record_payment(&CreatePayment {
            workspace_id: ws.workspace_id,
            invoice_id,
            amount: request.amount,
            method: request.method,
            reference: request.reference,
            payment_date,
            notes: request.notes,
        })
        .await?;

    let today = Utc::now().date_naive();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "payment": payment,
            "invoice": InvoiceResponse::new(invoice, today),
        })),
    ))
}

pub async fn list_payments(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payments = state.db.list_payments(ws.workspace_id, invoice_id).await?;
    Ok(Json(payments))
}

pub async fn add_line_item(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(invoice_id): Path<Uuid>,
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
            LineItemParent::Invoice(invoice_id),
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
    Path((invoice_id, line_item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateLineItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_line_item_update(&request)?;

    let line_item = state
        .db
        .update_line_item(
            ws.workspace_id,
            LineItemParent::Invoice(invoice_id),
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
    Path((invoice_id, line_item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .db
        .remove_line_item(
            ws.workspace_id,
            LineItemParent::Invoice(invoice_id),
            line_item_id,
        )
        .await?;

    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Line item not found")));
    }

    Ok(Json(json!({"deleted": true})))
}
