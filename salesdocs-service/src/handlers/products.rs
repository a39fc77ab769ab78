//! Product catalog handlers.

use crate::dtos::{CreateProductRequest, ListProductsQuery, ListResponse, UpdateProductRequest};
use crate::models::{CreateProduct, ListProductsFilter, UpdateProduct};
use crate::middleware::WorkspaceContext;
use crate::services::database::ProductRemoval;
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

pub async fn create_product(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let product = state
        .db
        .create_product(&CreateProduct {
            workspace_id: ws.workspace_id,
            name: request.name,
            unit_price: request.unit_price,
            tax_rate: request.tax_rate,
            unit_label: request.unit_label,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .db
        .get_product(ws.workspace_id, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

pub async fn list_products(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Query(params): Query<ListProductsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListProductsFilter {
        active_only: params.active_only,
        page_size: params.page_size,
        page_token: params.page_token,
    };
    let products = state.db.list_products(ws.workspace_id, &filter).await?;

    Ok(Json(ListResponse::new(products, params.page_size, |p| {
        p.product_id
    })))
}

pub async fn update_product(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let product = state
        .db
        .update_product(
            ws.workspace_id,
            product_id,
            &UpdateProduct {
                name: request.name,
                unit_price: request.unit_price,
                tax_rate: request.tax_rate,
                unit_label: request.unit_label,
                active: request.active,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    ws: WorkspaceContext,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .db
        .delete_product(ws.workspace_id, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    let body = match outcome {
        ProductRemoval::Deleted => json!({"deleted": true, "deactivated": false}),
        ProductRemoval::Deactivated => json!({"deleted": false, "deactivated": true}),
    };

    Ok(Json(body))
}
