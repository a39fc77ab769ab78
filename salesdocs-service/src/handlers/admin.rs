//! Platform operator handlers.

use crate::middleware::AdminUser;
use crate::startup::AppState;
use axum::{extract::Query, extract::State, response::IntoResponse, Json};
use platform_core::error::AppError;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, Default)]
pub struct FailedEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// Terminally failed outbox events, for manual remediation.
pub async fn list_failed_events(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(params): Query<FailedEventsQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(admin = %admin.email, "Failed outbox events requested");

    let counts = state.db.outbox_counts().await?;
    let events = state.db.list_failed_events(params.limit).await?;

    Ok(Json(json!({
        "counts": counts,
        "events": events,
    })))
}
