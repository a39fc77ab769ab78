//! Scheduled job triggers.
//!
//! These routes are called by an external cron scheduler and are guarded
//! by the shared-secret bearer middleware (`CRON_SECRET`). Each handler
//! runs one sweep to completion and returns its summary.

use crate::services::metrics::CRON_RUNS_TOTAL;
use crate::startup::AppState;
use crate::workers::{OutboxProcessor, RecurringRunner, ReminderSweep};
use axum::{extract::State, response::IntoResponse, Json};
use platform_core::error::AppError;
use std::time::Duration;

const OUTBOX_BATCH_SIZE: i64 = 100;

pub async fn run_recurring_invoices(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let runner = RecurringRunner::new(state.db.clone());
    let summary = runner.run_once().await.inspect_err(|_| {
        CRON_RUNS_TOTAL
            .with_label_values(&["recurring_invoices", "error"])
            .inc();
    })?;

    CRON_RUNS_TOTAL
        .with_label_values(&["recurring_invoices", "ok"])
        .inc();

    Ok(Json(summary))
}

pub async fn run_reminders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let sweep = ReminderSweep::new(state.db.clone());
    let summary = sweep.run_once().await.inspect_err(|_| {
        CRON_RUNS_TOTAL
            .with_label_values(&["reminders", "error"])
            .inc();
    })?;

    CRON_RUNS_TOTAL.with_label_values(&["reminders", "ok"]).inc();

    Ok(Json(summary))
}

pub async fn run_outbox(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let processor = OutboxProcessor::new(
        state.db.clone(),
        state.http_client.clone(),
        Duration::from_secs(state.config.webhook_timeout_secs),
    );
    let summary = processor.run_once(OUTBOX_BATCH_SIZE).await.inspect_err(|_| {
        CRON_RUNS_TOTAL.with_label_values(&["outbox", "error"]).inc();
    })?;

    CRON_RUNS_TOTAL.with_label_values(&["outbox", "ok"]).inc();

    Ok(Json(summary))
}
