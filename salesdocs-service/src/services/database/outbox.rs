//! Outbox event operations.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` inside a single UPDATE so
//! overlapping processor runs never pick up the same event twice.

use crate::models::OutboxEvent;
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use platform_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

const EVENT_COLUMNS: &str = "event_id, workspace_id, event_type, payload, status, attempts, \
    next_attempt_utc, last_error, created_utc, published_utc";

/// Persist a domain event on the caller's connection, so the event commits
/// atomically with the state change that produced it.
pub(crate) async fn enqueue_event(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO outbox_events (event_id, workspace_id, event_type, payload, status, attempts, next_attempt_utc)
        VALUES ($1, $2, $3, $4, 'pending', 0, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(workspace_id)
    .bind(event_type)
    .bind(payload)
    .execute(conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to enqueue event: {}", e)))?;

    Ok(())
}

/// Outbox backlog counts for the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct OutboxCounts {
    pub pending: i64,
    pub published: i64,
    pub failed: i64,
}

impl Database {
    /// Persist a domain event outside any caller transaction (used by the
    /// scheduled sweeps).
    #[instrument(skip(self, payload), fields(workspace_id = %workspace_id, event_type = %event_type))]
    pub async fn enqueue_workspace_event(
        &self,
        workspace_id: Uuid,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        let mut conn = self.pool().acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        enqueue_event(&mut conn, workspace_id, event_type, payload).await
    }

    /// Claim due pending events, bumping their attempt counter. Events
    /// locked by a concurrent run are skipped.
    #[instrument(skip(self))]
    pub async fn claim_due_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["claim_due_events"])
            .start_timer();

        let events = sqlx::query_as::<_, OutboxEvent>(&format!(
            r#"
            UPDATE outbox_events
            SET attempts = attempts + 1
            WHERE event_id IN (
                SELECT event_id FROM outbox_events
                WHERE status = 'pending' AND next_attempt_utc <= NOW()
                ORDER BY next_attempt_utc
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to claim events: {}", e)))?;

        timer.observe_duration();

        Ok(events)
    }

    /// Mark an event as delivered.
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn mark_event_published(&self, event_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_event_published"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'published', published_utc = NOW(), last_error = NULL
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to mark published: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    /// Schedule the next delivery attempt after a failure.
    #[instrument(skip(self, error), fields(event_id = %event_id))]
    pub async fn schedule_event_retry(
        &self,
        event_id: Uuid,
        delay_secs: i64,
        error: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["schedule_event_retry"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE outbox_events
            SET next_attempt_utc = NOW() + make_interval(secs => $2::double precision),
                last_error = $3
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(delay_secs)
        .bind(error)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to schedule retry: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }

    /// Park an event in the terminal failed state for manual inspection.
    #[instrument(skip(self, error), fields(event_id = %event_id))]
    pub async fn mark_event_failed(&self, event_id: Uuid, error: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_event_failed"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'failed', last_error = $2
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(error)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to mark failed: {}", e)))?;

        timer.observe_duration();

        info!(event_id = %event_id, "Outbox event moved to failed");

        Ok(())
    }

    /// List terminally failed events, newest first.
    #[instrument(skip(self))]
    pub async fn list_failed_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_failed_events"])
            .start_timer();

        let events = sqlx::query_as::<_, OutboxEvent>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM outbox_events
            WHERE status = 'failed'
            ORDER BY created_utc DESC
            LIMIT $1
            "#
        ))
        .bind(limit.clamp(1, 500))
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list failed events: {}", e))
        })?;

        timer.observe_duration();

        Ok(events)
    }

    /// Backlog counts by status.
    #[instrument(skip(self))]
    pub async fn outbox_counts(&self) -> Result<OutboxCounts, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["outbox_counts"])
            .start_timer();

        let (pending, published, failed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'pending'),
                   COUNT(*) FILTER (WHERE status = 'published'),
                   COUNT(*) FILTER (WHERE status = 'failed')
            FROM outbox_events
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count events: {}", e)))?;

        timer.observe_duration();

        Ok(OutboxCounts {
            pending,
            published,
            failed,
        })
    }
}
