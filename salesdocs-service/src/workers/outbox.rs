//! Outbox event delivery.
//!
//! At-least-once: a claimed event is delivered to the workspace's
//! automation webhook, retried on a fixed 30s/60s/120s schedule and parked
//! as `failed` after the fourth attempt for manual inspection. Workspaces
//! without a webhook configured complete their events immediately.

use crate::models::OutboxEvent;
use crate::services::metrics::OUTBOX_EVENTS_TOTAL;
use crate::services::Database;
use chrono::Utc;
use platform_core::webhook::{sign_payload, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Total delivery attempts before an event is terminally failed.
pub const MAX_ATTEMPTS: i32 = 4;

/// Fixed backoff schedule between attempts.
pub const RETRY_SCHEDULE_SECS: [i64; 3] = [30, 60, 120];

/// Delay before the next attempt after `attempts_made` failed tries, or
/// `None` when the attempt budget is spent.
pub fn retry_delay_secs(attempts_made: i32) -> Option<i64> {
    if attempts_made >= MAX_ATTEMPTS {
        return None;
    }
    RETRY_SCHEDULE_SECS
        .get((attempts_made - 1).max(0) as usize)
        .copied()
}

/// Outcome of one processor run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutboxRunSummary {
    pub claimed: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct OutboxProcessor {
    db: Arc<Database>,
    client: reqwest::Client,
    timeout: Duration,
}

impl OutboxProcessor {
    pub fn new(db: Arc<Database>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            db,
            client,
            timeout,
        }
    }

    /// Claim and deliver one batch of due events. Per-event failures are
    /// isolated; a delivery error only affects that event's schedule.
    #[instrument(skip(self))]
    pub async fn run_once(
        &self,
        batch_size: i64,
    ) -> Result<OutboxRunSummary, platform_core::error::AppError> {
        let events = self.db.claim_due_events(batch_size).await?;
        let mut summary = OutboxRunSummary {
            claimed: events.len(),
            ..Default::default()
        };

        for event in events {
            match self.deliver(&event).await {
                Ok(()) => {
                    if let Err(e) = self.db.mark_event_published(event.event_id).await {
                        error!(event_id = %event.event_id, error = %e, "Failed to mark event published");
                        summary.failed += 1;
                        continue;
                    }
                    OUTBOX_EVENTS_TOTAL.with_label_values(&["published"]).inc();
                    summary.published += 1;
                }
                Err(delivery_error) => match retry_delay_secs(event.attempts) {
                    Some(delay) => {
                        warn!(
                            event_id = %event.event_id,
                            attempts = event.attempts,
                            delay_secs = delay,
                            error = %delivery_error,
                            "Delivery failed, retry scheduled"
                        );
                        if let Err(e) = self
                            .db
                            .schedule_event_retry(event.event_id, delay, &delivery_error)
                            .await
                        {
                            error!(event_id = %event.event_id, error = %e, "Failed to schedule retry");
                        }
                        OUTBOX_EVENTS_TOTAL.with_label_values(&["retried"]).inc();
                        summary.retried += 1;
                    }
                    None => {
                        error!(
                            event_id = %event.event_id,
                            attempts = event.attempts,
                            error = %delivery_error,
                            "Delivery failed terminally"
                        );
                        if let Err(e) = self
                            .db
                            .mark_event_failed(event.event_id, &delivery_error)
                            .await
                        {
                            error!(event_id = %event.event_id, error = %e, "Failed to mark event failed");
                        }
                        OUTBOX_EVENTS_TOTAL.with_label_values(&["failed"]).inc();
                        summary.failed += 1;
                    }
                },
            }
        }

        info!(
            claimed = summary.claimed,
            published = summary.published,
            retried = summary.retried,
            failed = summary.failed,
            "Outbox run finished"
        );

        Ok(summary)
    }

    async fn deliver(&self, event: &OutboxEvent) -> Result<(), String> {
        let settings = self
            .db
            .get_settings(event.workspace_id)
            .await
            .map_err(|e| format!("settings lookup failed: {}", e))?;

        let Some(url) = settings.automation_webhook_url else {
            debug!(event_id = %event.event_id, "No automation webhook configured");
            return Ok(());
        };

        let body = json!({
            "event_id": event.event_id,
            "event_type": event.event_type,
            "workspace_id": event.workspace_id,
            "payload": event.payload,
            "created_utc": event.created_utc,
        })
        .to_string();

        let timestamp = Utc::now().timestamp();
        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .header(TIMESTAMP_HEADER, timestamp.to_string());

        if let Some(secret) = &settings.automation_webhook_secret {
            let signature = sign_payload(secret, timestamp, &body)
                .map_err(|e| format!("signing failed: {}", e))?;
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("webhook returned {}", response.status()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_30_60_120() {
        assert_eq!(retry_delay_secs(1), Some(30));
        assert_eq!(retry_delay_secs(2), Some(60));
        assert_eq!(retry_delay_secs(3), Some(120));
    }

    #[test]
    fn fourth_attempt_is_terminal() {
        assert_eq!(retry_delay_secs(MAX_ATTEMPTS), None);
        assert_eq!(retry_delay_secs(MAX_ATTEMPTS + 1), None);
    }

    #[test]
    fn zero_attempts_falls_back_to_first_delay() {
        assert_eq!(retry_delay_secs(0), Some(30));
    }
}
