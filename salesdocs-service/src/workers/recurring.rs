//! Recurring invoice generation sweep.

use crate::services::Database;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Outcome of one generation sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RecurringRunSummary {
    pub due: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Scans active templates whose next run date has arrived and stamps one
/// invoice per template. One template's failure never blocks the others.
pub struct RecurringRunner {
    db: Arc<Database>,
}

impl RecurringRunner {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RecurringRunSummary, platform_core::error::AppError> {
        let due = self.db.list_due_template_ids().await?;
        let mut summary = RecurringRunSummary {
            due: due.len(),
            ..Default::default()
        };

        for (workspace_id, template_id) in due {
            match self
                .db
                .generate_invoice_from_template(workspace_id, template_id)
                .await
            {
                Ok(Some(invoice)) => {
                    summary.generated += 1;
                    info!(
                        template_id = %template_id,
                        invoice_id = %invoice.invoice_id,
                        "Generated recurring invoice"
                    );
                }
                // Another run got here first, or the template was
                // deactivated between the scan and the stamp.
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        template_id = %template_id,
                        workspace_id = %workspace_id,
                        error = %e,
                        "Recurring generation failed for template"
                    );
                }
            }
        }

        info!(
            due = summary.due,
            generated = summary.generated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Recurring invoice sweep finished"
        );

        Ok(summary)
    }
}
