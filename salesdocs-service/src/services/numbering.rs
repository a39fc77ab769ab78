//! Sequential document number allocation.
//!
//! Numbers look like `FAC-2026-0001`: workspace prefix, allocation year,
//! zero-padded sequence. Counters are per workspace and per document kind
//! and never reset, so numbers are unique and monotonically increasing.
//!
//! Allocation is a single `UPDATE ... RETURNING` on the settings row. The
//! increment and the read happen in one statement, so concurrent requests
//! for the same workspace can never observe the same counter value.

use chrono::{Datelike, Utc};
use platform_core::error::AppError;
use sqlx::PgConnection;
use uuid::Uuid;

/// Document kinds that draw from a numbering counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Quotation,
    Invoice,
    CreditNote,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation",
            DocumentKind::Invoice => "invoice",
            DocumentKind::CreditNote => "credit_note",
        }
    }

    fn counter_column(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation_counter",
            DocumentKind::Invoice => "invoice_counter",
            DocumentKind::CreditNote => "credit_note_counter",
        }
    }

    fn prefix_column(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation_prefix",
            DocumentKind::Invoice => "invoice_prefix",
            DocumentKind::CreditNote => "credit_note_prefix",
        }
    }
}

/// Format an allocated sequence as a human-readable document number.
/// The sequence is zero-padded to four digits and widens beyond 9999.
pub fn format_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, year, sequence)
}

/// Allocate the next number for a workspace/document-kind pair.
///
/// Runs on the caller's connection so document creation and number
/// allocation commit or roll back together.
pub async fn allocate_number(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    kind: DocumentKind,
) -> Result<String, AppError> {
    // Make sure the settings row exists before bumping its counter.
    sqlx::query(
        r#"
        INSERT INTO invoice_settings (workspace_id)
        VALUES ($1)
        ON CONFLICT (workspace_id) DO NOTHING
        "#,
    )
    .bind(workspace_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to ensure settings: {}", e)))?;

    let counter = kind.counter_column();
    let prefix = kind.prefix_column();
    let statement = format!(
        "UPDATE invoice_settings \
         SET {counter} = {counter} + 1 \
         WHERE workspace_id = $1 \
         RETURNING {counter}, {prefix}",
    );

    let (sequence, prefix): (i64, String) = sqlx::query_as(&statement)
        .bind(workspace_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to allocate number: {}", e))
        })?;

    Ok(format_number(&prefix, Utc::now().year(), sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded_to_four_digits() {
        assert_eq!(format_number("FAC", 2026, 1), "FAC-2026-0001");
        assert_eq!(format_number("OFF", 2026, 42), "OFF-2026-0042");
        assert_eq!(format_number("CRE", 2026, 9999), "CRE-2026-9999");
    }

    #[test]
    fn sequences_widen_beyond_9999() {
        assert_eq!(format_number("FAC", 2026, 10000), "FAC-2026-10000");
    }

    #[test]
    fn kinds_map_to_distinct_counters() {
        let columns = [
            DocumentKind::Quotation.counter_column(),
            DocumentKind::Invoice.counter_column(),
            DocumentKind::CreditNote.counter_column(),
        ];
        assert_eq!(
            columns.len(),
            columns.iter().collect::<std::collections::HashSet<_>>().len()
        );
    }
}
