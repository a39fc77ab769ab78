//! Line item operations, shared across the three document types.
//!
//! Every mutation runs in a transaction that locks the parent header,
//! verifies it is still a draft, rewrites the item and persists freshly
//! aggregated totals on the parent. Stored derived columns therefore always
//! equal `f(quantity, unit_price, tax_rate, discount_percent)`.

use crate::models::{CreateLineItem, LineItem, LineItemParent, UpdateLineItem};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::totals::{self, DocumentDiscount, LineAmounts};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

const LINE_ITEM_COLUMNS: &str = "line_item_id, workspace_id, quotation_id, invoice_id, \
    credit_note_id, product_id, description, quantity, unit_price, tax_rate, discount_percent, \
    subtotal, discount_amount, tax_amount, total, sort_order, created_utc";

fn parent_table(parent: &LineItemParent) -> &'static str {
    match parent {
        LineItemParent::Quotation(_) => "quotations",
        LineItemParent::Invoice(_) => "invoices",
        LineItemParent::CreditNote(_) => "credit_notes",
    }
}

fn parent_noun(parent: &LineItemParent) -> &'static str {
    match parent {
        LineItemParent::Quotation(_) => "quotation",
        LineItemParent::Invoice(_) => "invoice",
        LineItemParent::CreditNote(_) => "credit note",
    }
}

/// Lock the parent header row and return its status and document-level
/// discount. `None` when the parent does not exist in the workspace.
pub(crate) async fn lock_parent(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    parent: &LineItemParent,
) -> Result<Option<(String, Option<DocumentDiscount>)>, AppError> {
    let statement = match parent {
        LineItemParent::CreditNote(_) => "SELECT status, NULL::varchar, NULL::numeric \
             FROM credit_notes WHERE workspace_id = $1 AND credit_note_id = $2 FOR UPDATE"
            .to_string(),
        _ => format!(
            "SELECT status, document_discount_kind, document_discount_value FROM {} \
             WHERE workspace_id = $1 AND {} = $2 FOR UPDATE",
            parent_table(parent),
            parent.column(),
        ),
    };

    let row: Option<(String, Option<String>, Option<Decimal>)> = sqlx::query_as(&statement)
        .bind(workspace_id)
        .bind(parent.id())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock parent: {}", e)))?;

    Ok(row.map(|(status, kind, value)| {
        let discount = DocumentDiscount::from_columns(kind.as_deref(), value);
        (status, discount)
    }))
}

fn require_draft(status: &str, parent: &LineItemParent) -> Result<(), AppError> {
    if status == "draft" {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Can only modify line items on a draft {}",
            parent_noun(parent)
        )))
    }
}

/// Load the parent's items and persist freshly aggregated totals.
pub(crate) async fn recompute_parent_totals(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    parent: &LineItemParent,
    discount: Option<DocumentDiscount>,
) -> Result<(), AppError> {
    let items = fetch_items(conn, workspace_id, parent).await?;
    let amounts: Vec<LineAmounts> = items
        .iter()
        .map(|item| LineAmounts {
            subtotal: item.subtotal,
            discount_amount: item.discount_amount,
            tax_amount: item.tax_amount,
            total: item.total,
        })
        .collect();
    let doc = totals::aggregate(&amounts, discount);

    let statement = match parent {
        LineItemParent::Invoice(_) => {
            // amount_due tracks the new total against what is already paid.
            "UPDATE invoices \
             SET subtotal = $3, discount_total = $4, tax_total = $5, total = $6, \
                 amount_due = $6 - amount_paid \
             WHERE workspace_id = $1 AND invoice_id = $2"
                .to_string()
        }
        _ => format!(
            "UPDATE {} SET subtotal = $3, discount_total = $4, tax_total = $5, total = $6 \
             WHERE workspace_id = $1 AND {} = $2",
            parent_table(parent),
            parent.column(),
        ),
    };

    sqlx::query(&statement)
        .bind(workspace_id)
        .bind(parent.id())
        .bind(doc.subtotal)
        .bind(doc.discount_total)
        .bind(doc.tax_total)
        .bind(doc.total)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update totals: {}", e)))?;

    Ok(())
}

pub(crate) async fn fetch_items(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    parent: &LineItemParent,
) -> Result<Vec<LineItem>, AppError> {
    let statement = format!(
        "SELECT {LINE_ITEM_COLUMNS} FROM line_items \
         WHERE workspace_id = $1 AND {} = $2 \
         ORDER BY sort_order, created_utc",
        parent.column(),
    );

    sqlx::query_as::<_, LineItem>(&statement)
        .bind(workspace_id)
        .bind(parent.id())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))
}

/// Insert one item row with precomputed amounts.
pub(crate) async fn insert_item_row(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    parent: &LineItemParent,
    input: &CreateLineItem,
    amounts: &LineAmounts,
) -> Result<LineItem, AppError> {
    let (quotation_id, invoice_id, credit_note_id) = match parent {
        LineItemParent::Quotation(id) => (Some(*id), None, None),
        LineItemParent::Invoice(id) => (None, Some(*id), None),
        LineItemParent::CreditNote(id) => (None, None, Some(*id)),
    };

    sqlx::query_as::<_, LineItem>(&format!(
        r#"
        INSERT INTO line_items (
            line_item_id, workspace_id, quotation_id, invoice_id, credit_note_id, product_id,
            description, quantity, unit_price, tax_rate, discount_percent,
            subtotal, discount_amount, tax_amount, total, sort_order
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {LINE_ITEM_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(workspace_id)
    .bind(quotation_id)
    .bind(invoice_id)
    .bind(credit_note_id)
    .bind(input.product_id)
    .bind(&input.description)
    .bind(input.quantity)
    .bind(input.unit_price)
    .bind(input.tax_rate)
    .bind(input.discount_percent)
    .bind(amounts.subtotal)
    .bind(amounts.discount_amount)
    .bind(amounts.tax_amount)
    .bind(amounts.total)
    .bind(input.sort_order)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e)))
}

impl Database {
    /// Add a line item to a draft document and recompute its totals.
    #[instrument(skip(self, input), fields(workspace_id = %input.workspace_id, parent_id = %parent.id()))]
    pub async fn add_line_item(
        &self,
        parent: LineItemParent,
        input: &CreateLineItem,
    ) -> Result<LineItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_line_item"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let (status, discount) = lock_parent(&mut tx, input.workspace_id, &parent)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("{} not found", parent_noun(&parent)))
            })?;
        require_draft(&status, &parent)?;

        let amounts = totals::line_amounts(
            input.quantity,
            input.unit_price,
            input.tax_rate,
            input.discount_percent,
        );
        let line_item =
            insert_item_row(&mut tx, input.workspace_id, &parent, input, &amounts).await?;

        recompute_parent_totals(&mut tx, input.workspace_id, &parent, discount).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(line_item_id = %line_item.line_item_id, "Line item added");

        Ok(line_item)
    }

    /// Update a line item on a draft document and recompute its totals.
    #[instrument(skip(self, input), fields(workspace_id = %workspace_id, line_item_id = %line_item_id))]
    pub async fn update_line_item(
        &self,
        workspace_id: Uuid,
        parent: LineItemParent,
        line_item_id: Uuid,
        input: &UpdateLineItem,
    ) -> Result<Option<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_line_item"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let Some((status, discount)) = lock_parent(&mut tx, workspace_id, &parent).await? else {
            return Ok(None);
        };
        require_draft(&status, &parent)?;

        let current = sqlx::query_as::<_, LineItem>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items \
             WHERE workspace_id = $1 AND {} = $2 AND line_item_id = $3 FOR UPDATE",
            parent.column(),
        ))
        .bind(workspace_id)
        .bind(parent.id())
        .bind(line_item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line item: {}", e)))?;

        let Some(current) = current else {
            return Ok(None);
        };

        // Merge the partial update, then recompute every derived column.
        let quantity = input.quantity.unwrap_or(current.quantity);
        let unit_price = input.unit_price.unwrap_or(current.unit_price);
        let tax_rate = input.tax_rate.unwrap_or(current.tax_rate);
        let discount_percent = input.discount_percent.unwrap_or(current.discount_percent);
        let amounts = totals::line_amounts(quantity, unit_price, tax_rate, discount_percent);

        let line_item = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            UPDATE line_items
            SET description = COALESCE($4, description),
                quantity = $5,
                unit_price = $6,
                tax_rate = $7,
                discount_percent = $8,
                subtotal = $9,
                discount_amount = $10,
                tax_amount = $11,
                total = $12,
                sort_order = COALESCE($13, sort_order)
            WHERE workspace_id = $1 AND {} = $2 AND line_item_id = $3
            RETURNING {LINE_ITEM_COLUMNS}
            "#,
            parent.column(),
        ))
        .bind(workspace_id)
        .bind(parent.id())
        .bind(line_item_id)
        .bind(&input.description)
        .bind(quantity)
        .bind(unit_price)
        .bind(tax_rate)
        .bind(discount_percent)
        .bind(amounts.subtotal)
        .bind(amounts.discount_amount)
        .bind(amounts.tax_amount)
        .bind(amounts.total)
        .bind(input.sort_order)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update line item: {}", e))
        })?;

        recompute_parent_totals(&mut tx, workspace_id, &parent, discount).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(Some(line_item))
    }

    /// Remove a line item from a draft document and recompute its totals.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, line_item_id = %line_item_id))]
    pub async fn remove_line_item(
        &self,
        workspace_id: Uuid,
        parent: LineItemParent,
        line_item_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_line_item"])
            .start_timer();

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let Some((status, discount)) = lock_parent(&mut tx, workspace_id, &parent).await? else {
            return Ok(false);
        };
        require_draft(&status, &parent)?;

        let result = sqlx::query(&format!(
            "DELETE FROM line_items \
             WHERE workspace_id = $1 AND {} = $2 AND line_item_id = $3",
            parent.column(),
        ))
        .bind(workspace_id)
        .bind(parent.id())
        .bind(line_item_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to remove line item: {}", e))
        })?;

        let removed = result.rows_affected() > 0;
        if removed {
            recompute_parent_totals(&mut tx, workspace_id, &parent, discount).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(removed)
    }

    /// Get line items for a document.
    #[instrument(skip(self), fields(workspace_id = %workspace_id, parent_id = %parent.id()))]
    pub async fn list_line_items(
        &self,
        workspace_id: Uuid,
        parent: LineItemParent,
    ) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_line_items"])
            .start_timer();

        let mut conn = self.pool().acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        let items = fetch_items(&mut conn, workspace_id, &parent).await?;

        timer.observe_duration();

        Ok(items)
    }
}
