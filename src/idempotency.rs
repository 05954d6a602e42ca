//! At-most-once execution documents.
//!
//! Stock effects derived from another document (purchase-return execution,
//! shipment and inbound reversals, count adjustments) are keyed by the unique
//! pair `(source_document_no, operation)` on `stock_documents`. The guard is
//! the standard try-insert / on-conflict-reread pattern: whoever inserts the
//! row applies the stock effect; everyone else gets the winner's row back and
//! must not mutate anything.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::movement_log::MovementOperation;
use crate::entities::stock_document::{self, ExecutionStatus};
use crate::entities::stock_document_line;
use crate::errors::ServiceError;

/// Whether this caller won the right to apply the stock effect.
pub enum Claim {
    /// This caller created the document and must apply + complete it.
    Fresh(stock_document::Model),
    /// A completed execution already exists; return its result unchanged.
    Replayed(stock_document::Model),
}

/// Claims the `(source_document_no, operation)` key.
///
/// Returns [`Claim::Replayed`] with the prior completed document when the key
/// was already executed. A pending row from another in-flight caller surfaces
/// as `ConcurrentModification` so the caller resubmits once the winner
/// settled.
pub async fn claim_execution<C>(
    conn: &C,
    source_document_no: &str,
    operation: MovementOperation,
    document_no: &str,
    warehouse_id: Uuid,
    created_by: &str,
) -> Result<Claim, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_execution(conn, source_document_no, operation).await? {
        return replay(existing, source_document_no, operation);
    }

    let candidate = stock_document::ActiveModel {
        id: Set(Uuid::new_v4()),
        document_no: Set(document_no.to_string()),
        operation: Set(operation),
        source_document_no: Set(source_document_no.to_string()),
        warehouse_id: Set(warehouse_id),
        status: Set(ExecutionStatus::Pending),
        created_by: Set(created_by.to_string()),
        created_at: Set(Utc::now()),
        completed_at: Set(None),
    };
    let inserted = stock_document::Entity::insert(candidate)
        .on_conflict(
            OnConflict::columns([
                stock_document::Column::SourceDocumentNo,
                stock_document::Column::Operation,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    let row = find_execution(conn, source_document_no, operation)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "execution document vanished after insert ({}, {})",
                source_document_no, operation
            ))
        })?;

    if inserted > 0 {
        Ok(Claim::Fresh(row))
    } else {
        // Lost the insert race; hand back the winner's result.
        replay(row, source_document_no, operation)
    }
}

fn replay(
    existing: stock_document::Model,
    source_document_no: &str,
    operation: MovementOperation,
) -> Result<Claim, ServiceError> {
    match existing.status {
        ExecutionStatus::Completed => Ok(Claim::Replayed(existing)),
        // The winner has not committed (or died mid-flight); the caller can
        // safely try again.
        ExecutionStatus::Pending => Err(ServiceError::ConcurrentModification(format!(
            "execution ({}, {}) is still in flight",
            source_document_no, operation
        ))),
        ExecutionStatus::Canceled => Err(ServiceError::ConsistencyViolation(format!(
            "execution ({}, {}) exists in canceled state",
            source_document_no, operation
        ))),
    }
}

pub async fn find_execution<C>(
    conn: &C,
    source_document_no: &str,
    operation: MovementOperation,
) -> Result<Option<stock_document::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let row = stock_document::Entity::find()
        .filter(stock_document::Column::SourceDocumentNo.eq(source_document_no))
        .filter(stock_document::Column::Operation.eq(operation))
        .one(conn)
        .await?;
    Ok(row)
}

/// Records one planned line on a freshly claimed document.
pub async fn add_line<C>(
    conn: &C,
    document_id: Uuid,
    product_id: Uuid,
    planned_qty: Decimal,
) -> Result<stock_document_line::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let line = stock_document_line::ActiveModel {
        id: Set(Uuid::new_v4()),
        document_id: Set(document_id),
        product_id: Set(product_id),
        planned_qty: Set(planned_qty),
        applied_qty: Set(Decimal::ZERO),
        created_at: Set(Utc::now()),
    };
    use sea_orm::ActiveModelTrait;
    Ok(line.insert(conn).await?)
}

/// Stamps a line's applied quantity, exactly once.
pub async fn mark_line_applied<C>(
    conn: &C,
    line_id: Uuid,
    applied_qty: Decimal,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let result = stock_document_line::Entity::update_many()
        .col_expr(
            stock_document_line::Column::AppliedQty,
            Expr::value(applied_qty),
        )
        .filter(stock_document_line::Column::Id.eq(line_id))
        .filter(stock_document_line::Column::AppliedQty.eq(Decimal::ZERO))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConsistencyViolation(format!(
            "execution line {} was already applied",
            line_id
        )));
    }
    Ok(())
}

/// Moves a freshly claimed document to completed after every line applied.
pub async fn complete_execution<C>(conn: &C, document_id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let result = stock_document::Entity::update_many()
        .col_expr(
            stock_document::Column::Status,
            Expr::value(ExecutionStatus::Completed),
        )
        .col_expr(
            stock_document::Column::CompletedAt,
            Expr::value(Some(Utc::now())),
        )
        .filter(stock_document::Column::Id.eq(document_id))
        .filter(stock_document::Column::Status.eq(ExecutionStatus::Pending))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConsistencyViolation(format!(
            "execution document {} was not pending at completion",
            document_id
        )));
    }
    Ok(())
}

/// Planned/applied lines of an execution document, for replayed results.
pub async fn load_lines<C>(
    conn: &C,
    document_id: Uuid,
) -> Result<Vec<stock_document_line::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = stock_document_line::Entity::find()
        .filter(stock_document_line::Column::DocumentId.eq(document_id))
        .all(conn)
        .await?;
    Ok(rows)
}
