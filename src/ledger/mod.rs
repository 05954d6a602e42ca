//! Stock ledger primitives.
//!
//! Every quantity change in the system funnels through the functions here:
//! `increase`, `reserve`, `release`, `consume` and `deduct_unreserved` for
//! the on-hand/reserved balance, `qc_increase`/`qc_decrease` for the QC
//! holding bucket, and `append_movement` for the audit log. Each mutation is
//! an optimistic read-validate-write cycle with bounded retry; the invariant
//! `0 <= reserved <= on_hand` is checked against the freshly read row and
//! against the computed result before anything is written. Callers are
//! expected to hold a transaction and log movements themselves.

pub mod retry;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::movement_log::{self, MovementOperation};
use crate::entities::{qc_balance, stock_balance};
use crate::errors::ServiceError;

pub use retry::{run_with_cas_retries, CasOutcome, MAX_CAS_ATTEMPTS};

/// Adds `qty` to on-hand stock, creating the balance row when absent.
///
/// Row creation is race-safe: the unique `(warehouse, product)` index catches
/// concurrent creation and the loser re-reads the winner's row.
pub async fn increase<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
) -> Result<stock_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive_qty(qty)?;
    run_with_cas_retries(conn, "stock.increase", |conn| {
        Box::pin(async move {
            let row = ensure_balance(conn, warehouse_id, product_id).await?;
            validate_balance(&row)?;
            write_balance(conn, &row, row.on_hand_qty + qty, row.reserved_qty).await
        })
    })
    .await
}

/// Earmarks `qty` of on-hand stock for a sales order.
pub async fn reserve<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
) -> Result<stock_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive_qty(qty)?;
    run_with_cas_retries(conn, "stock.reserve", |conn| {
        Box::pin(async move {
            let Some(row) = find_balance(conn, warehouse_id, product_id).await? else {
                return Err(insufficient(product_id, Decimal::ZERO, qty));
            };
            validate_balance(&row)?;
            let available = row.available_qty();
            if qty > available {
                return Err(insufficient(product_id, available, qty));
            }
            write_balance(conn, &row, row.on_hand_qty, row.reserved_qty + qty).await
        })
    })
    .await
}

/// Gives a reservation back without touching on-hand stock.
pub async fn release<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
) -> Result<stock_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive_qty(qty)?;
    run_with_cas_retries(conn, "stock.release", |conn| {
        Box::pin(async move {
            let Some(row) = find_balance(conn, warehouse_id, product_id).await? else {
                return Err(ServiceError::ConsistencyViolation(format!(
                    "release of {} for product {} found no balance row",
                    qty, product_id
                )));
            };
            validate_balance(&row)?;
            if row.reserved_qty < qty {
                return Err(ServiceError::ConsistencyViolation(format!(
                    "release would drive reserved negative (reserved={}, release={})",
                    row.reserved_qty, qty
                )));
            }
            write_balance(conn, &row, row.on_hand_qty, row.reserved_qty - qty).await
        })
    })
    .await
}

/// Converts a reservation into an actual outbound movement: deducts `qty`
/// from on-hand and from reserved in one step.
pub async fn consume<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
) -> Result<stock_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive_qty(qty)?;
    run_with_cas_retries(conn, "stock.consume", |conn| {
        Box::pin(async move {
            let Some(row) = find_balance(conn, warehouse_id, product_id).await? else {
                return Err(ServiceError::ConsistencyViolation(format!(
                    "consume of {} for product {} found no balance row",
                    qty, product_id
                )));
            };
            validate_balance(&row)?;
            if row.reserved_qty < qty {
                return Err(ServiceError::ConsistencyViolation(format!(
                    "reserved quantity below required (reserved={}, required={})",
                    row.reserved_qty, qty
                )));
            }
            if row.on_hand_qty < qty {
                return Err(insufficient(product_id, row.on_hand_qty, qty));
            }
            write_balance(conn, &row, row.on_hand_qty - qty, row.reserved_qty - qty).await
        })
    })
    .await
}

/// Deducts stock that was never reserved (purchase returns, count shrinkage).
/// Only the unreserved portion `on_hand - reserved` is eligible.
pub async fn deduct_unreserved<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
) -> Result<stock_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive_qty(qty)?;
    run_with_cas_retries(conn, "stock.deduct_unreserved", |conn| {
        Box::pin(async move {
            let Some(row) = find_balance(conn, warehouse_id, product_id).await? else {
                return Err(insufficient(product_id, Decimal::ZERO, qty));
            };
            validate_balance(&row)?;
            let available = row.available_qty();
            if qty > available {
                return Err(insufficient(product_id, available, qty));
            }
            write_balance(conn, &row, row.on_hand_qty - qty, row.reserved_qty).await
        })
    })
    .await
}

/// Moves received return goods into the QC holding bucket.
pub async fn qc_increase<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
) -> Result<qc_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive_qty(qty)?;
    run_with_cas_retries(conn, "qc.increase", |conn| {
        Box::pin(async move {
            let row = ensure_qc_balance(conn, warehouse_id, product_id).await?;
            validate_qc_balance(&row)?;
            write_qc_balance(conn, &row, row.qc_qty + qty).await
        })
    })
    .await
}

/// Drains the QC holding bucket after a pass, reject or cancellation.
pub async fn qc_decrease<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    qty: Decimal,
) -> Result<qc_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_positive_qty(qty)?;
    run_with_cas_retries(conn, "qc.decrease", |conn| {
        Box::pin(async move {
            let Some(row) = find_qc_balance(conn, warehouse_id, product_id).await? else {
                return Err(ServiceError::ConsistencyViolation(format!(
                    "qc decrease of {} for product {} found no bucket row",
                    qty, product_id
                )));
            };
            validate_qc_balance(&row)?;
            if row.qc_qty < qty {
                return Err(ServiceError::ConsistencyViolation(format!(
                    "qc bucket below required (held={}, required={})",
                    row.qc_qty, qty
                )));
            }
            write_qc_balance(conn, &row, row.qc_qty - qty).await
        })
    })
    .await
}

/// Appends one audit-log row for an applied on-hand change. Reserved-only
/// moves (reserve/release) and QC bucket moves are not logged here.
pub async fn append_movement<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    operation: MovementOperation,
    document_no: &str,
    delta_qty: Decimal,
    resulting_on_hand: Decimal,
) -> Result<movement_log::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let entry = movement_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        operation: Set(operation),
        document_no: Set(document_no.to_string()),
        delta_qty: Set(delta_qty),
        resulting_on_hand: Set(resulting_on_hand),
        occurred_at: Set(Utc::now()),
    };
    let model = entry.insert(conn).await?;
    Ok(model)
}

/// Current balance row, if the product ever moved in this warehouse.
pub async fn find_balance<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<Option<stock_balance::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let row = stock_balance::Entity::find()
        .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_balance::Column::ProductId.eq(product_id))
        .one(conn)
        .await?;
    Ok(row)
}

pub async fn find_qc_balance<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<Option<qc_balance::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let row = qc_balance::Entity::find()
        .filter(qc_balance::Column::WarehouseId.eq(warehouse_id))
        .filter(qc_balance::Column::ProductId.eq(product_id))
        .one(conn)
        .await?;
    Ok(row)
}

/// Checks the ledger invariant on a stored row. A violation here means the
/// data is corrupt, not that the request was bad.
pub fn validate_balance(row: &stock_balance::Model) -> Result<(), ServiceError> {
    validate_quantities(row.on_hand_qty, row.reserved_qty)
}

fn validate_quantities(on_hand: Decimal, reserved: Decimal) -> Result<(), ServiceError> {
    if reserved < Decimal::ZERO {
        return Err(ServiceError::ConsistencyViolation(format!(
            "reserved quantity negative ({})",
            reserved
        )));
    }
    if on_hand < Decimal::ZERO {
        return Err(ServiceError::ConsistencyViolation(format!(
            "on-hand quantity negative ({})",
            on_hand
        )));
    }
    if reserved > on_hand {
        return Err(ServiceError::ConsistencyViolation(format!(
            "reserved exceeds on-hand ({} > {})",
            reserved, on_hand
        )));
    }
    Ok(())
}

fn validate_qc_balance(row: &qc_balance::Model) -> Result<(), ServiceError> {
    if row.qc_qty < Decimal::ZERO {
        return Err(ServiceError::ConsistencyViolation(format!(
            "qc quantity negative ({})",
            row.qc_qty
        )));
    }
    Ok(())
}

fn ensure_positive_qty(qty: Decimal) -> Result<(), ServiceError> {
    if qty <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "quantity must be positive, got {}",
            qty
        )));
    }
    Ok(())
}

fn insufficient(product_id: Uuid, available: Decimal, required: Decimal) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "product {}: available={}, required={}",
        product_id, available, required
    ))
}

/// Lazily creates the zero balance row. Idempotent under concurrency: the
/// unique index swallows the duplicate insert and the follow-up read returns
/// whichever row won.
async fn ensure_balance<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<stock_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(row) = find_balance(conn, warehouse_id, product_id).await? {
        return Ok(row);
    }

    let now = Utc::now();
    let fresh = stock_balance::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        on_hand_qty: Set(Decimal::ZERO),
        reserved_qty: Set(Decimal::ZERO),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    stock_balance::Entity::insert(fresh)
        .on_conflict(
            OnConflict::columns([
                stock_balance::Column::WarehouseId,
                stock_balance::Column::ProductId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    find_balance(conn, warehouse_id, product_id)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "balance row vanished after insert (warehouse={}, product={})",
                warehouse_id, product_id
            ))
        })
}

async fn ensure_qc_balance<C>(
    conn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<qc_balance::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(row) = find_qc_balance(conn, warehouse_id, product_id).await? {
        return Ok(row);
    }

    let now = Utc::now();
    let fresh = qc_balance::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        qc_qty: Set(Decimal::ZERO),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    qc_balance::Entity::insert(fresh)
        .on_conflict(
            OnConflict::columns([
                qc_balance::Column::WarehouseId,
                qc_balance::Column::ProductId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    find_qc_balance(conn, warehouse_id, product_id)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "qc row vanished after insert (warehouse={}, product={})",
                warehouse_id, product_id
            ))
        })
}

/// Versioned write of the computed balance. The result is validated before
/// the update; a zero row count means another writer got there first.
async fn write_balance<C>(
    conn: &C,
    row: &stock_balance::Model,
    new_on_hand: Decimal,
    new_reserved: Decimal,
) -> Result<CasOutcome<stock_balance::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    validate_quantities(new_on_hand, new_reserved)?;

    let now = Utc::now();
    let result = stock_balance::Entity::update_many()
        .col_expr(stock_balance::Column::OnHandQty, Expr::value(new_on_hand))
        .col_expr(stock_balance::Column::ReservedQty, Expr::value(new_reserved))
        .col_expr(stock_balance::Column::Version, Expr::value(row.version + 1))
        .col_expr(stock_balance::Column::UpdatedAt, Expr::value(now))
        .filter(stock_balance::Column::Id.eq(row.id))
        .filter(stock_balance::Column::Version.eq(row.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(CasOutcome::Conflict);
    }

    Ok(CasOutcome::Applied(stock_balance::Model {
        on_hand_qty: new_on_hand,
        reserved_qty: new_reserved,
        version: row.version + 1,
        updated_at: now,
        ..row.clone()
    }))
}

async fn write_qc_balance<C>(
    conn: &C,
    row: &qc_balance::Model,
    new_qc_qty: Decimal,
) -> Result<CasOutcome<qc_balance::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    if new_qc_qty < Decimal::ZERO {
        return Err(ServiceError::ConsistencyViolation(format!(
            "qc quantity would go negative ({})",
            new_qc_qty
        )));
    }

    let now = Utc::now();
    let result = qc_balance::Entity::update_many()
        .col_expr(qc_balance::Column::QcQty, Expr::value(new_qc_qty))
        .col_expr(qc_balance::Column::Version, Expr::value(row.version + 1))
        .col_expr(qc_balance::Column::UpdatedAt, Expr::value(now))
        .filter(qc_balance::Column::Id.eq(row.id))
        .filter(qc_balance::Column::Version.eq(row.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(CasOutcome::Conflict);
    }

    Ok(CasOutcome::Applied(qc_balance::Model {
        qc_qty: new_qc_qty,
        version: row.version + 1,
        updated_at: now,
        ..row.clone()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(on_hand: Decimal, reserved: Decimal) -> stock_balance::Model {
        let now = Utc::now();
        stock_balance::Model {
            id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            on_hand_qty: on_hand,
            reserved_qty: reserved,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn invariant_accepts_zero_and_full_reservation() {
        assert!(validate_balance(&balance(dec!(0), dec!(0))).is_ok());
        assert!(validate_balance(&balance(dec!(10), dec!(10))).is_ok());
        assert!(validate_balance(&balance(dec!(10), dec!(3))).is_ok());
    }

    #[test]
    fn invariant_rejects_corrupt_rows() {
        let err = validate_balance(&balance(dec!(5), dec!(6))).unwrap_err();
        assert!(matches!(err, ServiceError::ConsistencyViolation(_)));

        let err = validate_balance(&balance(dec!(-1), dec!(0))).unwrap_err();
        assert!(matches!(err, ServiceError::ConsistencyViolation(_)));

        let err = validate_balance(&balance(dec!(5), dec!(-2))).unwrap_err();
        assert!(matches!(err, ServiceError::ConsistencyViolation(_)));
    }

    #[test]
    fn available_is_on_hand_minus_reserved() {
        assert_eq!(balance(dec!(10), dec!(4)).available_qty(), dec!(6));
        assert_eq!(balance(dec!(10), dec!(10)).available_qty(), dec!(0));
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected_up_front() {
        assert!(matches!(
            ensure_positive_qty(dec!(0)),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            ensure_positive_qty(dec!(-3)),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(ensure_positive_qty(dec!(0.5)).is_ok());
    }
}
