//! Return flows. Purchase returns send goods back to the supplier and deduct
//! unreserved stock on execution. Sales returns trace back to the originating
//! shipment and pass through the QC holding bucket before the goods count as
//! stock again.

pub mod audit_purchase_return_command;
pub mod audit_sales_return_command;
pub mod cancel_purchase_return_command;
pub mod cancel_sales_return_command;
pub mod create_purchase_return_command;
pub mod create_sales_return_command;
pub mod execute_purchase_return_command;
pub mod qc_pass_sales_return_command;
pub mod qc_reject_sales_return_command;
pub mod receive_sales_return_command;

pub use audit_purchase_return_command::AuditPurchaseReturnCommand;
pub use audit_sales_return_command::AuditSalesReturnCommand;
pub use cancel_purchase_return_command::CancelPurchaseReturnCommand;
pub use cancel_sales_return_command::CancelSalesReturnCommand;
pub use create_purchase_return_command::CreatePurchaseReturnCommand;
pub use create_sales_return_command::CreateSalesReturnCommand;
pub use execute_purchase_return_command::ExecutePurchaseReturnCommand;
pub use qc_pass_sales_return_command::QcPassSalesReturnCommand;
pub use qc_reject_sales_return_command::QcRejectSalesReturnCommand;
pub use receive_sales_return_command::ReceiveSalesReturnCommand;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, RelationTrait};
use uuid::Uuid;

use crate::entities::sales_return::{self, SalesReturnStatus};
use crate::entities::sales_return_line;
use crate::entities::shipment_line;
use crate::errors::ServiceError;

/// Quantity already claimed against one shipment line by every non-canceled
/// return. Canceled returns give their claim back; everything else (including
/// rejected ones, whose goods went back to the customer) keeps counting.
pub(crate) async fn returned_qty_for_shipment_line<C>(
    conn: &C,
    shipment_line_id: Uuid,
) -> Result<Decimal, ServiceError>
where
    C: ConnectionTrait,
{
    let lines: Vec<sales_return_line::Model> = sales_return_line::Entity::find()
        .filter(sales_return_line::Column::ShipmentLineId.eq(shipment_line_id))
        .join(
            sea_orm::JoinType::InnerJoin,
            sales_return_line::Relation::Return.def(),
        )
        .filter(sales_return::Column::Status.ne(SalesReturnStatus::Canceled))
        .all(conn)
        .await?;
    Ok(lines.iter().map(|l| l.qty).sum())
}

/// Re-validates a return's lines against the originating shipment: every line
/// must trace to a real shipment line and the cumulative returned quantity
/// (this return included) must not exceed what was shipped. Runs at every
/// stage, not just at creation.
pub(crate) async fn validate_against_shipment<C>(
    conn: &C,
    return_no: &str,
    shipment_id: Uuid,
    lines: &[sales_return_line::Model],
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    for line in lines {
        let shipment_line = shipment_line::Entity::find_by_id(line.shipment_line_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "return {} references missing shipment line {}",
                    return_no, line.shipment_line_id
                ))
            })?;
        if shipment_line.shipment_id != shipment_id {
            return Err(ServiceError::ValidationError(format!(
                "return {} line {} does not trace to its shipment",
                return_no, line.id
            )));
        }
        let cumulative = returned_qty_for_shipment_line(conn, shipment_line.id).await?;
        if cumulative > shipment_line.qty {
            return Err(ServiceError::ValidationError(format!(
                "cumulative returned {} exceeds shipped {} on shipment line {}",
                cumulative, shipment_line.qty, shipment_line.id
            )));
        }
    }
    Ok(())
}
