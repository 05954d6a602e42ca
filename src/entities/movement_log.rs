use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What moved the stock. Also used as the operation half of the
/// `(source_document_no, operation)` idempotency key on execution documents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum MovementOperation {
    #[sea_orm(string_value = "PurchaseIn")]
    PurchaseIn,
    #[sea_orm(string_value = "PurchaseInReverse")]
    PurchaseInReverse,
    #[sea_orm(string_value = "PurchaseReturnOut")]
    PurchaseReturnOut,
    #[sea_orm(string_value = "SalesOut")]
    SalesOut,
    #[sea_orm(string_value = "SalesOutReverse")]
    SalesOutReverse,
    #[sea_orm(string_value = "SalesReturnIn")]
    SalesReturnIn,
    #[sea_orm(string_value = "CountAdjustIn")]
    CountAdjustIn,
    #[sea_orm(string_value = "CountAdjustOut")]
    CountAdjustOut,
}

/// Append-only record of every on-hand change.
///
/// One row per applied document line, written in the same transaction as the
/// balance update and never touched again. `on_hand_qty` reconstructs as the
/// running sum of `delta_qty` from zero.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movement_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub operation: MovementOperation,
    pub document_no: String,
    /// Signed change; negative for outbound movements.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub delta_qty: Decimal,
    /// On-hand quantity right after this entry applied.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub resulting_on_hand: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
