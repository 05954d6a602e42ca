use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sales returns pass quality control before the goods count as stock again:
/// receive puts quantities into the QC bucket, then QC either passes them
/// into on-hand (Completed) or rejects them (QcRejected, bucket drained, no
/// stock effect). Canceling after receive must drain the bucket too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SalesReturnStatus {
    #[sea_orm(string_value = "PendingAudit")]
    PendingAudit,
    #[sea_orm(string_value = "Audited")]
    Audited,
    #[sea_orm(string_value = "PendingQc")]
    PendingQc,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "QcRejected")]
    QcRejected,
    #[sea_orm(string_value = "Canceled")]
    Canceled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_returns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub return_no: String,
    pub shipment_id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub warehouse_id: Uuid,
    pub status: SalesReturnStatus,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub total_amount: Decimal,
    pub remark: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub audited_by: Option<String>,
    pub audited_at: Option<DateTime<Utc>>,
    pub received_by: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub qc_by: Option<String>,
    pub qc_at: Option<DateTime<Utc>>,
    pub qc_remark: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sales_return_line::Entity")]
    Lines,
    #[sea_orm(
        belongs_to = "super::shipment::Entity",
        from = "Column::ShipmentId",
        to = "super::shipment::Column::Id"
    )]
    Shipment,
}

impl Related<super::sales_return_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
