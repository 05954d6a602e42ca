use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sales order lifecycle. Audit reserves stock for every line; shipping
/// consumes reservations batch by batch. `shipped_by`/`shipped_at` are set
/// only once the order is fully shipped and cleared again if a reversal drops
/// it back below fully-shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SalesOrderStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Audited")]
    Audited,
    #[sea_orm(string_value = "PartiallyShipped")]
    PartiallyShipped,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "Canceled")]
    Canceled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_no: String,
    pub customer_id: Uuid,
    pub warehouse_id: Uuid,
    pub status: SalesOrderStatus,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub total_amount: Decimal,
    pub remark: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub audited_by: Option<String>,
    pub audited_at: Option<DateTime<Utc>>,
    pub shipped_by: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sales_order_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
}

impl Related<super::sales_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
