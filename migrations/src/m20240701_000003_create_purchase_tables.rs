use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PurchaseOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseOrders::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::OrderNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PurchaseOrders::SupplierId).uuid().not_null())
                    .col(ColumnDef::new(PurchaseOrders::WarehouseId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseOrders::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::TotalQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::TotalAmount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurchaseOrders::Remark).string().null())
                    .col(
                        ColumnDef::new(PurchaseOrders::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::AuditedBy)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::AuditedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurchaseOrderLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseOrderLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurchaseOrderLines::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseOrderLines::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderLines::UnitPrice)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderLines::OrderedQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderLines::ReceivedQty)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderLines::Amount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_order_lines_order")
                            .from(PurchaseOrderLines::Table, PurchaseOrderLines::OrderId)
                            .to(PurchaseOrders::Table, PurchaseOrders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_order_lines_order")
                    .table(PurchaseOrderLines::Table)
                    .col(PurchaseOrderLines::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurchaseInbounds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseInbounds::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInbounds::InboundNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    // Client-supplied idempotency key; collisions answer with
                    // the first receipt instead of booking stock twice.
                    .col(
                        ColumnDef::new(PurchaseInbounds::RequestToken)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PurchaseInbounds::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseInbounds::WarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInbounds::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInbounds::ReversalDocumentNo)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInbounds::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInbounds::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInbounds::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_inbounds_order")
                            .from(PurchaseInbounds::Table, PurchaseInbounds::OrderId)
                            .to(PurchaseOrders::Table, PurchaseOrders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurchaseInboundLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseInboundLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInboundLines::InboundId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInboundLines::OrderLineId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInboundLines::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInboundLines::PlannedQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseInboundLines::AppliedQty)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PurchaseInboundLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_inbound_lines_inbound")
                            .from(PurchaseInboundLines::Table, PurchaseInboundLines::InboundId)
                            .to(PurchaseInbounds::Table, PurchaseInbounds::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurchaseReturns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseReturns::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::ReturnNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PurchaseReturns::SupplierId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseReturns::WarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::TotalQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::TotalAmount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurchaseReturns::Remark).string().null())
                    .col(
                        ColumnDef::new(PurchaseReturns::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::AuditedBy)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::AuditedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::ExecutedBy)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::ExecutedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturns::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurchaseReturnLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseReturnLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturnLines::ReturnId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturnLines::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturnLines::UnitPrice)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturnLines::Qty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturnLines::Amount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseReturnLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_return_lines_return")
                            .from(PurchaseReturnLines::Table, PurchaseReturnLines::ReturnId)
                            .to(PurchaseReturns::Table, PurchaseReturns::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurchaseReturnLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PurchaseReturns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PurchaseInboundLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PurchaseInbounds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum PurchaseOrders {
    Table,
    Id,
    OrderNo,
    SupplierId,
    WarehouseId,
    Status,
    TotalQty,
    TotalAmount,
    Remark,
    CreatedBy,
    CreatedAt,
    AuditedBy,
    AuditedAt,
    CompletedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PurchaseOrderLines {
    Table,
    Id,
    OrderId,
    ProductId,
    UnitPrice,
    OrderedQty,
    ReceivedQty,
    Amount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PurchaseInbounds {
    Table,
    Id,
    InboundNo,
    RequestToken,
    OrderId,
    WarehouseId,
    Status,
    ReversalDocumentNo,
    CreatedBy,
    CreatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum PurchaseInboundLines {
    Table,
    Id,
    InboundId,
    OrderLineId,
    ProductId,
    PlannedQty,
    AppliedQty,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PurchaseReturns {
    Table,
    Id,
    ReturnNo,
    SupplierId,
    WarehouseId,
    Status,
    TotalQty,
    TotalAmount,
    Remark,
    CreatedBy,
    CreatedAt,
    AuditedBy,
    AuditedAt,
    ExecutedBy,
    ExecutedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PurchaseReturnLines {
    Table,
    Id,
    ReturnId,
    ProductId,
    UnitPrice,
    Qty,
    Amount,
    CreatedAt,
}
