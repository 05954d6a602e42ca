use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesOrders::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::OrderNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SalesOrders::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(SalesOrders::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(SalesOrders::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(SalesOrders::TotalQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::TotalAmount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesOrders::Remark).string().null())
                    .col(
                        ColumnDef::new(SalesOrders::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesOrders::AuditedBy).string_len(64).null())
                    .col(
                        ColumnDef::new(SalesOrders::AuditedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesOrders::ShippedBy).string_len(64).null())
                    .col(
                        ColumnDef::new(SalesOrders::ShippedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesOrderLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesOrderLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesOrderLines::OrderId).uuid().not_null())
                    .col(ColumnDef::new(SalesOrderLines::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesOrderLines::UnitPrice)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrderLines::OrderedQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrderLines::ShippedQty)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesOrderLines::Amount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrderLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sales_order_lines_order")
                            .from(SalesOrderLines::Table, SalesOrderLines::OrderId)
                            .to(SalesOrders::Table, SalesOrders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_order_lines_order")
                    .table(SalesOrderLines::Table)
                    .col(SalesOrderLines::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Shipments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Shipments::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Shipments::ShipmentNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Shipments::OrderId).uuid().not_null())
                    .col(ColumnDef::new(Shipments::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(Shipments::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Shipments::ReversalDocumentNo)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(Shipments::ReversedBy).string_len(64).null())
                    .col(
                        ColumnDef::new(Shipments::ReversedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Shipments::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shipments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shipments_order")
                            .from(Shipments::Table, Shipments::OrderId)
                            .to(SalesOrders::Table, SalesOrders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShipmentLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShipmentLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShipmentLines::ShipmentId).uuid().not_null())
                    .col(ColumnDef::new(ShipmentLines::OrderLineId).uuid().not_null())
                    .col(ColumnDef::new(ShipmentLines::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(ShipmentLines::Qty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShipmentLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shipment_lines_shipment")
                            .from(ShipmentLines::Table, ShipmentLines::ShipmentId)
                            .to(Shipments::Table, Shipments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesReturns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesReturns::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturns::ReturnNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SalesReturns::ShipmentId).uuid().not_null())
                    .col(ColumnDef::new(SalesReturns::OrderId).uuid().not_null())
                    .col(ColumnDef::new(SalesReturns::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(SalesReturns::WarehouseId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesReturns::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturns::TotalQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturns::TotalAmount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesReturns::Remark).string().null())
                    .col(
                        ColumnDef::new(SalesReturns::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesReturns::AuditedBy).string_len(64).null())
                    .col(
                        ColumnDef::new(SalesReturns::AuditedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturns::ReceivedBy)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturns::ReceivedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesReturns::QcBy).string_len(64).null())
                    .col(
                        ColumnDef::new(SalesReturns::QcAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesReturns::QcRemark).string().null())
                    .col(
                        ColumnDef::new(SalesReturns::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sales_returns_shipment")
                            .from(SalesReturns::Table, SalesReturns::ShipmentId)
                            .to(Shipments::Table, Shipments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesReturnLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesReturnLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesReturnLines::ReturnId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesReturnLines::ShipmentLineId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturnLines::OrderLineId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturnLines::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturnLines::UnitPrice)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturnLines::Qty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturnLines::Amount)
                            .decimal_len(16, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesReturnLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sales_return_lines_return")
                            .from(SalesReturnLines::Table, SalesReturnLines::ReturnId)
                            .to(SalesReturns::Table, SalesReturns::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Over-return checks sum returned qty per shipment line.
        manager
            .create_index(
                Index::create()
                    .name("idx_sales_return_lines_shipment_line")
                    .table(SalesReturnLines::Table)
                    .col(SalesReturnLines::ShipmentLineId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesReturnLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesReturns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ShipmentLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Shipments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesOrderLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesOrders::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum SalesOrders {
    Table,
    Id,
    OrderNo,
    CustomerId,
    WarehouseId,
    Status,
    TotalQty,
    TotalAmount,
    Remark,
    CreatedBy,
    CreatedAt,
    AuditedBy,
    AuditedAt,
    ShippedBy,
    ShippedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesOrderLines {
    Table,
    Id,
    OrderId,
    ProductId,
    UnitPrice,
    OrderedQty,
    ShippedQty,
    Amount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Shipments {
    Table,
    Id,
    ShipmentNo,
    OrderId,
    WarehouseId,
    Status,
    ReversalDocumentNo,
    ReversedBy,
    ReversedAt,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ShipmentLines {
    Table,
    Id,
    ShipmentId,
    OrderLineId,
    ProductId,
    Qty,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SalesReturns {
    Table,
    Id,
    ReturnNo,
    ShipmentId,
    OrderId,
    CustomerId,
    WarehouseId,
    Status,
    TotalQty,
    TotalAmount,
    Remark,
    CreatedBy,
    CreatedAt,
    AuditedBy,
    AuditedAt,
    ReceivedBy,
    ReceivedAt,
    QcBy,
    QcAt,
    QcRemark,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesReturnLines {
    Table,
    Id,
    ReturnId,
    ShipmentLineId,
    OrderLineId,
    ProductId,
    UnitPrice,
    Qty,
    Amount,
    CreatedAt,
}
