use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockBalances::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockBalances::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(StockBalances::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockBalances::OnHandQty)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StockBalances::ReservedQty)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StockBalances::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StockBalances::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockBalances::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Balance identity; also what catches concurrent lazy creation.
        manager
            .create_index(
                Index::create()
                    .name("idx_stock_balances_warehouse_product")
                    .table(StockBalances::Table)
                    .col(StockBalances::WarehouseId)
                    .col(StockBalances::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QcBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QcBalances::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QcBalances::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(QcBalances::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(QcBalances::QcQty)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QcBalances::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QcBalances::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QcBalances::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_qc_balances_warehouse_product")
                    .table(QcBalances::Table)
                    .col(QcBalances::WarehouseId)
                    .col(QcBalances::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovementLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MovementLog::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MovementLog::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(MovementLog::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(MovementLog::Operation)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MovementLog::DocumentNo)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MovementLog::DeltaQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MovementLog::ResultingOnHand)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MovementLog::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movement_log_warehouse_product_time")
                    .table(MovementLog::Table)
                    .col(MovementLog::WarehouseId)
                    .col(MovementLog::ProductId)
                    .col(MovementLog::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movement_log_document_no")
                    .table(MovementLog::Table)
                    .col(MovementLog::DocumentNo)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MovementLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QcBalances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockBalances::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum StockBalances {
    Table,
    Id,
    WarehouseId,
    ProductId,
    OnHandQty,
    ReservedQty,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum QcBalances {
    Table,
    Id,
    WarehouseId,
    ProductId,
    QcQty,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MovementLog {
    Table,
    Id,
    WarehouseId,
    ProductId,
    Operation,
    DocumentNo,
    DeltaQty,
    ResultingOnHand,
    OccurredAt,
}
