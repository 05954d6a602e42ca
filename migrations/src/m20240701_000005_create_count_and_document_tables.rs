use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockCounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockCounts::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockCounts::CountNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(StockCounts::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(StockCounts::Status).string_len(32).not_null())
                    .col(ColumnDef::new(StockCounts::Remark).string().null())
                    .col(
                        ColumnDef::new(StockCounts::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockCounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockCounts::ExecutedBy).string_len(64).null())
                    .col(
                        ColumnDef::new(StockCounts::ExecutedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockCounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockCountLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockCountLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockCountLines::CountId).uuid().not_null())
                    .col(ColumnDef::new(StockCountLines::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockCountLines::CountedQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockCountLines::BookQty)
                            .decimal_len(16, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockCountLines::DiffQty)
                            .decimal_len(16, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockCountLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_count_lines_count")
                            .from(StockCountLines::Table, StockCountLines::CountId)
                            .to(StockCounts::Table, StockCounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockDocuments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockDocuments::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocuments::DocumentNo)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(StockDocuments::Operation)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocuments::SourceDocumentNo)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockDocuments::WarehouseId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockDocuments::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocuments::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocuments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocuments::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The idempotency key: at most one execution per source document and
        // operation kind, enforced by the store itself.
        manager
            .create_index(
                Index::create()
                    .name("idx_stock_documents_source_operation")
                    .table(StockDocuments::Table)
                    .col(StockDocuments::SourceDocumentNo)
                    .col(StockDocuments::Operation)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockDocumentLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockDocumentLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocumentLines::DocumentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocumentLines::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocumentLines::PlannedQty)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockDocumentLines::AppliedQty)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StockDocumentLines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_document_lines_document")
                            .from(StockDocumentLines::Table, StockDocumentLines::DocumentId)
                            .to(StockDocuments::Table, StockDocuments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockDocumentLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockDocuments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockCountLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockCounts::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum StockCounts {
    Table,
    Id,
    CountNo,
    WarehouseId,
    Status,
    Remark,
    CreatedBy,
    CreatedAt,
    ExecutedBy,
    ExecutedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StockCountLines {
    Table,
    Id,
    CountId,
    ProductId,
    CountedQty,
    BookQty,
    DiffQty,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StockDocuments {
    Table,
    Id,
    DocumentNo,
    Operation,
    SourceDocumentNo,
    WarehouseId,
    Status,
    CreatedBy,
    CreatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum StockDocumentLines {
    Table,
    Id,
    DocumentId,
    ProductId,
    PlannedQty,
    AppliedQty,
    CreatedAt,
}
