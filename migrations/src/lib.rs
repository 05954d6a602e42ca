pub use sea_orm_migration::prelude::*;

mod m20240701_000001_create_master_tables;
mod m20240701_000002_create_ledger_tables;
mod m20240701_000003_create_purchase_tables;
mod m20240701_000004_create_sales_tables;
mod m20240701_000005_create_count_and_document_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240701_000001_create_master_tables::Migration),
            Box::new(m20240701_000002_create_ledger_tables::Migration),
            Box::new(m20240701_000003_create_purchase_tables::Migration),
            Box::new(m20240701_000004_create_sales_tables::Migration),
            Box::new(m20240701_000005_create_count_and_document_tables::Migration),
        ]
    }
}
