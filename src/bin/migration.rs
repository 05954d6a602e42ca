//! Standalone migration runner: `migration up`, `migration status`, etc.
//! Reads `DATABASE_URL` like the server does.

use sea_orm_migration::cli;

#[tokio::main]
async fn main() {
    cli::run_cli(migrations::Migrator).await;
}
