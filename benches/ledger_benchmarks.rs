//! Throughput of the ledger primitives against an in-process sqlite database.
//! Numbers are only comparable across runs on the same machine; the point is
//! catching regressions in the hot path, not absolute figures.

use criterion::{criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tokio::runtime::Runtime;
use uuid::Uuid;

use stockflow_api::{document_no, ledger};

fn setup(rt: &Runtime) -> DatabaseConnection {
    rt.block_on(async {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.expect("sqlite connects");
        migrations::Migrator::up(&db, None).await.expect("schema applies");
        db
    })
}

fn ledger_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let db = setup(&rt);

    let warehouse_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();
    rt.block_on(ledger::increase(&db, warehouse_id, product_id, dec!(1000000)))
        .expect("seed stock");

    c.bench_function("ledger_increase", |b| {
        b.iter(|| {
            rt.block_on(ledger::increase(&db, warehouse_id, product_id, dec!(1)))
                .expect("increase applies")
        })
    });

    c.bench_function("ledger_reserve_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger::reserve(&db, warehouse_id, product_id, dec!(5))
                    .await
                    .expect("reserve applies");
                ledger::release(&db, warehouse_id, product_id, dec!(5))
                    .await
                    .expect("release applies");
            })
        })
    });

    c.bench_function("ledger_find_balance", |b| {
        b.iter(|| {
            rt.block_on(ledger::find_balance(&db, warehouse_id, product_id))
                .expect("balance readable")
        })
    });

    c.bench_function("document_no_generate", |b| {
        b.iter(|| document_no::generate(document_no::SALES_ORDER))
    });
}

criterion_group!(benches, ledger_benchmarks);
criterion_main!(benches);
