mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use common::TestApp;
use stockflow_api::commands::counts::create_count_command::NewCountLine;
use stockflow_api::commands::counts::{
    CancelStockCountCommand, CreateStockCountCommand, ExecuteStockCountCommand,
};
use stockflow_api::commands::Command;
use stockflow_api::entities::stock_count::StockCountStatus;
use stockflow_api::errors::ServiceError;
use stockflow_api::ledger;

#[tokio::test]
async fn execution_books_surplus_and_shrinkage_in_one_pass() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let over = app.seed_product("OVER").await;
    let short = app.seed_product("SHORT").await;
    let exact = app.seed_product("EXACT").await;
    app.seed_stock(warehouse, over, dec!(10)).await;
    app.seed_stock(warehouse, short, dec!(10)).await;
    app.seed_stock(warehouse, exact, dec!(10)).await;

    let created = CreateStockCountCommand {
        warehouse_id: warehouse,
        created_by: "counter".into(),
        remark: None,
        lines: vec![
            NewCountLine {
                product_id: over,
                counted_qty: dec!(13),
            },
            NewCountLine {
                product_id: short,
                counted_qty: dec!(7),
            },
            NewCountLine {
                product_id: exact,
                counted_qty: dec!(10),
            },
        ],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("count creates");
    assert_eq!(created.status, StockCountStatus::Pending);

    let executed = ExecuteStockCountCommand {
        count_id: created.count_id,
        executed_by: "counter".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("count executes");
    assert_eq!(executed.status, StockCountStatus::Completed);
    assert!(!executed.idempotent_replay);
    assert!(executed.adjust_in_no.is_some());
    assert!(executed.adjust_out_no.is_some());

    assert_eq!(app.balance(warehouse, over).await, (dec!(13), dec!(0)));
    assert_eq!(app.balance(warehouse, short).await, (dec!(7), dec!(0)));
    assert_eq!(app.balance(warehouse, exact).await, (dec!(10), dec!(0)));

    let exact_line = executed
        .lines
        .iter()
        .find(|l| l.product_id == exact)
        .expect("exact line reported");
    assert_eq!(exact_line.book_qty, dec!(10));
    assert_eq!(exact_line.diff_qty, dec!(0));
}

#[tokio::test]
async fn executing_twice_replays_the_original_adjustments() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let product = app.seed_product("PALLET").await;
    app.seed_stock(warehouse, product, dec!(20)).await;

    let created = CreateStockCountCommand {
        warehouse_id: warehouse,
        created_by: "counter".into(),
        remark: None,
        lines: vec![NewCountLine {
            product_id: product,
            counted_qty: dec!(18),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("count creates");

    let execute = ExecuteStockCountCommand {
        count_id: created.count_id,
        executed_by: "counter".into(),
    };
    let original = execute
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("count executes");
    let replay = execute
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("retry answers");

    assert!(replay.idempotent_replay);
    assert_eq!(replay.adjust_out_no, original.adjust_out_no);
    assert_eq!(replay.adjust_in_no, None);
    assert_eq!(replay.lines.len(), 1);
    assert_eq!(replay.lines[0].book_qty, dec!(20));
    assert_eq!(replay.lines[0].diff_qty, dec!(-2));
    // The adjustment landed exactly once.
    assert_eq!(app.balance(warehouse, product).await, (dec!(18), dec!(0)));
}

#[tokio::test]
async fn shrinkage_never_cuts_into_reservations() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let product = app.seed_product("CRATE").await;
    app.seed_stock(warehouse, product, dec!(10)).await;
    ledger::reserve(app.db.as_ref(), warehouse, product, dec!(9))
        .await
        .expect("reservation applies");

    let created = CreateStockCountCommand {
        warehouse_id: warehouse,
        created_by: "counter".into(),
        remark: None,
        lines: vec![NewCountLine {
            product_id: product,
            counted_qty: dec!(8),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("count creates");

    // Writing off 2 needs 2 unreserved; only 1 is free.
    let err = ExecuteStockCountCommand {
        count_id: created.count_id,
        executed_by: "counter".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.balance(warehouse, product).await, (dec!(10), dec!(9)));
}

#[tokio::test]
async fn pending_counts_cancel_but_executed_counts_are_permanent() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let product = app.seed_product("BOX").await;
    app.seed_stock(warehouse, product, dec!(5)).await;

    let pending = CreateStockCountCommand {
        warehouse_id: warehouse,
        created_by: "counter".into(),
        remark: None,
        lines: vec![NewCountLine {
            product_id: product,
            counted_qty: dec!(5),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("count creates");

    let cancel = CancelStockCountCommand {
        count_id: pending.count_id,
        canceled_by: "counter".into(),
    };
    let canceled = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("cancel applies");
    assert!(!canceled.already_canceled);
    assert_eq!(canceled.status, StockCountStatus::Canceled);
    let repeat = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("repeat cancel noops");
    assert!(repeat.already_canceled);

    let executed = CreateStockCountCommand {
        warehouse_id: warehouse,
        created_by: "counter".into(),
        remark: None,
        lines: vec![NewCountLine {
            product_id: product,
            counted_qty: dec!(6),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("count creates");
    ExecuteStockCountCommand {
        count_id: executed.count_id,
        executed_by: "counter".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("count executes");

    let err = CancelStockCountCommand {
        count_id: executed.count_id,
        canceled_by: "counter".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn creation_rejects_negative_counts_and_duplicate_products() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let product = app.seed_product("BIN").await;

    let err = CreateStockCountCommand {
        warehouse_id: warehouse,
        created_by: "counter".into(),
        remark: None,
        lines: vec![NewCountLine {
            product_id: product,
            counted_qty: dec!(-1),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = CreateStockCountCommand {
        warehouse_id: warehouse,
        created_by: "counter".into(),
        remark: None,
        lines: vec![
            NewCountLine {
                product_id: product,
                counted_qty: dec!(1),
            },
            NewCountLine {
                product_id: product,
                counted_qty: dec!(2),
            },
        ],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
