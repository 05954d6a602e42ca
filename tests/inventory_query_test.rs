mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::TestApp;
use stockflow_api::commands::inventory::{GetStockBalanceCommand, ListMovementsCommand};
use stockflow_api::commands::Command;
use stockflow_api::entities::movement_log::MovementOperation;
use stockflow_api::errors::ServiceError;
use stockflow_api::ledger;

#[tokio::test]
async fn unknown_pairs_read_as_all_zero() {
    let app = TestApp::spawn().await;

    let view = GetStockBalanceCommand {
        warehouse_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("balance reads");

    assert_eq!(view.on_hand_qty, dec!(0));
    assert_eq!(view.reserved_qty, dec!(0));
    assert_eq!(view.available_qty, dec!(0));
    assert_eq!(view.qc_qty, dec!(0));
}

#[tokio::test]
async fn balance_view_derives_available_from_on_hand_and_reserved() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let product = app.seed_product("DRIVE").await;
    app.seed_stock(warehouse, product, dec!(12)).await;
    ledger::reserve(app.db.as_ref(), warehouse, product, dec!(5))
        .await
        .expect("reservation applies");
    ledger::qc_increase(app.db.as_ref(), warehouse, product, dec!(2))
        .await
        .expect("qc booking applies");

    let view = GetStockBalanceCommand {
        warehouse_id: warehouse,
        product_id: product,
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("balance reads");

    assert_eq!(view.on_hand_qty, dec!(12));
    assert_eq!(view.reserved_qty, dec!(5));
    assert_eq!(view.available_qty, dec!(7));
    assert_eq!(view.qc_qty, dec!(2));
}

async fn seed_movements(app: &TestApp, warehouse: Uuid, product: Uuid, n: u32) {
    for i in 0..n {
        let balance = ledger::increase(app.db.as_ref(), warehouse, product, dec!(1))
            .await
            .expect("increase applies");
        ledger::append_movement(
            app.db.as_ref(),
            warehouse,
            product,
            MovementOperation::PurchaseIn,
            &format!("PI-SEED-{}", i),
            dec!(1),
            balance.on_hand_qty,
        )
        .await
        .expect("movement logs");
    }
}

#[tokio::test]
async fn movement_log_pages_newest_first_with_filters() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let widget = app.seed_product("WIDGET").await;
    let gadget = app.seed_product("GADGET").await;
    seed_movements(&app, warehouse, widget, 7).await;
    seed_movements(&app, warehouse, gadget, 3).await;

    let page = ListMovementsCommand {
        warehouse_id: Some(warehouse),
        product_id: Some(widget),
        operation: None,
        page: Some(1),
        per_page: Some(5),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("page loads");
    assert_eq!(page.total_items, 7);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.movements.len(), 5);
    assert!(page.movements.iter().all(|m| m.product_id == widget));
    // Newest entry first.
    assert_eq!(page.movements[0].document_no, "PI-SEED-6");

    let tail = ListMovementsCommand {
        warehouse_id: Some(warehouse),
        product_id: Some(widget),
        operation: None,
        page: Some(2),
        per_page: Some(5),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("page loads");
    assert_eq!(tail.movements.len(), 2);

    let by_operation = ListMovementsCommand {
        warehouse_id: Some(warehouse),
        product_id: None,
        operation: Some(MovementOperation::SalesOut),
        page: None,
        per_page: None,
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("page loads");
    assert_eq!(by_operation.total_items, 0);
    assert!(by_operation.movements.is_empty());
}

#[tokio::test]
async fn page_zero_is_rejected_and_page_size_is_clamped() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let product = app.seed_product("TAPE").await;
    seed_movements(&app, warehouse, product, 2).await;

    let err = ListMovementsCommand {
        warehouse_id: None,
        product_id: None,
        operation: None,
        page: Some(0),
        per_page: None,
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let page = ListMovementsCommand {
        warehouse_id: None,
        product_id: None,
        operation: None,
        page: None,
        per_page: Some(10_000),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("page loads");
    assert_eq!(page.per_page, 100);
}
