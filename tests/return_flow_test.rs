mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use uuid::Uuid;

use common::TestApp;
use stockflow_api::commands::returns::create_purchase_return_command::NewPurchaseReturnLine;
use stockflow_api::commands::returns::create_sales_return_command::NewSalesReturnLine;
use stockflow_api::commands::returns::{
    AuditPurchaseReturnCommand, AuditSalesReturnCommand, CancelPurchaseReturnCommand,
    CancelSalesReturnCommand, CreatePurchaseReturnCommand, CreateSalesReturnCommand,
    ExecutePurchaseReturnCommand, QcPassSalesReturnCommand, QcRejectSalesReturnCommand,
    ReceiveSalesReturnCommand,
};
use stockflow_api::commands::sales::create_order_command::NewSalesOrderLine;
use stockflow_api::commands::sales::ship_order_command::ShipLine;
use stockflow_api::commands::sales::{
    AuditSalesOrderCommand, CreateSalesOrderCommand, ShipSalesOrderCommand,
};
use stockflow_api::commands::Command;
use stockflow_api::entities::purchase_return::PurchaseReturnStatus;
use stockflow_api::entities::sales_return::SalesReturnStatus;
use stockflow_api::entities::{sales_order_line, sales_return_line, shipment_line};
use stockflow_api::errors::ServiceError;
use stockflow_api::ledger;

/// Sells and fully ships `qty` of one product, returning the shipment id and
/// its single shipment line.
async fn shipped_sale(
    app: &TestApp,
    warehouse: Uuid,
    customer: Uuid,
    product: Uuid,
    qty: Decimal,
) -> (Uuid, shipment_line::Model) {
    let created = CreateSalesOrderCommand {
        customer_id: customer,
        warehouse_id: warehouse,
        created_by: "sales".into(),
        remark: None,
        lines: vec![NewSalesOrderLine {
            product_id: product,
            unit_price: dec!(20.00),
            qty,
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("order creates");
    AuditSalesOrderCommand {
        order_id: created.order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");
    let order_line = sales_order_line::Entity::find()
        .filter(sales_order_line::Column::OrderId.eq(created.order_id))
        .one(app.db.as_ref())
        .await
        .expect("line loads")
        .expect("line exists");
    let shipped = ShipSalesOrderCommand {
        order_id: created.order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: order_line.id,
            qty,
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("shipment applies");

    let line = shipment_line::Entity::find()
        .filter(shipment_line::Column::ShipmentId.eq(shipped.shipment_id))
        .one(app.db.as_ref())
        .await
        .expect("shipment line loads")
        .expect("shipment line exists");
    (shipped.shipment_id, line)
}

#[tokio::test]
async fn purchase_return_ships_unreserved_stock_back_after_audit() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("VALVE").await;
    app.seed_stock(warehouse, product, dec!(10)).await;

    let created = CreatePurchaseReturnCommand {
        supplier_id: supplier,
        warehouse_id: warehouse,
        created_by: "buyer".into(),
        remark: Some("damaged batch".into()),
        lines: vec![NewPurchaseReturnLine {
            product_id: product,
            unit_price: dec!(4.00),
            qty: dec!(6),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return creates");
    assert_eq!(created.status, PurchaseReturnStatus::PendingAudit);

    let err = ExecutePurchaseReturnCommand {
        return_id: created.return_id,
        executed_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    AuditPurchaseReturnCommand {
        return_id: created.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");

    let execute = ExecutePurchaseReturnCommand {
        return_id: created.return_id,
        executed_by: "dock".into(),
    };
    let executed = execute
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("return executes");
    assert_eq!(executed.status, PurchaseReturnStatus::Completed);
    assert!(!executed.idempotent_replay);
    assert_eq!(app.balance(warehouse, product).await, (dec!(4), dec!(0)));

    let replay = execute
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("retry answers");
    assert!(replay.idempotent_replay);
    assert_eq!(replay.document_no, executed.document_no);
    assert_eq!(app.balance(warehouse, product).await, (dec!(4), dec!(0)));
}

#[tokio::test]
async fn purchase_return_never_takes_reserved_goods() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("HOSE").await;
    app.seed_stock(warehouse, product, dec!(10)).await;
    ledger::reserve(app.db.as_ref(), warehouse, product, dec!(8))
        .await
        .expect("reservation applies");

    let created = CreatePurchaseReturnCommand {
        supplier_id: supplier,
        warehouse_id: warehouse,
        created_by: "buyer".into(),
        remark: None,
        lines: vec![NewPurchaseReturnLine {
            product_id: product,
            unit_price: dec!(2.00),
            qty: dec!(5),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return creates");
    AuditPurchaseReturnCommand {
        return_id: created.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");

    let err = ExecutePurchaseReturnCommand {
        return_id: created.return_id,
        executed_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.balance(warehouse, product).await, (dec!(10), dec!(8)));
}

#[tokio::test]
async fn completed_purchase_return_cannot_be_canceled() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("SEAL").await;
    app.seed_stock(warehouse, product, dec!(5)).await;

    let created = CreatePurchaseReturnCommand {
        supplier_id: supplier,
        warehouse_id: warehouse,
        created_by: "buyer".into(),
        remark: None,
        lines: vec![NewPurchaseReturnLine {
            product_id: product,
            unit_price: dec!(1.00),
            qty: dec!(2),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return creates");
    AuditPurchaseReturnCommand {
        return_id: created.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");
    ExecutePurchaseReturnCommand {
        return_id: created.return_id,
        executed_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return executes");

    let err = CancelPurchaseReturnCommand {
        return_id: created.return_id,
        canceled_by: "buyer".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn sales_return_passes_qc_into_stock() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("PHONE").await;
    app.seed_stock(warehouse, product, dec!(10)).await;
    let (shipment_id, ship_line) = shipped_sale(&app, warehouse, customer, product, dec!(10)).await;
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));

    let created = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(4),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return creates");
    assert_eq!(created.status, SalesReturnStatus::PendingAudit);
    // Unit price and amount are derived from the order line, not supplied.
    assert_eq!(created.total_amount, dec!(80.00));

    AuditSalesReturnCommand {
        return_id: created.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");

    let received = ReceiveSalesReturnCommand {
        return_id: created.return_id,
        received_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return receives");
    assert_eq!(received.status, SalesReturnStatus::PendingQc);
    // In the building, but not stock yet.
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));
    assert_eq!(app.qc_qty(warehouse, product).await, dec!(4));

    let pass = QcPassSalesReturnCommand {
        return_id: created.return_id,
        qc_by: "inspector".into(),
        qc_remark: None,
    };
    let passed = pass
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("qc passes");
    assert_eq!(passed.status, SalesReturnStatus::Completed);
    assert!(!passed.idempotent_replay);
    assert_eq!(app.balance(warehouse, product).await, (dec!(4), dec!(0)));
    assert_eq!(app.qc_qty(warehouse, product).await, dec!(0));

    let replay = pass
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("retry answers");
    assert!(replay.idempotent_replay);
    assert_eq!(app.balance(warehouse, product).await, (dec!(4), dec!(0)));
}

#[tokio::test]
async fn qc_stages_recheck_the_shipment_trace_before_acting() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("ROUTER").await;
    app.seed_stock(warehouse, product, dec!(5)).await;
    let (shipment_id, ship_line) = shipped_sale(&app, warehouse, customer, product, dec!(5)).await;

    let created = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(3),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return creates");
    AuditSalesReturnCommand {
        return_id: created.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");
    ReceiveSalesReturnCommand {
        return_id: created.return_id,
        received_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return receives");

    // Drift the stored claim past what the shipment line ever carried.
    let line = sales_return_line::Entity::find()
        .filter(sales_return_line::Column::ReturnId.eq(created.return_id))
        .one(app.db.as_ref())
        .await
        .expect("line loads")
        .expect("line exists");
    let mut drifted = line.into_active_model();
    drifted.qty = Set(dec!(9));
    drifted.update(app.db.as_ref()).await.expect("drift applies");

    let err = QcPassSalesReturnCommand {
        return_id: created.return_id,
        qc_by: "inspector".into(),
        qc_remark: None,
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    // While the trace is inconsistent nothing moves, in or out of QC.
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));
    assert_eq!(app.qc_qty(warehouse, product).await, dec!(3));

    let err = QcRejectSalesReturnCommand {
        return_id: created.return_id,
        qc_by: "inspector".into(),
        qc_remark: "claims more than shipped".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = CancelSalesReturnCommand {
        return_id: created.return_id,
        canceled_by: "support".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.qc_qty(warehouse, product).await, dec!(3));
}

#[tokio::test]
async fn sales_return_rejection_drains_qc_without_stock_effect() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("TABLET").await;
    app.seed_stock(warehouse, product, dec!(6)).await;
    let (shipment_id, ship_line) = shipped_sale(&app, warehouse, customer, product, dec!(6)).await;

    let created = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(2),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return creates");
    AuditSalesReturnCommand {
        return_id: created.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");
    ReceiveSalesReturnCommand {
        return_id: created.return_id,
        received_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return receives");

    // A rejection without a reason never leaves validation.
    let err = QcRejectSalesReturnCommand {
        return_id: created.return_id,
        qc_by: "inspector".into(),
        qc_remark: "".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let rejected = QcRejectSalesReturnCommand {
        return_id: created.return_id,
        qc_by: "inspector".into(),
        qc_remark: "water damage".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("qc rejects");
    assert_eq!(rejected.status, SalesReturnStatus::QcRejected);
    assert_eq!(app.qc_qty(warehouse, product).await, dec!(0));
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));

    // A decided return cannot be canceled afterwards.
    let err = CancelSalesReturnCommand {
        return_id: created.return_id,
        canceled_by: "support".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn cumulative_return_cap_tracks_cancellations_and_rejections() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("CAMERA").await;
    app.seed_stock(warehouse, product, dec!(5)).await;
    let (shipment_id, ship_line) = shipped_sale(&app, warehouse, customer, product, dec!(5)).await;

    let first = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(3),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("first return creates");

    // 3 of 5 are claimed; another 3 would exceed the shipped quantity.
    let err = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(3),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Canceling the first return frees its claim.
    CancelSalesReturnCommand {
        return_id: first.return_id,
        canceled_by: "support".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("cancel applies");

    let second = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(5),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("full return creates after cancel");

    // Walk the second return to rejection; its claim must keep counting.
    AuditSalesReturnCommand {
        return_id: second.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");
    ReceiveSalesReturnCommand {
        return_id: second.return_id,
        received_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return receives");
    QcRejectSalesReturnCommand {
        return_id: second.return_id,
        qc_by: "inspector".into(),
        qc_remark: "tampered serial".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("qc rejects");

    let err = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(1),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn canceling_a_received_return_drains_its_qc_bucket() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("ROUTER").await;
    app.seed_stock(warehouse, product, dec!(4)).await;
    let (shipment_id, ship_line) = shipped_sale(&app, warehouse, customer, product, dec!(4)).await;

    let created = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: ship_line.id,
            qty: dec!(4),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return creates");
    AuditSalesReturnCommand {
        return_id: created.return_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return audits");
    ReceiveSalesReturnCommand {
        return_id: created.return_id,
        received_by: "dock".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("return receives");
    assert_eq!(app.qc_qty(warehouse, product).await, dec!(4));

    let cancel = CancelSalesReturnCommand {
        return_id: created.return_id,
        canceled_by: "support".into(),
    };
    let canceled = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("cancel applies");
    assert!(!canceled.already_canceled);
    assert_eq!(canceled.status, SalesReturnStatus::Canceled);
    assert_eq!(app.qc_qty(warehouse, product).await, dec!(0));
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));

    let repeat = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("repeat cancel noops");
    assert!(repeat.already_canceled);
}

#[tokio::test]
async fn sales_return_rejects_duplicate_lines_and_foreign_shipment_lines() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("SPEAKER").await;
    app.seed_stock(warehouse, product, dec!(8)).await;
    let (shipment_id, ship_line) = shipped_sale(&app, warehouse, customer, product, dec!(4)).await;
    let (_, other_line) = shipped_sale(&app, warehouse, customer, product, dec!(4)).await;

    let err = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![
            NewSalesReturnLine {
                shipment_line_id: ship_line.id,
                qty: dec!(1),
            },
            NewSalesReturnLine {
                shipment_line_id: ship_line.id,
                qty: dec!(1),
            },
        ],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = CreateSalesReturnCommand {
        shipment_id,
        created_by: "support".into(),
        remark: None,
        lines: vec![NewSalesReturnLine {
            shipment_line_id: other_line.id,
            qty: dec!(1),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
