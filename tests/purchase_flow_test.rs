mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use common::TestApp;
use stockflow_api::commands::purchase::{
    AuditPurchaseOrderCommand, CancelPurchaseOrderCommand, CreatePurchaseOrderCommand,
    ReceivePurchaseOrderCommand, ReverseInboundCommand,
};
use stockflow_api::commands::purchase::create_order_command::NewPurchaseOrderLine;
use stockflow_api::commands::purchase::receive_order_command::ReceiptLine;
use stockflow_api::commands::Command;
use stockflow_api::entities::purchase_inbound;
use stockflow_api::entities::purchase_order::PurchaseOrderStatus;
use stockflow_api::entities::purchase_order_line;
use stockflow_api::errors::ServiceError;

async fn create_audited_order(
    app: &TestApp,
    supplier_id: Uuid,
    warehouse_id: Uuid,
    lines: Vec<NewPurchaseOrderLine>,
) -> (Uuid, Vec<purchase_order_line::Model>) {
    let created = CreatePurchaseOrderCommand {
        supplier_id,
        warehouse_id,
        created_by: "buyer".into(),
        remark: None,
        lines,
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("order creates");
    assert_eq!(created.status, PurchaseOrderStatus::PendingAudit);

    AuditPurchaseOrderCommand {
        order_id: created.order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("order audits");

    let order_lines = purchase_order_line::Entity::find()
        .filter(purchase_order_line::Column::OrderId.eq(created.order_id))
        .all(app.db.as_ref())
        .await
        .expect("lines load");
    (created.order_id, order_lines)
}

#[tokio::test]
async fn purchase_order_runs_to_completion_over_partial_receipts() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let widget = app.seed_product("WIDGET").await;
    let gadget = app.seed_product("GADGET").await;

    let (order_id, lines) = create_audited_order(
        &app,
        supplier,
        warehouse,
        vec![
            NewPurchaseOrderLine {
                product_id: widget,
                unit_price: dec!(2.50),
                qty: dec!(5),
            },
            NewPurchaseOrderLine {
                product_id: gadget,
                unit_price: dec!(10.00),
                qty: dec!(3),
            },
        ],
    )
    .await;
    let widget_line = lines.iter().find(|l| l.product_id == widget).unwrap();
    let gadget_line = lines.iter().find(|l| l.product_id == gadget).unwrap();

    let first = ReceivePurchaseOrderCommand {
        order_id,
        request_token: "rcpt-1".into(),
        received_by: "dock".into(),
        lines: vec![ReceiptLine {
            order_line_id: widget_line.id,
            qty: dec!(3),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("first receipt applies");
    assert_eq!(first.order_status, PurchaseOrderStatus::PartiallyReceived);
    assert!(!first.idempotent_replay);
    assert_eq!(app.balance(warehouse, widget).await, (dec!(3), dec!(0)));

    let second = ReceivePurchaseOrderCommand {
        order_id,
        request_token: "rcpt-2".into(),
        received_by: "dock".into(),
        lines: vec![
            ReceiptLine {
                order_line_id: widget_line.id,
                qty: dec!(2),
            },
            ReceiptLine {
                order_line_id: gadget_line.id,
                qty: dec!(3),
            },
        ],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("second receipt applies");
    assert_eq!(second.order_status, PurchaseOrderStatus::Completed);
    assert_eq!(app.balance(warehouse, widget).await, (dec!(5), dec!(0)));
    assert_eq!(app.balance(warehouse, gadget).await, (dec!(3), dec!(0)));
}

#[tokio::test]
async fn duplicate_request_token_replays_without_double_booking() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("BOLT").await;

    let (order_id, lines) = create_audited_order(
        &app,
        supplier,
        warehouse,
        vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(0.10),
            qty: dec!(100),
        }],
    )
    .await;

    let receive = ReceivePurchaseOrderCommand {
        order_id,
        request_token: "token-once".into(),
        received_by: "dock".into(),
        lines: vec![ReceiptLine {
            order_line_id: lines[0].id,
            qty: dec!(40),
        }],
    };

    let original = receive
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("receipt applies");
    let replay = receive
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("retry answers");

    assert!(replay.idempotent_replay);
    assert_eq!(replay.inbound_no, original.inbound_no);
    assert_eq!(replay.lines.len(), 1);
    assert_eq!(replay.lines[0].qty, dec!(40));
    // Stock moved exactly once.
    assert_eq!(app.balance(warehouse, product).await, (dec!(40), dec!(0)));
}

#[tokio::test]
async fn simultaneous_submissions_of_one_token_book_stock_once() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("SCREW").await;

    let (order_id, lines) = create_audited_order(
        &app,
        supplier,
        warehouse,
        vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(0.05),
            qty: dec!(100),
        }],
    )
    .await;

    let receive = ReceivePurchaseOrderCommand {
        order_id,
        request_token: "token-racy".into(),
        received_by: "dock".into(),
        lines: vec![ReceiptLine {
            order_line_id: lines[0].id,
            qty: dec!(40),
        }],
    };

    let (a, b) = tokio::join!(
        receive.execute(app.db.clone(), app.event_sender.clone()),
        receive.execute(app.db.clone(), app.event_sender.clone()),
    );

    // The loser of the token race either answers with the winner's receipt
    // inside its own transaction or surfaces a transient conflict; a client
    // retry must then replay. Either way the token maps to one inbound.
    let mut fresh = 0;
    let mut inbound_nos = Vec::new();
    for outcome in [a, b] {
        match outcome {
            Ok(receipt) => {
                if !receipt.idempotent_replay {
                    fresh += 1;
                }
                inbound_nos.push(receipt.inbound_no);
            }
            Err(ServiceError::ConcurrentModification(_)) | Err(ServiceError::DatabaseError(_)) => {
                let retried = receive
                    .execute(app.db.clone(), app.event_sender.clone())
                    .await
                    .expect("retry answers");
                if !retried.idempotent_replay {
                    fresh += 1;
                }
                inbound_nos.push(retried.inbound_no);
            }
            Err(other) => panic!("unexpected receipt failure: {other}"),
        }
    }
    assert_eq!(fresh, 1);
    assert_eq!(inbound_nos[0], inbound_nos[1]);
    assert_eq!(app.balance(warehouse, product).await, (dec!(40), dec!(0)));

    let inbounds = purchase_inbound::Entity::find()
        .filter(purchase_inbound::Column::RequestToken.eq("token-racy"))
        .count(app.db.as_ref())
        .await
        .expect("count runs");
    assert_eq!(inbounds, 1);
}

#[tokio::test]
async fn receiving_rejects_unaudited_orders_and_over_receipts() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("NUT").await;

    let created = CreatePurchaseOrderCommand {
        supplier_id: supplier,
        warehouse_id: warehouse,
        created_by: "buyer".into(),
        remark: None,
        lines: vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(1.00),
            qty: dec!(10),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("order creates");
    let line_id = purchase_order_line::Entity::find()
        .filter(purchase_order_line::Column::OrderId.eq(created.order_id))
        .one(app.db.as_ref())
        .await
        .expect("line loads")
        .expect("line exists")
        .id;

    let err = ReceivePurchaseOrderCommand {
        order_id: created.order_id,
        request_token: "too-early".into(),
        received_by: "dock".into(),
        lines: vec![ReceiptLine {
            order_line_id: line_id,
            qty: dec!(1),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    AuditPurchaseOrderCommand {
        order_id: created.order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("order audits");

    let err = ReceivePurchaseOrderCommand {
        order_id: created.order_id,
        request_token: "too-much".into(),
        received_by: "dock".into(),
        lines: vec![ReceiptLine {
            order_line_id: line_id,
            qty: dec!(11),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));
}

#[tokio::test]
async fn inbound_reversal_restores_stock_and_order_counters() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("SCREW").await;

    let (order_id, lines) = create_audited_order(
        &app,
        supplier,
        warehouse,
        vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(0.05),
            qty: dec!(50),
        }],
    )
    .await;

    let receipt = ReceivePurchaseOrderCommand {
        order_id,
        request_token: "rcpt-rev".into(),
        received_by: "dock".into(),
        lines: vec![ReceiptLine {
            order_line_id: lines[0].id,
            qty: dec!(50),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("receipt applies");
    assert_eq!(receipt.order_status, PurchaseOrderStatus::Completed);

    let reverse = ReverseInboundCommand {
        inbound_no: receipt.inbound_no.clone(),
        reversed_by: "auditor".into(),
    };
    let reversal = reverse
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("reversal applies");
    assert!(!reversal.idempotent_replay);
    assert_eq!(reversal.order_status, PurchaseOrderStatus::Audited);
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));

    let replay = reverse
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("retry answers");
    assert!(replay.idempotent_replay);
    assert_eq!(replay.reversal_no, reversal.reversal_no);
    assert_eq!(app.balance(warehouse, product).await, (dec!(0), dec!(0)));
}

#[tokio::test]
async fn cancel_is_blocked_once_goods_arrived_and_noops_on_repeat() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let product = app.seed_product("PIN").await;

    let (order_id, lines) = create_audited_order(
        &app,
        supplier,
        warehouse,
        vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(1.00),
            qty: dec!(10),
        }],
    )
    .await;

    ReceivePurchaseOrderCommand {
        order_id,
        request_token: "rcpt-cancel".into(),
        received_by: "dock".into(),
        lines: vec![ReceiptLine {
            order_line_id: lines[0].id,
            qty: dec!(4),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("receipt applies");

    let err = CancelPurchaseOrderCommand {
        order_id,
        canceled_by: "buyer".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    // An untouched order cancels cleanly, and a second cancel is a no-op.
    let (fresh_id, _) = create_audited_order(
        &app,
        supplier,
        warehouse,
        vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(1.00),
            qty: dec!(1),
        }],
    )
    .await;
    let cancel = CancelPurchaseOrderCommand {
        order_id: fresh_id,
        canceled_by: "buyer".into(),
    };
    let first = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("cancel applies");
    assert!(!first.already_canceled);
    assert_eq!(first.status, PurchaseOrderStatus::Canceled);

    let second = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("repeat cancel noops");
    assert!(second.already_canceled);
}

#[tokio::test]
async fn creation_rejects_disabled_warehouse_and_wrong_partner_kind() {
    let app = TestApp::spawn().await;
    let disabled = app.seed_disabled_warehouse().await;
    let warehouse = app.seed_warehouse().await;
    let supplier = app.seed_supplier().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("CLIP").await;

    let err = CreatePurchaseOrderCommand {
        supplier_id: supplier,
        warehouse_id: disabled,
        created_by: "buyer".into(),
        remark: None,
        lines: vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(1.00),
            qty: dec!(1),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = CreatePurchaseOrderCommand {
        supplier_id: customer,
        warehouse_id: warehouse,
        created_by: "buyer".into(),
        remark: None,
        lines: vec![NewPurchaseOrderLine {
            product_id: product,
            unit_price: dec!(1.00),
            qty: dec!(1),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
