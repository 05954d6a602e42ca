mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::TestApp;
use stockflow_api::commands::sales::create_order_command::NewSalesOrderLine;
use stockflow_api::commands::sales::precheck_shipment_command::PrecheckLine;
use stockflow_api::commands::sales::ship_order_command::ShipLine;
use stockflow_api::commands::sales::{
    AuditSalesOrderCommand, CancelSalesOrderCommand, CreateSalesOrderCommand,
    PrecheckShipmentCommand, ReverseShipmentCommand, ShipSalesOrderCommand,
};
use stockflow_api::commands::Command;
use stockflow_api::entities::sales_order::{self, SalesOrderStatus};
use stockflow_api::entities::sales_order_line;
use stockflow_api::errors::ServiceError;

async fn create_order(
    app: &TestApp,
    customer_id: Uuid,
    warehouse_id: Uuid,
    lines: Vec<NewSalesOrderLine>,
) -> (Uuid, Vec<sales_order_line::Model>) {
    let created = CreateSalesOrderCommand {
        customer_id,
        warehouse_id,
        created_by: "sales".into(),
        remark: None,
        lines,
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("order creates");
    assert_eq!(created.status, SalesOrderStatus::Draft);

    let order_lines = sales_order_line::Entity::find()
        .filter(sales_order_line::Column::OrderId.eq(created.order_id))
        .all(app.db.as_ref())
        .await
        .expect("lines load");
    (created.order_id, order_lines)
}

#[tokio::test]
async fn audit_reserves_all_lines_or_nothing() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let widget = app.seed_product("WIDGET").await;
    let gadget = app.seed_product("GADGET").await;
    app.seed_stock(warehouse, widget, dec!(10)).await;
    app.seed_stock(warehouse, gadget, dec!(1)).await;

    // Second line is short: the whole audit rolls back, widget included.
    let (short_id, _) = create_order(
        &app,
        customer,
        warehouse,
        vec![
            NewSalesOrderLine {
                product_id: widget,
                unit_price: dec!(9.99),
                qty: dec!(4),
            },
            NewSalesOrderLine {
                product_id: gadget,
                unit_price: dec!(25.00),
                qty: dec!(2),
            },
        ],
    )
    .await;
    let err = AuditSalesOrderCommand {
        order_id: short_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.balance(warehouse, widget).await, (dec!(10), dec!(0)));
    assert_eq!(app.balance(warehouse, gadget).await, (dec!(1), dec!(0)));

    let (order_id, _) = create_order(
        &app,
        customer,
        warehouse,
        vec![NewSalesOrderLine {
            product_id: widget,
            unit_price: dec!(9.99),
            qty: dec!(4),
        }],
    )
    .await;
    let audited = AuditSalesOrderCommand {
        order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");
    assert_eq!(audited.status, SalesOrderStatus::Audited);
    assert_eq!(app.balance(warehouse, widget).await, (dec!(10), dec!(4)));
}

#[tokio::test]
async fn precheck_reports_shortfalls_without_mutating() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("CABLE").await;
    app.seed_stock(warehouse, product, dec!(5)).await;

    let (order_id, lines) = create_order(
        &app,
        customer,
        warehouse,
        vec![NewSalesOrderLine {
            product_id: product,
            unit_price: dec!(3.00),
            qty: dec!(5),
        }],
    )
    .await;
    AuditSalesOrderCommand {
        order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");

    let report = PrecheckShipmentCommand {
        order_id,
        lines: vec![PrecheckLine {
            order_line_id: lines[0].id,
            qty: dec!(5),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("precheck runs");
    assert!(report.shippable);

    let report = PrecheckShipmentCommand {
        order_id,
        lines: vec![PrecheckLine {
            order_line_id: lines[0].id,
            qty: dec!(6),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("precheck runs");
    assert!(!report.shippable);
    assert!(!report.lines[0].ok);
    assert!(report.lines[0].reason.is_some());

    // Dry run only.
    assert_eq!(app.balance(warehouse, product).await, (dec!(5), dec!(5)));
}

#[tokio::test]
async fn shipping_consumes_reservation_and_completes_in_parts() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("LAMP").await;
    app.seed_stock(warehouse, product, dec!(20)).await;

    let (order_id, lines) = create_order(
        &app,
        customer,
        warehouse,
        vec![NewSalesOrderLine {
            product_id: product,
            unit_price: dec!(15.00),
            qty: dec!(8),
        }],
    )
    .await;
    AuditSalesOrderCommand {
        order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");

    let first = ShipSalesOrderCommand {
        order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: lines[0].id,
            qty: dec!(5),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("first shipment applies");
    assert_eq!(first.order_status, SalesOrderStatus::PartiallyShipped);
    assert_eq!(app.balance(warehouse, product).await, (dec!(15), dec!(3)));

    let err = ShipSalesOrderCommand {
        order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: lines[0].id,
            qty: dec!(4),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let second = ShipSalesOrderCommand {
        order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: lines[0].id,
            qty: dec!(3),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("final shipment applies");
    assert_eq!(second.order_status, SalesOrderStatus::Shipped);
    assert_eq!(app.balance(warehouse, product).await, (dec!(12), dec!(0)));
}

#[tokio::test]
async fn reversal_restores_stock_and_the_reservation() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("DESK").await;
    app.seed_stock(warehouse, product, dec!(10)).await;

    let (order_id, lines) = create_order(
        &app,
        customer,
        warehouse,
        vec![NewSalesOrderLine {
            product_id: product,
            unit_price: dec!(120.00),
            qty: dec!(6),
        }],
    )
    .await;
    AuditSalesOrderCommand {
        order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");

    let shipped = ShipSalesOrderCommand {
        order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: lines[0].id,
            qty: dec!(6),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("shipment applies");
    assert_eq!(shipped.order_status, SalesOrderStatus::Shipped);
    assert_eq!(app.balance(warehouse, product).await, (dec!(4), dec!(0)));

    let reverse = ReverseShipmentCommand {
        shipment_no: shipped.shipment_no.clone(),
        reversed_by: "auditor".into(),
    };
    let reversal = reverse
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("reversal applies");
    assert!(!reversal.idempotent_replay);
    assert_eq!(reversal.order_status, SalesOrderStatus::Audited);
    // The goods are back on hand and earmarked for the order again.
    assert_eq!(app.balance(warehouse, product).await, (dec!(10), dec!(6)));

    let replay = reverse
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("retry answers");
    assert!(replay.idempotent_replay);
    assert_eq!(replay.reversal_no, reversal.reversal_no);
    assert_eq!(app.balance(warehouse, product).await, (dec!(10), dec!(6)));
}

#[tokio::test]
async fn shipments_of_canceled_orders_cannot_be_reversed() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("STOOL").await;
    app.seed_stock(warehouse, product, dec!(10)).await;

    let (order_id, lines) = create_order(
        &app,
        customer,
        warehouse,
        vec![NewSalesOrderLine {
            product_id: product,
            unit_price: dec!(18.00),
            qty: dec!(7),
        }],
    )
    .await;
    AuditSalesOrderCommand {
        order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");
    let shipped = ShipSalesOrderCommand {
        order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: lines[0].id,
            qty: dec!(2),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("shipment applies");
    CancelSalesOrderCommand {
        order_id,
        canceled_by: "sales".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("cancel applies");
    assert_eq!(app.balance(warehouse, product).await, (dec!(8), dec!(0)));

    // The cancel already released the unshipped remainder; undoing the
    // shipment now would revive the order with a stale reservation.
    let err = ReverseShipmentCommand {
        shipment_no: shipped.shipment_no.clone(),
        reversed_by: "auditor".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    assert_eq!(app.balance(warehouse, product).await, (dec!(8), dec!(0)));
    let order = sales_order::Entity::find_by_id(order_id)
        .one(app.db.as_ref())
        .await
        .expect("order loads")
        .expect("order exists");
    assert_eq!(order.status, SalesOrderStatus::Canceled);
}

#[tokio::test]
async fn cancel_releases_the_unshipped_remainder() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("CHAIR").await;
    app.seed_stock(warehouse, product, dec!(10)).await;

    let (order_id, lines) = create_order(
        &app,
        customer,
        warehouse,
        vec![NewSalesOrderLine {
            product_id: product,
            unit_price: dec!(45.00),
            qty: dec!(7),
        }],
    )
    .await;
    AuditSalesOrderCommand {
        order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");

    ShipSalesOrderCommand {
        order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: lines[0].id,
            qty: dec!(2),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("shipment applies");

    let cancel = CancelSalesOrderCommand {
        order_id,
        canceled_by: "sales".into(),
    };
    let canceled = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("cancel applies");
    assert!(!canceled.already_canceled);
    assert_eq!(canceled.released_qty, dec!(5));
    assert_eq!(app.balance(warehouse, product).await, (dec!(8), dec!(0)));

    let repeat = cancel
        .execute(app.db.clone(), app.event_sender.clone())
        .await
        .expect("repeat cancel noops");
    assert!(repeat.already_canceled);
    assert_eq!(repeat.released_qty, dec!(0));
}

#[tokio::test]
async fn fully_shipped_orders_cannot_be_canceled() {
    let app = TestApp::spawn().await;
    let warehouse = app.seed_warehouse().await;
    let customer = app.seed_customer().await;
    let product = app.seed_product("SHELF").await;
    app.seed_stock(warehouse, product, dec!(3)).await;

    let (order_id, lines) = create_order(
        &app,
        customer,
        warehouse,
        vec![NewSalesOrderLine {
            product_id: product,
            unit_price: dec!(30.00),
            qty: dec!(3),
        }],
    )
    .await;
    AuditSalesOrderCommand {
        order_id,
        audited_by: "manager".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("audit reserves");
    ShipSalesOrderCommand {
        order_id,
        shipped_by: "picker".into(),
        lines: vec![ShipLine {
            order_line_id: lines[0].id,
            qty: dec!(3),
        }],
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .expect("shipment applies");

    let err = CancelSalesOrderCommand {
        order_id,
        canceled_by: "sales".into(),
    }
    .execute(app.db.clone(), app.event_sender.clone())
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}
