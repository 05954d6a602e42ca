//! HTTP surface. Handlers deserialize, call the matching service method and
//! serialize the result; all domain rules live in the command layer.

pub mod health;
pub mod inventory;
pub mod purchase_orders;
pub mod returns;
pub mod sales_orders;
pub mod stock_counts;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn api_routes() -> Router<AppState> {
    let purchase = Router::new()
        .route("/purchase-orders", post(purchase_orders::create_order))
        .route("/purchase-orders/:id/audit", post(purchase_orders::audit_order))
        .route(
            "/purchase-orders/:id/receive",
            post(purchase_orders::receive_order),
        )
        .route("/purchase-orders/:id/cancel", post(purchase_orders::cancel_order))
        .route(
            "/purchase-inbounds/:inbound_no/reverse",
            post(purchase_orders::reverse_inbound),
        );

    let sales = Router::new()
        .route("/sales-orders", post(sales_orders::create_order))
        .route("/sales-orders/:id/audit", post(sales_orders::audit_order))
        .route(
            "/sales-orders/:id/precheck-shipment",
            post(sales_orders::precheck_shipment),
        )
        .route("/sales-orders/:id/ship", post(sales_orders::ship_order))
        .route("/sales-orders/:id/cancel", post(sales_orders::cancel_order))
        .route(
            "/shipments/:shipment_no/reverse",
            post(sales_orders::reverse_shipment),
        );

    let returns = Router::new()
        .route("/purchase-returns", post(returns::create_purchase_return))
        .route(
            "/purchase-returns/:id/audit",
            post(returns::audit_purchase_return),
        )
        .route(
            "/purchase-returns/:id/execute",
            post(returns::execute_purchase_return),
        )
        .route(
            "/purchase-returns/:id/cancel",
            post(returns::cancel_purchase_return),
        )
        .route("/sales-returns", post(returns::create_sales_return))
        .route("/sales-returns/:id/audit", post(returns::audit_sales_return))
        .route(
            "/sales-returns/:id/receive",
            post(returns::receive_sales_return),
        )
        .route(
            "/sales-returns/:id/qc-pass",
            post(returns::qc_pass_sales_return),
        )
        .route(
            "/sales-returns/:id/qc-reject",
            post(returns::qc_reject_sales_return),
        )
        .route("/sales-returns/:id/cancel", post(returns::cancel_sales_return));

    let counts = Router::new()
        .route("/stock-counts", post(stock_counts::create_count))
        .route("/stock-counts/:id/execute", post(stock_counts::execute_count))
        .route("/stock-counts/:id/cancel", post(stock_counts::cancel_count));

    let inventory = Router::new()
        .route(
            "/inventory/balances/:warehouse_id/:product_id",
            get(inventory::get_balance),
        )
        .route("/inventory/movements", get(inventory::list_movements));

    Router::new()
        .merge(purchase)
        .merge(sales)
        .merge(returns)
        .merge(counts)
        .merge(inventory)
}
