//! Inventory ledger and order fulfillment engine.
//!
//! Stock truth lives in two places that always move together inside one
//! transaction: the `stock_balances` table (on-hand and reserved per
//! warehouse/product) and the append-only `movement_log`. Documents
//! (purchase orders, sales orders, returns, counts) drive every change
//! through the command layer; nothing mutates a balance outside it.

pub mod commands;
pub mod config;
pub mod db;
pub mod document_no;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod idempotency;
pub mod ledger;
pub mod masters;
pub mod services;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::AppServices;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone());
        Self {
            db,
            event_sender,
            services,
        }
    }
}

/// Full application router: versioned API plus the health probe.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", handlers::api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
