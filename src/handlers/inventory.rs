use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::commands::inventory::{GetStockBalanceCommand, ListMovementsCommand};
use crate::entities::movement_log::MovementOperation;
use crate::errors::ServiceError;
use crate::AppState;

pub async fn get_balance(
    State(state): State<AppState>,
    Path((warehouse_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let balance = state
        .services
        .inventory
        .get_balance(GetStockBalanceCommand {
            warehouse_id,
            product_id,
        })
        .await?;
    Ok(Json(balance))
}

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub warehouse_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub operation: Option<MovementOperation>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .inventory
        .list_movements(ListMovementsCommand {
            warehouse_id: query.warehouse_id,
            product_id: query.product_id,
            operation: query.operation,
            page: query.page,
            per_page: query.per_page,
        })
        .await?;
    Ok(Json(page))
}
