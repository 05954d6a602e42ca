use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::commands::counts::{
    CancelStockCountCommand, CreateStockCountCommand, ExecuteStockCountCommand,
};
use crate::errors::ServiceError;
use crate::AppState;

pub async fn create_count(
    State(state): State<AppState>,
    Json(command): Json<CreateStockCountCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.stock_counts.create_count(command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub executed_by: String,
}

pub async fn execute_count(
    State(state): State<AppState>,
    Path(count_id): Path<Uuid>,
    Json(body): Json<ExecuteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let executed = state
        .services
        .stock_counts
        .execute_count(ExecuteStockCountCommand {
            count_id,
            executed_by: body.executed_by,
        })
        .await?;
    Ok(Json(executed))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub canceled_by: String,
}

pub async fn cancel_count(
    State(state): State<AppState>,
    Path(count_id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let canceled = state
        .services
        .stock_counts
        .cancel_count(CancelStockCountCommand {
            count_id,
            canceled_by: body.canceled_by,
        })
        .await?;
    Ok(Json(canceled))
}
