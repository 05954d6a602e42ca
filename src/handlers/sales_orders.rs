use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::commands::sales::precheck_shipment_command::PrecheckLine;
use crate::commands::sales::ship_order_command::ShipLine;
use crate::commands::sales::{
    AuditSalesOrderCommand, CancelSalesOrderCommand, CreateSalesOrderCommand,
    PrecheckShipmentCommand, ReverseShipmentCommand, ShipSalesOrderCommand,
};
use crate::errors::ServiceError;
use crate::AppState;

pub async fn create_order(
    State(state): State<AppState>,
    Json(command): Json<CreateSalesOrderCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.sales_orders.create_order(command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    pub audited_by: String,
}

pub async fn audit_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<AuditRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let audited = state
        .services
        .sales_orders
        .audit_order(AuditSalesOrderCommand {
            order_id,
            audited_by: body.audited_by,
        })
        .await?;
    Ok(Json(audited))
}

#[derive(Debug, Deserialize)]
pub struct PrecheckRequest {
    pub lines: Vec<PrecheckLine>,
}

pub async fn precheck_shipment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<PrecheckRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state
        .services
        .sales_orders
        .precheck_shipment(PrecheckShipmentCommand {
            order_id,
            lines: body.lines,
        })
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    pub shipped_by: String,
    pub lines: Vec<ShipLine>,
}

pub async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<ShipRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let shipped = state
        .services
        .sales_orders
        .ship_order(ShipSalesOrderCommand {
            order_id,
            shipped_by: body.shipped_by,
            lines: body.lines,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(shipped)))
}

#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub reversed_by: String,
}

pub async fn reverse_shipment(
    State(state): State<AppState>,
    Path(shipment_no): Path<String>,
    Json(body): Json<ReverseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let reversed = state
        .services
        .sales_orders
        .reverse_shipment(ReverseShipmentCommand {
            shipment_no,
            reversed_by: body.reversed_by,
        })
        .await?;
    Ok(Json(reversed))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub canceled_by: String,
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let canceled = state
        .services
        .sales_orders
        .cancel_order(CancelSalesOrderCommand {
            order_id,
            canceled_by: body.canceled_by,
        })
        .await?;
    Ok(Json(canceled))
}
