use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::commands::purchase::receive_order_command::ReceiptLine;
use crate::commands::purchase::{
    AuditPurchaseOrderCommand, CancelPurchaseOrderCommand, CreatePurchaseOrderCommand,
    ReceivePurchaseOrderCommand, ReverseInboundCommand,
};
use crate::errors::ServiceError;
use crate::AppState;

pub async fn create_order(
    State(state): State<AppState>,
    Json(command): Json<CreatePurchaseOrderCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.purchase_orders.create_order(command).await?;
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
        .purchase_orders
        .audit_order(AuditPurchaseOrderCommand {
            order_id,
            audited_by: body.audited_by,
        })
        .await?;
    Ok(Json(audited))
}

#[derive(Debug, Deserialize)]
pub struct ReceiveRequest {
    pub request_token: String,
    pub received_by: String,
    pub lines: Vec<ReceiptLine>,
}

pub async fn receive_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<ReceiveRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let received = state
        .services
        .purchase_orders
        .receive_order(ReceivePurchaseOrderCommand {
            order_id,
            request_token: body.request_token,
            received_by: body.received_by,
            lines: body.lines,
        })
        .await?;
    Ok(Json(received))
}

#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub reversed_by: String,
}

pub async fn reverse_inbound(
    State(state): State<AppState>,
    Path(inbound_no): Path<String>,
    Json(body): Json<ReverseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let reversed = state
        .services
        .purchase_orders
        .reverse_inbound(ReverseInboundCommand {
            inbound_no,
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
        .purchase_orders
        .cancel_order(CancelPurchaseOrderCommand {
            order_id,
            canceled_by: body.canceled_by,
        })
        .await?;
    Ok(Json(canceled))
}
