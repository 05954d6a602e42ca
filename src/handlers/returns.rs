use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::commands::returns::{
    AuditPurchaseReturnCommand, AuditSalesReturnCommand, CancelPurchaseReturnCommand,
    CancelSalesReturnCommand, CreatePurchaseReturnCommand, CreateSalesReturnCommand,
    ExecutePurchaseReturnCommand, QcPassSalesReturnCommand, QcRejectSalesReturnCommand,
    ReceiveSalesReturnCommand,
};
use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor: String,
}

pub async fn create_purchase_return(
    State(state): State<AppState>,
    Json(command): Json<CreatePurchaseReturnCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.returns.create_purchase_return(command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn audit_purchase_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let audited = state
        .services
        .returns
        .audit_purchase_return(AuditPurchaseReturnCommand {
            return_id,
            audited_by: body.actor,
        })
        .await?;
    Ok(Json(audited))
}

pub async fn execute_purchase_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let executed = state
        .services
        .returns
        .execute_purchase_return(ExecutePurchaseReturnCommand {
            return_id,
            executed_by: body.actor,
        })
        .await?;
    Ok(Json(executed))
}

pub async fn cancel_purchase_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let canceled = state
        .services
        .returns
        .cancel_purchase_return(CancelPurchaseReturnCommand {
            return_id,
            canceled_by: body.actor,
        })
        .await?;
    Ok(Json(canceled))
}

pub async fn create_sales_return(
    State(state): State<AppState>,
    Json(command): Json<CreateSalesReturnCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.returns.create_sales_return(command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn audit_sales_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let audited = state
        .services
        .returns
        .audit_sales_return(AuditSalesReturnCommand {
            return_id,
            audited_by: body.actor,
        })
        .await?;
    Ok(Json(audited))
}

pub async fn receive_sales_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let received = state
        .services
        .returns
        .receive_sales_return(ReceiveSalesReturnCommand {
            return_id,
            received_by: body.actor,
        })
        .await?;
    Ok(Json(received))
}

#[derive(Debug, Deserialize)]
pub struct QcPassRequest {
    pub qc_by: String,
    pub qc_remark: Option<String>,
}

pub async fn qc_pass_sales_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<QcPassRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let passed = state
        .services
        .returns
        .qc_pass_sales_return(QcPassSalesReturnCommand {
            return_id,
            qc_by: body.qc_by,
            qc_remark: body.qc_remark,
        })
        .await?;
    Ok(Json(passed))
}

#[derive(Debug, Deserialize)]
pub struct QcRejectRequest {
    pub qc_by: String,
    pub qc_remark: String,
}

pub async fn qc_reject_sales_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<QcRejectRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let rejected = state
        .services
        .returns
        .qc_reject_sales_return(QcRejectSalesReturnCommand {
            return_id,
            qc_by: body.qc_by,
            qc_remark: body.qc_remark,
        })
        .await?;
    Ok(Json(rejected))
}

pub async fn cancel_sales_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let canceled = state
        .services
        .returns
        .cancel_sales_return(CancelSalesReturnCommand {
            return_id,
            canceled_by: body.actor,
        })
        .await?;
    Ok(Json(canceled))
}
