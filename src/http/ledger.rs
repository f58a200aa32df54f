use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::application::AppError;
use crate::domain::{bps_from_percentage, Commission, CommissionStatus, Withdrawal};

use super::{amount_from_units, broker_id_from_body, broker_id_from_query, AppState};

#[derive(Debug, Deserialize)]
pub struct BrokerQuery {
    #[serde(alias = "broker_id")]
    corretor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommissionsResponse {
    commissions: Vec<Commission>,
}

pub async fn list_commissions(
    State(state): State<AppState>,
    query: Result<Query<BrokerQuery>, QueryRejection>,
) -> Result<Json<CommissionsResponse>, AppError> {
    let Query(query) = query?;
    let broker_id = broker_id_from_query(query.corretor_id.as_deref())?;

    let commissions = state.service.list_commissions(broker_id).await?;
    Ok(Json(CommissionsResponse { commissions }))
}

#[derive(Debug, Deserialize)]
pub struct RecordCommissionRequest {
    #[serde(alias = "corretor_id")]
    broker_id: Option<String>,
    #[serde(alias = "venda_valor", alias = "valor_venda")]
    sale_amount: Option<f64>,
    #[serde(alias = "porcentagem")]
    percentage: Option<f64>,
    #[serde(default)]
    status: Option<CommissionStatus>,
}

#[derive(Debug, Serialize)]
pub struct CommissionResponse {
    commission: Commission,
}

pub async fn record_commission(
    State(state): State<AppState>,
    payload: Result<Json<RecordCommissionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommissionResponse>), AppError> {
    let Json(req) = payload?;
    let broker_id = broker_id_from_body(req.broker_id.as_deref())?;
    let sale_amount_cents = amount_from_units(req.sale_amount, "sale_amount")?;
    let percentage = req.percentage.ok_or(AppError::MissingField("percentage"))?;
    let percentage_bps = bps_from_percentage(percentage)
        .map_err(|_| AppError::InvalidAmount("Invalid percentage".to_string()))?;

    let commission = state
        .service
        .record_commission(
            broker_id,
            sale_amount_cents,
            percentage_bps,
            req.status.unwrap_or(CommissionStatus::Pending),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CommissionResponse { commission })))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    #[serde(alias = "corretor_id")]
    broker_id: Option<String>,
    #[serde(alias = "valor")]
    amount: Option<f64>,
    #[serde(alias = "senha")]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    withdrawal: Withdrawal,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    payload: Result<Json<WithdrawalRequest>, JsonRejection>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let Json(req) = payload?;
    let broker_id = broker_id_from_body(req.broker_id.as_deref())?;
    let amount_cents = amount_from_units(req.amount, "amount")?;
    let password = req.password.ok_or(AppError::MissingField("password"))?;

    let withdrawal = state
        .service
        .request_withdrawal(broker_id, amount_cents, &password)
        .await?;

    Ok(Json(WithdrawalResponse { withdrawal }))
}

#[derive(Debug, Serialize)]
pub struct WithdrawalsResponse {
    withdrawals: Vec<Withdrawal>,
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    query: Result<Query<BrokerQuery>, QueryRejection>,
) -> Result<Json<WithdrawalsResponse>, AppError> {
    let Query(query) = query?;
    let broker_id = broker_id_from_query(query.corretor_id.as_deref())?;

    let withdrawals = state.service.list_withdrawals(Some(broker_id)).await?;
    Ok(Json(WithdrawalsResponse { withdrawals }))
}
