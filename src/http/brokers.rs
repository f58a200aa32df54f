use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::application::AppError;
use crate::domain::{BankDetails, SignupForm};

use super::auth::BrokerResponse;
use super::{broker_id_from_body, AppState};

pub async fn create_broker(
    State(state): State<AppState>,
    payload: Result<Json<SignupForm>, JsonRejection>,
) -> Result<(StatusCode, Json<BrokerResponse>), AppError> {
    let Json(form) = payload?;
    let broker = state.service.register_broker(form).await?;
    Ok((StatusCode::CREATED, Json(BrokerResponse { broker })))
}

#[derive(Debug, Deserialize)]
pub struct BankDetailsRequest {
    #[serde(alias = "corretor_id")]
    broker_id: Option<String>,
    #[serde(default, alias = "dados_bancarios", alias = "dadosBancarios")]
    bank_details: BankDetails,
}

pub async fn save_bank_details(
    State(state): State<AppState>,
    payload: Result<Json<BankDetailsRequest>, JsonRejection>,
) -> Result<Json<BrokerResponse>, AppError> {
    let Json(req) = payload?;
    let broker_id = broker_id_from_body(req.broker_id.as_deref())?;

    let broker = state
        .service
        .save_bank_details(broker_id, req.bank_details)
        .await?;
    Ok(Json(BrokerResponse { broker }))
}
