use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::application::AppError;
use crate::domain::{Broker, ProfileUpdate};

use super::{broker_id_from_body, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    #[serde(alias = "senha")]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BrokerResponse {
    pub broker: Broker,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<BrokerResponse>, AppError> {
    let Json(req) = payload?;

    // Missing credentials fail the same way as wrong ones.
    let broker = state
        .service
        .login(
            req.email.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(BrokerResponse { broker }))
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    email: Option<String>,
    #[serde(alias = "nome")]
    name: Option<String>,
    #[serde(alias = "googleId")]
    google_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginResponse {
    broker: Broker,
    is_new_user: bool,
    needs_completion: bool,
}

pub async fn google_login(
    State(state): State<AppState>,
    payload: Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> Result<Json<GoogleLoginResponse>, AppError> {
    let Json(req) = payload?;

    let outcome = state
        .service
        .google_login(
            req.email.as_deref().unwrap_or_default(),
            req.name.as_deref().unwrap_or_default(),
            req.google_id.filter(|id| !id.trim().is_empty()),
        )
        .await?;

    Ok(Json(GoogleLoginResponse {
        broker: outcome.broker,
        is_new_user: outcome.is_new_user,
        needs_completion: outcome.needs_completion,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CompleteProfileRequest {
    #[serde(alias = "corretor_id")]
    broker_id: Option<String>,
    #[serde(default, alias = "dados")]
    data: ProfileUpdate,
}

pub async fn complete_profile(
    State(state): State<AppState>,
    payload: Result<Json<CompleteProfileRequest>, JsonRejection>,
) -> Result<Json<BrokerResponse>, AppError> {
    let Json(req) = payload?;
    let broker_id = broker_id_from_body(req.broker_id.as_deref())?;

    let broker = state.service.complete_profile(broker_id, &req.data).await?;
    Ok(Json(BrokerResponse { broker }))
}

#[derive(Debug, Deserialize)]
pub struct CreatePasswordRequest {
    #[serde(alias = "corretor_id")]
    broker_id: Option<String>,
    #[serde(alias = "senha")]
    password: Option<String>,
}

pub async fn create_password(
    State(state): State<AppState>,
    payload: Result<Json<CreatePasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    let broker_id = broker_id_from_body(req.broker_id.as_deref())?;

    state
        .service
        .set_password(broker_id, req.password.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(json!({ "message": "Password saved" })))
}
