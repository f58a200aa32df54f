use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::AppError;
use crate::domain::{Broker, VerificationPurpose};

use super::{required, AppState};

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    email: Option<String>,
    #[serde(default, alias = "tipo")]
    purpose: Option<VerificationPurpose>,
    #[serde(default, alias = "dadosCadastro", alias = "dados_cadastro")]
    pending_payload: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dev_code: Option<String>,
}

/// Issue a code. Delivery to the user is out of band; debug builds started
/// with code echoing return it in `dev_code`.
pub async fn send_code(
    State(state): State<AppState>,
    payload: Result<Json<SendCodeRequest>, JsonRejection>,
) -> Result<Json<SendCodeResponse>, AppError> {
    let Json(req) = payload?;
    let email = required(req.email.as_deref(), "email")?;
    let purpose = req.purpose.ok_or(AppError::MissingField("purpose"))?;

    let issued = state
        .service
        .issue_code(email, purpose, req.pending_payload)
        .await?;

    Ok(Json(SendCodeResponse {
        message: format!("Verification code sent ({})", purpose),
        dev_code: state.echo_codes.then_some(issued.code),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateCodeRequest {
    email: Option<String>,
    #[serde(alias = "codigo")]
    code: Option<String>,
    #[serde(default, alias = "tipo")]
    purpose: Option<VerificationPurpose>,
}

#[derive(Debug, Serialize)]
pub struct ValidateCodeResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    broker: Option<Broker>,
    message: String,
}

pub async fn validate_code(
    State(state): State<AppState>,
    payload: Result<Json<ValidateCodeRequest>, JsonRejection>,
) -> Result<Json<ValidateCodeResponse>, AppError> {
    let Json(req) = payload?;
    let email = required(req.email.as_deref(), "email")?;
    let code = required(req.code.as_deref(), "code")?;
    let purpose = req.purpose.ok_or(AppError::MissingField("purpose"))?;

    let broker = state.service.confirm_code(email, code, purpose).await?;
    let message = match &broker {
        Some(_) => "Registration complete".to_string(),
        None => "Code verified".to_string(),
    };

    Ok(Json(ValidateCodeResponse {
        valid: true,
        broker,
        message,
    }))
}
