// HTTP layer - axum router over PortalService.
// Handlers parse requests, call the service and shape JSON responses;
// no business rules live here.

mod auth;
mod brokers;
mod error;
mod ledger;
mod listings;
mod verification;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::{AppError, PortalService};
use crate::domain::{cents_from_units, BrokerId, Cents};

/// Server settings taken from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Return issued verification codes in the response body. Honoured only
    /// in debug builds.
    pub echo_codes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            echo_codes: false,
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PortalService>,
    pub echo_codes: bool,
}

impl AppState {
    pub fn new(service: PortalService, echo_codes: bool) -> Self {
        Self {
            service: Arc::new(service),
            echo_codes: echo_codes && cfg!(debug_assertions),
        }
    }
}

/// Build the portal router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/auth/google-login", post(auth::google_login))
        .route("/auth/completar-cadastro", post(auth::complete_profile))
        .route("/auth/criar-senha", post(auth::create_password))
        .route("/corretores", post(brokers::create_broker))
        .route("/corretores/dados-bancarios", post(brokers::save_bank_details))
        .route(
            "/imoveis",
            post(listings::create_listing).get(listings::list_listings),
        )
        .route(
            "/comissoes",
            get(ledger::list_commissions).post(ledger::record_commission),
        )
        .route(
            "/saques",
            post(ledger::request_withdrawal).get(ledger::list_withdrawals),
        )
        .route("/verificacao/enviar-codigo", post(verification::send_code))
        .route("/verificacao/validar-codigo", post(verification::validate_code))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(service: PortalService, config: ServerConfig) -> anyhow::Result<()> {
    if config.echo_codes && !cfg!(debug_assertions) {
        warn!("--echo-codes is ignored in release builds");
    }

    let app = router(AppState::new(service, config.echo_codes));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    info!(addr = %config.bind, "portal listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("portal stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ========================
// Request helpers
// ========================

/// Required broker id from a request body. Ids that do not parse cannot
/// name an existing broker.
pub(crate) fn broker_id_from_body(raw: Option<&str>) -> Result<BrokerId, AppError> {
    let raw = required(raw, "broker_id")?;
    Uuid::parse_str(raw).map_err(|_| AppError::BrokerNotFound(raw.to_string()))
}

/// Required broker id from a query string.
pub(crate) fn broker_id_from_query(raw: Option<&str>) -> Result<BrokerId, AppError> {
    let raw = required(raw, "corretor_id")?;
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid corretor_id: {}", raw)))
}

pub(crate) fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::MissingField(field)),
    }
}

/// Decimal currency units from a request to cents.
pub(crate) fn amount_from_units(value: Option<f64>, field: &'static str) -> Result<Cents, AppError> {
    let value = value.ok_or(AppError::MissingField(field))?;
    cents_from_units(value).map_err(|_| AppError::InvalidAmount(format!("Invalid {}", field)))
}
