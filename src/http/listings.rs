use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::application::{AppError, NewListing};
use crate::domain::Listing;

use super::{amount_from_units, broker_id_from_body, broker_id_from_query, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    #[serde(alias = "corretor_id")]
    broker_id: Option<String>,
    #[serde(alias = "nome")]
    name: Option<String>,
    #[serde(default, alias = "cidade")]
    city: String,
    #[serde(default, alias = "estado")]
    state: String,
    #[serde(alias = "preco", alias = "valor")]
    price: Option<f64>,
    #[serde(default, alias = "descricao")]
    description: String,
    #[serde(default, alias = "fotos")]
    photos: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    listing: Listing,
}

pub async fn create_listing(
    State(state): State<AppState>,
    payload: Result<Json<CreateListingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ListingResponse>), AppError> {
    let Json(req) = payload?;
    let broker_id = broker_id_from_body(req.broker_id.as_deref())?;

    let listing = state
        .service
        .create_listing(NewListing {
            broker_id,
            name: req.name.unwrap_or_default(),
            city: req.city,
            state: req.state,
            price_cents: amount_from_units(req.price, "price")?,
            description: req.description,
            photos: req.photos,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ListingResponse { listing })))
}

#[derive(Debug, Deserialize)]
pub struct ListingsQuery {
    #[serde(alias = "broker_id")]
    corretor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    listings: Vec<Listing>,
}

pub async fn list_listings(
    State(state): State<AppState>,
    query: Result<Query<ListingsQuery>, QueryRejection>,
) -> Result<Json<ListingsResponse>, AppError> {
    let Query(query) = query?;
    let broker_id = broker_id_from_query(query.corretor_id.as_deref())?;

    let listings = state.service.list_listings(broker_id).await?;
    Ok(Json(ListingsResponse { listings }))
}
