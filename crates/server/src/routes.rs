//! JSON API for the quote lifecycle.
//!
//! Endpoints:
//! - `POST   /api/quotes/public`            — submit an anonymous quote request
//! - `POST   /api/users/{user_id}/quotes`   — submit a quote for a registered user
//! - `GET    /api/quotes`                   — list all quotes (admin)
//! - `GET    /api/quotes/statistics`        — dashboard aggregates (admin)
//! - `GET    /api/quotes/{id}`              — fetch one quote with display names
//! - `GET    /api/users/{user_id}/quotes`   — list a user's quotes
//! - `PUT    /api/quotes/{id}/status`       — move a quote through the lifecycle
//! - `DELETE /api/quotes/{id}`              — withdraw a pending/rejected quote
//! - `POST   /api/quotes/{id}/approve`      — approve a public quote and provision
//!                                            the customer account

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use aquaflow_core::domain::product::ProductId;
use aquaflow_core::domain::quote::{CustomerContact, Quote, QuoteId, QuoteStatus};
use aquaflow_core::domain::user::UserId;
use aquaflow_core::errors::ServiceError;
use aquaflow_core::service::{QuoteRequest, QuoteService, QuoteStatistics, QuoteView};

#[derive(Clone)]
pub struct ApiState {
    service: Arc<QuoteService>,
}

pub fn router(service: Arc<QuoteService>) -> Router {
    Router::new()
        .route("/api/quotes/public", post(create_public_quote))
        .route("/api/quotes", get(list_quotes))
        .route("/api/quotes/statistics", get(quote_statistics))
        .route("/api/quotes/{id}", get(get_quote).delete(delete_quote))
        .route("/api/quotes/{id}/status", put(update_status))
        .route("/api/quotes/{id}/approve", post(approve_quote))
        .route("/api/users/{user_id}/quotes", post(create_user_quote).get(list_user_quotes))
        .with_state(ApiState { service })
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuoteRequestBody {
    pub product_id: i64,
    pub quantity: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

impl QuoteRequestBody {
    fn into_request(self) -> QuoteRequest {
        QuoteRequest {
            product_id: ProductId(self.product_id),
            contact: CustomerContact {
                name: self.name,
                email: self.email,
                phone: self.phone,
                address: self.address,
                company: self.company,
            },
            quantity: self.quantity,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateBody {
    pub status: QuoteStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub quote: Quote,
    pub user_id: UserId,
    pub account_created: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else if self.0.is_business_rule() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_public_quote(
    State(state): State<ApiState>,
    Json(body): Json<QuoteRequestBody>,
) -> Result<(StatusCode, Json<QuoteView>), ApiError> {
    let view = state.service.create_public_quote(body.into_request()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn create_user_quote(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Json(body): Json<QuoteRequestBody>,
) -> Result<(StatusCode, Json<QuoteView>), ApiError> {
    let view = state.service.create_quote(UserId(user_id), body.into_request()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_quotes(State(state): State<ApiState>) -> Result<Json<Vec<QuoteView>>, ApiError> {
    Ok(Json(state.service.list_quotes().await?))
}

async fn list_user_quotes(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<QuoteView>>, ApiError> {
    Ok(Json(state.service.list_quotes_for_user(UserId(user_id)).await?))
}

async fn get_quote(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<QuoteView>, ApiError> {
    Ok(Json(state.service.get_quote(QuoteId(id)).await?))
}

async fn quote_statistics(
    State(state): State<ApiState>,
) -> Result<Json<QuoteStatistics>, ApiError> {
    Ok(Json(state.service.statistics().await?))
}

async fn update_status(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdateBody>,
) -> Result<Json<Quote>, ApiError> {
    let quote = state.service.update_status(QuoteId(id), body.status, body.admin_notes).await?;
    Ok(Json(quote))
}

async fn delete_quote(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_quote(QuoteId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_quote(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    body: Option<Json<ApproveBody>>,
) -> Result<Json<ApproveResponse>, ApiError> {
    let admin_notes = body.and_then(|Json(b)| b.admin_notes);
    let outcome = state.service.approve_and_provision(QuoteId(id), admin_notes).await?;
    Ok(Json(ApproveResponse {
        quote: outcome.quote,
        user_id: outcome.user_id,
        account_created: outcome.account_created,
    }))
}
