use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::AuthContext;
use crate::errors::ApiError;
use crate::handlers::common::{success_response, validate_input};
use crate::services::orders::OrderResponse;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, message = "Session id is required"))]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub order: OrderResponse,
    /// True when a previous confirmation already created this order
    pub already_processed: bool,
}

/// Called after the shopper returns from the hosted payment page. Safe to
/// retry: repeated calls for the same session return the same order.
async fn confirm_payment(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let confirmed = state
        .services
        .payments
        .confirm_payment(&payload.session_id)
        .await?;
    Ok(success_response(ConfirmPaymentResponse {
        order: OrderResponse::from_parts(confirmed.order, confirmed.items),
        already_processed: confirmed.already_processed,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/confirm", post(confirm_payment))
}
