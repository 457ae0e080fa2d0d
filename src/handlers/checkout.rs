use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::auth::AuthContext;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, validate_input};
use crate::services::checkout::ShippingAddress;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckoutSessionRequest {
    #[validate]
    pub shipping_address: ShippingAddress,
}

async fn create_session(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateCheckoutSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let session = state
        .services
        .checkout
        .create_checkout_session(ctx.user_id, payload.shipping_address)
        .await?;
    Ok(created_response(session))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/session", post(create_session))
}
