use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthContext;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, no_content_response, success_response, validate_input, PaginationParams,
};
use crate::services::checkout::ShippingAddress;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCodOrderRequest {
    #[validate]
    pub shipping_address: ShippingAddress,
}

async fn create_cod_order(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateCodOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .create_cod_order(&ctx, payload.shipping_address)
        .await?;
    Ok(created_response(order))
}

async fn get_order(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.get_order(&ctx, order_id).await?;
    Ok(success_response(order))
}

async fn mark_delivered(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.mark_delivered(&ctx, order_id).await?;
    Ok(success_response(order))
}

async fn delete_order(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.orders.delete_order(&ctx, order_id).await?;
    Ok(no_content_response())
}

async fn list_my_orders(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.services.orders.list_for_user(ctx.user_id).await?;
    Ok(success_response(orders))
}

async fn list_seller_orders(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.services.orders.list_for_seller(&ctx).await?;
    Ok(success_response(orders))
}

async fn list_all_orders(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .orders
        .list_all(&ctx, pagination.page, pagination.per_page)
        .await?;
    Ok(success_response(page))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cod_order))
        .route("/", get(list_all_orders))
        .route("/mine", get(list_my_orders))
        .route("/seller", get(list_seller_orders))
        .route("/:id", get(get_order))
        .route("/:id", delete(delete_order))
        .route("/:id/deliver", put(mark_delivered))
}
