use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::services::products::{CreateProductInput, UpdateProductInput};
use crate::AppState;

async fn create_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state.services.products.create_product(&ctx, payload).await?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .update_product(&ctx, product_id, payload)
        .await?;
    Ok(success_response(product))
}

async fn deactivate_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .deactivate_product(&ctx, product_id)
        .await?;
    Ok(success_response(product))
}

async fn get_product(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.products.get_product(product_id).await?;
    Ok(success_response(product))
}

async fn list_my_products(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    let products = state.services.products.list_for_seller(&ctx).await?;
    Ok(success_response(products))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/mine", get(list_my_products))
        .route("/:id", get(get_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(deactivate_product))
}
