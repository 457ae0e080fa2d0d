pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    CartService, CheckoutService, OrderService, PaymentProvider, PaymentReconciliationService,
    ProductService,
};

/// The service layer, constructed once and shared across requests
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub payments: PaymentReconciliationService,
    pub orders: OrderService,
}

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: DbPool,
        config: AppConfig,
        provider: Arc<dyn PaymentProvider>,
        event_sender: Option<EventSender>,
    ) -> Self {
        let db = Arc::new(db);
        let config = Arc::new(config);

        let products = ProductService::new(
            db.clone(),
            config.default_currency.clone(),
            event_sender.clone(),
        );
        let carts = CartService::new(db.clone(), event_sender.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            carts.clone(),
            provider.clone(),
            config.pricing.clone(),
            config.payment_provider.clone(),
            config.default_currency.clone(),
            event_sender.clone(),
        );
        let payments =
            PaymentReconciliationService::new(db.clone(), provider, event_sender.clone());
        let orders = OrderService::new(
            db.clone(),
            carts.clone(),
            config.pricing.clone(),
            config.default_currency.clone(),
            event_sender,
        );

        Self {
            db,
            config,
            services: AppServices {
                products,
                carts,
                checkout,
                payments,
                orders,
            },
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    database: &'static str,
    environment: String,
}

/// Readiness: reports database connectivity alongside liveness
async fn status_check(axum::extract::State(state): axum::extract::State<AppState>) -> Json<StatusResponse> {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => "connected",
        Err(_) => "unavailable",
    };
    Json(StatusResponse {
        status: if database == "connected" { "ok" } else { "degraded" },
        database,
        environment: state.config.environment.clone(),
    })
}

/// Builds the versioned API router with all endpoint groups
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", handlers::products::routes())
        .nest("/cart", handlers::carts::routes())
        .nest("/checkout", handlers::checkout::routes())
        .nest("/payments", handlers::payments::routes())
        .nest("/orders", handlers::orders::routes())
}

/// Assembles the full application router over the given state
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_check))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}
