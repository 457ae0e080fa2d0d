use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use storefront_api::config::{init_tracing, load_config};
use storefront_api::db::{establish_connection_from_app_config, run_migrations};
use storefront_api::events::spawn_event_logger;
use storefront_api::services::HostedCheckoutClient;
use storefront_api::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_json);
    info!(environment = %config.environment, "starting storefront API");

    let db = establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    if config.auto_migrate {
        run_migrations(&db).await.context("migrations failed")?;
    }

    let provider = Arc::new(
        HostedCheckoutClient::new(&config.payment_provider)
            .context("failed to build payment provider client")?,
    );

    let (event_sender, _event_task) = spawn_event_logger(config.event_channel_capacity);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(db, config, provider, Some(event_sender));

    let app = app_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("server terminated")?;
    Ok(())
}
