use skylane_api::{app, state::{AppState, AuthConfig}};
use skylane_agent::AgentDispatcher;
use skylane_booking::{paypal::PayPalClient, BookingService, RedirectUrls};
use skylane_store::PgStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skylane_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = skylane_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Skylane API on port {}", config.server.port);

    let store = PgStore::connect(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    store.migrate().await.expect("Failed to run migrations");
    let store = Arc::new(store);

    let paypal = PayPalClient::new(
        &config.paypal.mode,
        config.paypal.client_id.clone(),
        config.paypal.client_secret.clone(),
        config.paypal.webhook_id.clone(),
        Duration::from_secs(config.paypal.request_timeout_seconds),
    )
    .expect("Failed to build PayPal client");

    let urls = RedirectUrls {
        return_url: format!("{}/payment/success/", config.frontend.url),
        cancel_url: format!("{}/payment/cancel/", config.frontend.url),
    };

    let service = Arc::new(BookingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(paypal),
        urls,
    ));

    let app_state = AppState {
        service: service.clone(),
        agent: Arc::new(AgentDispatcher::new(service)),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
