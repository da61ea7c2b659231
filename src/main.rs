use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchbid_core::adapters::{
    PostgresBidRepository, PostgresMarketplace, PostgresTransactionRepository,
};
use watchbid_core::junopay::JunoPayClient;
use watchbid_core::services::{NegotiationService, OrderService};
use watchbid_core::{AppState, config, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    // Collaborator ports and repositories
    let marketplace = Arc::new(PostgresMarketplace::new(pool.clone()));
    let bids = Arc::new(PostgresBidRepository::new(pool.clone()));
    let transactions = Arc::new(PostgresTransactionRepository::new(pool.clone()));

    // JunoPay gateway client
    let junopay = Arc::new(JunoPayClient::new(
        config.junopay_base_url.clone(),
        config.junopay_client_id.clone(),
        config.junopay_client_secret.clone(),
        Duration::from_secs(config.junopay_timeout_secs),
        marketplace.clone(),
    ));
    tracing::info!("JunoPay client initialized with URL: {}", config.junopay_base_url);

    let negotiation = Arc::new(NegotiationService::new(
        bids,
        marketplace.clone(),
        marketplace.clone(),
        marketplace.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        transactions,
        marketplace.clone(),
        marketplace.clone(),
        marketplace.clone(),
        junopay.clone(),
        config.provider_refresh_concurrency,
    ));

    let app_state = AppState {
        db: pool,
        negotiation,
        orders,
        junopay,
        admin_api_key: config.admin_api_key.clone(),
    };
    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
