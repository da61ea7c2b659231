pub mod adapters;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod junopay;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::junopay::JunoPayClient;
use crate::services::{NegotiationService, OrderService};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub negotiation: Arc<NegotiationService>,
    pub orders: Arc<OrderService>,
    pub junopay: Arc<JunoPayClient>,
    pub admin_api_key: String,
}

pub fn create_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/orders/:id/repair-totals",
            post(handlers::orders::repair_totals),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.admin_api_key.clone(),
            middleware::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/watches/:id/bids",
            post(handlers::bids::place_bid).get(handlers::bids::list_for_watch),
        )
        .route("/bids/:id", get(handlers::bids::get_bid))
        .route("/bids/:id/status", patch(handlers::bids::transition))
        .route("/bids/:id/comments", post(handlers::bids::add_comment))
        .route(
            "/orders",
            post(handlers::orders::initiate).get(handlers::orders::list_orders),
        )
        .route("/orders/:id/refresh", post(handlers::orders::refresh))
        .route("/orders/:id/action", post(handlers::orders::submit_action))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
