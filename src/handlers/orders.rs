use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::domain::{OrderStatus, Transaction};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::{InitiateOrder, OrderView};
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct InitiateOrderRequest {
    pub watch_id: Uuid,
    pub purchase_price: String,
    pub shipping_price: String,
    pub buyer_note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

/// Wire form of a transaction. Monetary fields are decimal strings;
/// `provider_synced` is present on read paths that attempted a live
/// provider refresh.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub provider_tx_id: String,
    pub watch_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    pub product_code: String,
    pub currency: String,
    pub purchase_price: String,
    pub shipping_price: String,
    pub buyer_fee: String,
    pub total_price: String,
    pub status: OrderStatus,
    pub buyer_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_synced: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    fn from_transaction(tx: Transaction, provider_synced: Option<bool>) -> Self {
        Self {
            id: tx.id,
            provider_tx_id: tx.provider_tx_id,
            watch_id: tx.watch_id,
            buyer_id: tx.buyer_id,
            seller_id: tx.seller_id,
            product_name: tx.product_name,
            product_code: tx.product_code,
            currency: tx.currency,
            purchase_price: tx.purchase_price.to_string(),
            shipping_price: tx.shipping_price.to_string(),
            buyer_fee: tx.buyer_fee.to_string(),
            total_price: tx.total_price.to_string(),
            status: tx.status,
            buyer_note: tx.buyer_note,
            provider_synced,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(view: OrderView) -> Self {
        OrderResponse::from_transaction(view.transaction, Some(view.provider_synced))
    }
}

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub repaired: bool,
    #[serde(flatten)]
    pub transaction: OrderResponse,
}

pub async fn initiate(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(payload): Json<InitiateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let purchase_price =
        validation::parse_positive_money("purchase_price", &payload.purchase_price)
            .map_err(|e| AppError::Validation(e.to_string()))?;
    let shipping_price =
        validation::parse_non_negative_money("shipping_price", &payload.shipping_price)
            .map_err(|e| AppError::Validation(e.to_string()))?;
    if let Some(note) = &payload.buyer_note {
        validation::validate_max_len("buyer_note", note, validation::NOTE_MAX_LEN)
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    let tx = state
        .orders
        .initiate(
            caller,
            InitiateOrder {
                watch_id: payload.watch_id,
                purchase_price,
                shipping_price,
                buyer_note: payload.buyer_note,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from_transaction(tx, None)),
    ))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let views = state.orders.list_orders(caller).await?;
    let orders: Vec<OrderResponse> = views.into_iter().map(OrderResponse::from).collect();

    Ok(Json(orders))
}

pub async fn refresh(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(tx_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.orders.refresh_status(caller, tx_id).await?;

    Ok(Json(OrderResponse::from(view)))
}

pub async fn submit_action(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(tx_id): Path<Uuid>,
    Json(payload): Json<ActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state
        .orders
        .submit_action(caller, tx_id, &payload.action)
        .await?;

    Ok(Json(OrderResponse::from_transaction(tx, None)))
}

pub async fn repair_totals(
    State(state): State<AppState>,
    Path(tx_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.orders.repair_totals(tx_id).await?;

    Ok(Json(RepairResponse {
        repaired: outcome.repaired,
        transaction: OrderResponse::from_transaction(outcome.transaction, None),
    }))
}
