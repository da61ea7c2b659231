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
use crate::domain::{Bid, BidComment, BidStatus, NegotiationEntry};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub amount: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: BidStatus,
    pub amount: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

/// Wire form of a bid. Monetary fields are decimal strings.
#[derive(Debug, Serialize)]
pub struct BidResponse {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub bidder_id: Uuid,
    pub amount: String,
    pub status: BidStatus,
    pub agreed_price: Option<String>,
    pub history: Vec<NegotiationEntry>,
    pub comments: Vec<BidComment>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Bid> for BidResponse {
    fn from(bid: Bid) -> Self {
        Self {
            id: bid.id,
            watch_id: bid.watch_id,
            bidder_id: bid.bidder_id,
            amount: bid.amount.to_string(),
            status: bid.status,
            agreed_price: bid.agreed_price.map(|p| p.to_string()),
            history: bid.history,
            comments: bid.comments,
            version: bid.version,
            created_at: bid.created_at,
            updated_at: bid.updated_at,
        }
    }
}

pub async fn place_bid(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(watch_id): Path<Uuid>,
    Json(payload): Json<PlaceBidRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount = validation::parse_positive_money("amount", &payload.amount)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if let Some(message) = &payload.message {
        validation::validate_max_len("message", message, validation::MESSAGE_MAX_LEN)
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    let bid = state
        .negotiation
        .place_bid(caller, watch_id, amount, payload.message)
        .await?;

    Ok((StatusCode::CREATED, Json(BidResponse::from(bid))))
}

pub async fn transition(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount = payload
        .amount
        .as_deref()
        .map(|raw| validation::parse_positive_money("amount", raw))
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if let Some(message) = &payload.message {
        validation::validate_max_len("message", message, validation::MESSAGE_MAX_LEN)
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    let bid = state
        .negotiation
        .transition(caller, bid_id, payload.status, amount, payload.message)
        .await?;

    Ok(Json(BidResponse::from(bid)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(bid_id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bid = state
        .negotiation
        .add_comment(caller, bid_id, payload.body)
        .await?;

    Ok((StatusCode::CREATED, Json(BidResponse::from(bid))))
}

pub async fn get_bid(
    State(state): State<AppState>,
    Path(bid_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let bid = state.negotiation.get_bid(bid_id).await?;

    Ok(Json(BidResponse::from(bid)))
}

pub async fn list_for_watch(
    State(state): State<AppState>,
    Path(watch_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let bids = state.negotiation.bids_for_watch(watch_id).await?;
    let bids: Vec<BidResponse> = bids.into_iter().map(BidResponse::from).collect();

    Ok(Json(bids))
}
