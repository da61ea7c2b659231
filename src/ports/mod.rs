//! Ports consumed by the negotiation and settlement core.
//!
//! The listing catalog, user accounts, credential storage and notification
//! delivery are owned by other parts of the marketplace; the core only sees
//! these traits. Postgres implementations live in `crate::adapters`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Bid, OrderStatus, Transaction};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            other => RepositoryError::Storage(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait BidRepository: Send + Sync {
    async fn insert(&self, bid: &Bid) -> RepositoryResult<Bid>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Bid>;

    async fn list_for_watch(&self, watch_id: Uuid) -> RepositoryResult<Vec<Bid>>;

    /// Persists the bid only if the stored row still carries
    /// `expected_version`; the stored version is bumped by one on success.
    /// A lost race returns `RepositoryError::Conflict`.
    async fn update(&self, bid: &Bid, expected_version: i64) -> RepositoryResult<Bid>;

    /// Bids in any non-terminal state for the watch. The listing module
    /// refuses to delete a watch while this is non-zero.
    async fn count_open_for_watch(&self, watch_id: Uuid) -> RepositoryResult<i64>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn list_for_buyer(&self, buyer_id: Uuid) -> RepositoryResult<Vec<Transaction>>;

    async fn set_status(&self, id: Uuid, status: &OrderStatus) -> RepositoryResult<Transaction>;

    /// Used only by the explicit totals-repair operation.
    async fn set_total(&self, id: Uuid, total: &BigDecimal) -> RepositoryResult<Transaction>;
}

/// Read-only snapshot of a listing, as much as the core needs.
#[derive(Debug, Clone)]
pub struct WatchSnapshot {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_email: String,
    pub name: String,
    pub reference_code: String,
    /// Fixed asking price, if the seller set one.
    pub list_price: Option<BigDecimal>,
}

#[async_trait]
pub trait WatchStore: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<WatchSnapshot>>;
}

/// Identity and billing attributes of a marketplace user.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    /// The user's client identifier on the JunoPay network, if linked.
    pub junopay_client_id: Option<String>,
    /// Buyer fee percentage in effect for this user right now.
    pub fee_rate_percent: BigDecimal,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<UserProfile>>;
}

/// OAuth-style token pair for the payment network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Per-user JunoPay credentials. The gateway client reads and writes
/// exclusively through this trait and never caches tokens itself.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> RepositoryResult<Option<TokenPair>>;

    async fn put(&self, user_id: Uuid, pair: &TokenPair) -> RepositoryResult<()>;

    /// Drops both tokens in one write; a half-cleared pair must never be
    /// observable.
    async fn clear(&self, user_id: Uuid) -> RepositoryResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BidPlaced,
    BidCounter,
    BidAccepted,
    BidRejected,
    OrderInitiated,
    OrderStatusChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BidPlaced => "bid_placed",
            NotificationKind::BidCounter => "bid_counter",
            NotificationKind::BidAccepted => "bid_accepted",
            NotificationKind::BidRejected => "bid_rejected",
            NotificationKind::OrderInitiated => "order_initiated",
            NotificationKind::OrderStatusChanged => "order_status_changed",
        }
    }
}

/// Fire-and-forget delivery of user-facing events. Failures are the sink's
/// problem; callers log and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        recipient: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        related_entity: Uuid,
    ) -> RepositoryResult<()>;
}
