//! Postgres implementation of BidRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Bid, BidStatus};
use crate::ports::{BidRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresBidRepository {
    pool: PgPool,
}

impl PostgresBidRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BID_COLUMNS: &str = "id, watch_id, bidder_id, seller_email, amount, status, \
     agreed_price, history, comments, version, created_at, updated_at";

#[async_trait]
impl BidRepository for PostgresBidRepository {
    async fn insert(&self, bid: &Bid) -> RepositoryResult<Bid> {
        let row = sqlx::query_as::<_, BidRow>(&format!(
            r#"
            INSERT INTO bids (
                id, watch_id, bidder_id, seller_email, amount, status,
                agreed_price, history, comments, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            BID_COLUMNS
        ))
        .bind(bid.id)
        .bind(bid.watch_id)
        .bind(bid.bidder_id)
        .bind(&bid.seller_email)
        .bind(&bid.amount)
        .bind(bid.status.as_str())
        .bind(&bid.agreed_price)
        .bind(serde_json::to_value(&bid.history).map_err(json_error)?)
        .bind(serde_json::to_value(&bid.comments).map_err(json_error)?)
        .bind(bid.version)
        .bind(bid.created_at)
        .bind(bid.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Bid> {
        let row = sqlx::query_as::<_, BidRow>(&format!(
            "SELECT {} FROM bids WHERE id = $1",
            BID_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn list_for_watch(&self, watch_id: Uuid) -> RepositoryResult<Vec<Bid>> {
        let rows = sqlx::query_as::<_, BidRow>(&format!(
            "SELECT {} FROM bids WHERE watch_id = $1 ORDER BY created_at DESC",
            BID_COLUMNS
        ))
        .bind(watch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(BidRow::into_domain).collect()
    }

    async fn update(&self, bid: &Bid, expected_version: i64) -> RepositoryResult<Bid> {
        // Conditional write: the row must still carry the version this
        // transition was computed against, otherwise a concurrent
        // transition won the race and this one must not apply.
        let row = sqlx::query_as::<_, BidRow>(&format!(
            r#"
            UPDATE bids SET
                amount = $2, status = $3, agreed_price = $4,
                history = $5, comments = $6,
                version = version + 1, updated_at = $7
            WHERE id = $1 AND version = $8
            RETURNING {}
            "#,
            BID_COLUMNS
        ))
        .bind(bid.id)
        .bind(&bid.amount)
        .bind(bid.status.as_str())
        .bind(&bid.agreed_price)
        .bind(serde_json::to_value(&bid.history).map_err(json_error)?)
        .bind(serde_json::to_value(&bid.comments).map_err(json_error)?)
        .bind(bid.updated_at)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let exists: Option<(i64,)> =
                    sqlx::query_as("SELECT version FROM bids WHERE id = $1")
                        .bind(bid.id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(RepositoryError::from)?;
                match exists {
                    Some(_) => Err(RepositoryError::Conflict(format!(
                        "bid {} was modified concurrently",
                        bid.id
                    ))),
                    None => Err(RepositoryError::NotFound(bid.id.to_string())),
                }
            }
        }
    }

    async fn count_open_for_watch(&self, watch_id: Uuid) -> RepositoryResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bids WHERE watch_id = $1 \
             AND status NOT IN ('accepted', 'rejected', 'cancelled')",
        )
        .bind(watch_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(count)
    }
}

fn json_error(err: serde_json::Error) -> RepositoryError {
    RepositoryError::Storage(err.to_string())
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct BidRow {
    id: Uuid,
    watch_id: Uuid,
    bidder_id: Uuid,
    seller_email: String,
    amount: bigdecimal::BigDecimal,
    status: String,
    agreed_price: Option<bigdecimal::BigDecimal>,
    history: serde_json::Value,
    comments: serde_json::Value,
    version: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl BidRow {
    fn into_domain(self) -> RepositoryResult<Bid> {
        let status = self
            .status
            .parse::<BidStatus>()
            .map_err(RepositoryError::Storage)?;
        let history =
            serde_json::from_value(self.history).map_err(json_error)?;
        let comments =
            serde_json::from_value(self.comments).map_err(json_error)?;

        Ok(Bid {
            id: self.id,
            watch_id: self.watch_id,
            bidder_id: self.bidder_id,
            seller_email: self.seller_email,
            amount: self.amount,
            status,
            agreed_price: self.agreed_price,
            history,
            comments,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
