//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{OrderStatus, Transaction};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TX_COLUMNS: &str = "id, provider_tx_id, watch_id, buyer_id, seller_id, \
     buyer_client_id, seller_client_id, product_name, product_code, currency, \
     purchase_price, shipping_price, buyer_fee, total_price, status, buyer_note, \
     created_at, updated_at";

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, provider_tx_id, watch_id, buyer_id, seller_id,
                buyer_client_id, seller_client_id, product_name, product_code,
                currency, purchase_price, shipping_price, buyer_fee, total_price,
                status, buyer_note, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                      $14, $15, $16, $17, $18)
            RETURNING {}
            "#,
            TX_COLUMNS
        ))
        .bind(tx.id)
        .bind(&tx.provider_tx_id)
        .bind(tx.watch_id)
        .bind(tx.buyer_id)
        .bind(tx.seller_id)
        .bind(&tx.buyer_client_id)
        .bind(&tx.seller_client_id)
        .bind(&tx.product_name)
        .bind(&tx.product_code)
        .bind(&tx.currency)
        .bind(&tx.purchase_price)
        .bind(&tx.shipping_price)
        .bind(&tx.buyer_fee)
        .bind(&tx.total_price)
        .bind(tx.status.as_str())
        .bind(&tx.buyer_note)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.into_domain())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TX_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_for_buyer(&self, buyer_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE buyer_id = $1 ORDER BY created_at DESC",
            TX_COLUMNS
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(TransactionRow::into_domain).collect())
    }

    async fn set_status(&self, id: Uuid, status: &OrderStatus) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE transactions SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TX_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn set_total(&self, id: Uuid, total: &BigDecimal) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE transactions SET total_price = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TX_COLUMNS
        ))
        .bind(id)
        .bind(total)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    provider_tx_id: String,
    watch_id: Uuid,
    buyer_id: Uuid,
    seller_id: Uuid,
    buyer_client_id: String,
    seller_client_id: String,
    product_name: String,
    product_code: String,
    currency: String,
    purchase_price: BigDecimal,
    shipping_price: BigDecimal,
    buyer_fee: BigDecimal,
    total_price: BigDecimal,
    status: String,
    buyer_note: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> Transaction {
        Transaction {
            id: self.id,
            provider_tx_id: self.provider_tx_id,
            watch_id: self.watch_id,
            buyer_id: self.buyer_id,
            seller_id: self.seller_id,
            buyer_client_id: self.buyer_client_id,
            seller_client_id: self.seller_client_id,
            product_name: self.product_name,
            product_code: self.product_code,
            currency: self.currency,
            purchase_price: self.purchase_price,
            shipping_price: self.shipping_price,
            buyer_fee: self.buyer_fee,
            total_price: self.total_price,
            status: OrderStatus::from_provider(&self.status),
            buyer_note: self.buyer_note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
