//! Postgres adapter for the collaborator ports.
//!
//! The watch catalog, user accounts, JunoPay credentials and the
//! notification feed are owned by the rest of the marketplace; this adapter
//! gives the core its narrow view of those tables.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ports::{
    CredentialStore, NotificationKind, NotificationSink, RepositoryError, RepositoryResult,
    TokenPair, UserDirectory, UserProfile, WatchSnapshot, WatchStore,
};

#[derive(Clone)]
pub struct PostgresMarketplace {
    pool: PgPool,
}

impl PostgresMarketplace {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatchStore for PostgresMarketplace {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<WatchSnapshot>> {
        let row = sqlx::query_as::<_, WatchRow>(
            r#"
            SELECT w.id, w.owner_id, u.email AS owner_email,
                   w.name, w.reference_code, w.list_price
            FROM watches w
            JOIN users u ON u.id = w.owner_id
            WHERE w.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(WatchRow::into_snapshot))
    }
}

#[async_trait]
impl UserDirectory for PostgresMarketplace {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, junopay_client_id, fee_rate_percent \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(UserRow::into_profile))
    }
}

#[async_trait]
impl CredentialStore for PostgresMarketplace {
    async fn get(&self, user_id: Uuid) -> RepositoryResult<Option<TokenPair>> {
        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT junopay_access_token, junopay_refresh_token \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(match row {
            Some((Some(access_token), Some(refresh_token))) => Some(TokenPair {
                access_token,
                refresh_token,
            }),
            // A half-present pair counts as absent.
            _ => None,
        })
    }

    async fn put(&self, user_id: Uuid, pair: &TokenPair) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET junopay_access_token = $2, junopay_refresh_token = $3 \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(&pair.access_token)
        .bind(&pair.refresh_token)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> RepositoryResult<()> {
        // Single statement: both tokens go away together.
        let result = sqlx::query(
            "UPDATE users SET junopay_access_token = NULL, junopay_refresh_token = NULL \
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(user_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for PostgresMarketplace {
    async fn notify(
        &self,
        recipient: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        related_entity: Uuid,
    ) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, recipient_id, kind, title, message, related_entity,
                read, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipient)
        .bind(kind.as_str())
        .bind(title)
        .bind(message)
        .bind(related_entity)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WatchRow {
    id: Uuid,
    owner_id: Uuid,
    owner_email: String,
    name: String,
    reference_code: String,
    list_price: Option<bigdecimal::BigDecimal>,
}

impl WatchRow {
    fn into_snapshot(self) -> WatchSnapshot {
        WatchSnapshot {
            id: self.id,
            owner_id: self.owner_id,
            owner_email: self.owner_email,
            name: self.name,
            reference_code: self.reference_code,
            list_price: self.list_price,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    junopay_client_id: Option<String>,
    fee_rate_percent: bigdecimal::BigDecimal,
}

impl UserRow {
    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email,
            junopay_client_id: self.junopay_client_id,
            fee_rate_percent: self.fee_rate_percent,
        }
    }
}
