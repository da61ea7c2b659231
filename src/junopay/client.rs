//! HTTP client for the JunoPay payment network.
//!
//! Owns the OAuth-style token lifecycle: every authenticated call is tried
//! with the caller's current access token, refreshed at most once on a 401,
//! and retried exactly once. Tokens live in the [`CredentialStore`]; this
//! client never caches them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config, Error as FailsafeError, StateMachine, backoff, failure_policy};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ports::{CredentialStore, RepositoryError, TokenPair};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The stored credentials are gone or unusable and refresh is
    /// exhausted; the user must go through the JunoPay login flow again.
    #[error("JunoPay re-authentication required")]
    ReauthRequired,

    /// JunoPay processed the request and said no.
    #[error("JunoPay rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Transport failure, timeout, provider 5xx, or an open circuit.
    #[error("JunoPay unavailable: {0}")]
    Unavailable(String),

    #[error("credential store error: {0}")]
    Store(#[from] RepositoryError),
}

/// JunoPay's view of a transaction, as returned by every transaction
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTransaction {
    pub transaction_id: String,
    pub status: String,
}

/// Payload for opening a buy transaction. Monetary fields stay in their
/// decimal-string wire form.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransactionRequest {
    pub seller_client_id: String,
    pub product_name: String,
    pub product_code: String,
    pub currency: String,
    pub purchase_price: String,
    pub shipping_price: String,
    pub buyer_fee: String,
    pub total_price: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

pub struct JunoPayClient {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    credentials: Arc<dyn CredentialStore>,
    /// One refresh in flight per user; the map grows with distinct users
    /// seen by this process.
    refresh_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    /// Guards the status-query path only. Initiation and explicit actions
    /// must reach the provider or fail loudly.
    info_breaker: Breaker,
}

impl JunoPayClient {
    pub fn new(
        base_url: String,
        client_id: String,
        client_secret: String,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self::with_circuit_breaker(base_url, client_id, client_secret, timeout, credentials, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        client_id: String,
        client_secret: String,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let info_breaker = Config::new().failure_policy(policy).build();

        JunoPayClient {
            client,
            base_url,
            client_id,
            client_secret,
            credentials,
            refresh_locks: Mutex::new(HashMap::new()),
            info_breaker,
        }
    }

    /// Current state of the status-query circuit breaker.
    pub fn circuit_state(&self) -> &'static str {
        if self.info_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Opens a buy transaction on behalf of `user_id`. Never auto-retried
    /// beyond the single refresh-and-retry cycle: a blind second attempt
    /// could create a duplicate provider-side transaction.
    pub async fn create_transaction(
        &self,
        user_id: Uuid,
        request: &CreateTransactionRequest,
    ) -> Result<ProviderTransaction, GatewayError> {
        let url = self.url("/v1/transactions");
        let response = self
            .send_authorized(user_id, |client, token| {
                client.post(&url).bearer_auth(token).json(request)
            })
            .await?;

        response
            .json::<ProviderTransaction>()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("invalid response from JunoPay: {}", e)))
    }

    /// Fetches the provider's current view of a transaction. Runs behind
    /// the circuit breaker: when JunoPay is struggling we fail fast and let
    /// callers fall back to the stored status.
    pub async fn transaction_info(
        &self,
        user_id: Uuid,
        provider_tx_id: &str,
    ) -> Result<ProviderTransaction, GatewayError> {
        let url = self.url(&format!("/v1/transactions/{}", provider_tx_id));

        let result = self
            .info_breaker
            .call(async {
                let response = self
                    .send_authorized(user_id, |client, token| client.get(&url).bearer_auth(token))
                    .await?;

                response.json::<ProviderTransaction>().await.map_err(|e| {
                    GatewayError::Unavailable(format!("invalid response from JunoPay: {}", e))
                })
            })
            .await;

        match result {
            Ok(tx) => Ok(tx),
            Err(FailsafeError::Rejected) => Err(GatewayError::Unavailable(
                "JunoPay status circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// Forwards an explicit confirm/query action. The action value is
    /// validated by the caller before any network traffic happens.
    pub async fn submit_action(
        &self,
        user_id: Uuid,
        provider_tx_id: &str,
        action: &str,
    ) -> Result<ProviderTransaction, GatewayError> {
        let url = self.url(&format!("/v1/transactions/{}/actions", provider_tx_id));
        let body = serde_json::json!({ "action": action });
        let response = self
            .send_authorized(user_id, |client, token| {
                client.post(&url).bearer_auth(token).json(&body)
            })
            .await?;

        response
            .json::<ProviderTransaction>()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("invalid response from JunoPay: {}", e)))
    }

    /// One attempt with the stored access token; on 401, one single-flight
    /// refresh and one retry. Nothing beyond that.
    async fn send_authorized<F>(
        &self,
        user_id: Uuid,
        build: F,
    ) -> Result<reqwest::Response, GatewayError>
    where
        F: Fn(&Client, &str) -> reqwest::RequestBuilder,
    {
        let pair = self
            .credentials
            .get(user_id)
            .await?
            .ok_or(GatewayError::ReauthRequired)?;

        let response = build(&self.client, &pair.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_response(response).await;
        }

        let fresh = self.refresh_credentials(user_id, &pair).await?;
        let response = build(&self.client, &fresh.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        check_response(response).await
    }

    /// Exchanges the refresh token for a new pair, serialized per user.
    ///
    /// After taking the user's refresh lock the store is re-read: if the
    /// access token no longer matches the one that just got a 401, another
    /// request already rotated the pair and we must not clobber it with a
    /// second refresh (the provider has invalidated our refresh token by
    /// then).
    async fn refresh_credentials(
        &self,
        user_id: Uuid,
        stale: &TokenPair,
    ) -> Result<TokenPair, GatewayError> {
        let lock = {
            let mut locks = self.refresh_locks.lock().await;
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        let current = self
            .credentials
            .get(user_id)
            .await?
            .ok_or(GatewayError::ReauthRequired)?;
        if current.access_token != stale.access_token {
            return Ok(current);
        }

        let response = self
            .client
            .post(self.url("/oauth/token"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            // Invalid grant: the pair is dead. Drop both tokens in one
            // write so the user is routed to re-login instead of hitting
            // the same wall on every request.
            tracing::warn!(%user_id, "JunoPay refresh token rejected, clearing credentials");
            self.credentials.clear(user_id).await?;
            return Err(GatewayError::ReauthRequired);
        }
        if !status.is_success() {
            return Err(GatewayError::Unavailable(format!(
                "token refresh failed with status {}",
                status
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("invalid token response: {}", e)))?;
        let pair = TokenPair {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        };
        self.credentials.put(user_id, &pair).await?;
        tracing::debug!(%user_id, "JunoPay access token refreshed");

        Ok(pair)
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Unavailable("JunoPay request timed out".to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(GatewayError::Unavailable(format!(
            "JunoPay returned {}: {}",
            status, body
        )))
    } else {
        // Includes a 401 on the retried call: the refresh succeeded, so a
        // rejection of the fresh token is the provider's verdict, not a
        // credential problem we can fix here.
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Credential store fake used by client tests.
    struct MemoryCredentials {
        pairs: StdMutex<HashMap<Uuid, TokenPair>>,
    }

    impl MemoryCredentials {
        fn with(user_id: Uuid, access: &str, refresh: &str) -> Arc<Self> {
            let mut pairs = HashMap::new();
            pairs.insert(
                user_id,
                TokenPair {
                    access_token: access.to_string(),
                    refresh_token: refresh.to_string(),
                },
            );
            Arc::new(Self {
                pairs: StdMutex::new(pairs),
            })
        }

        fn current(&self, user_id: Uuid) -> Option<TokenPair> {
            self.pairs.lock().unwrap().get(&user_id).cloned()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentials {
        async fn get(&self, user_id: Uuid) -> Result<Option<TokenPair>, RepositoryError> {
            Ok(self.pairs.lock().unwrap().get(&user_id).cloned())
        }

        async fn put(&self, user_id: Uuid, pair: &TokenPair) -> Result<(), RepositoryError> {
            self.pairs.lock().unwrap().insert(user_id, pair.clone());
            Ok(())
        }

        async fn clear(&self, user_id: Uuid) -> Result<(), RepositoryError> {
            self.pairs.lock().unwrap().remove(&user_id);
            Ok(())
        }
    }

    fn client_for(server: &mockito::Server, store: Arc<dyn CredentialStore>) -> JunoPayClient {
        JunoPayClient::new(
            server.url(),
            "marketplace".to_string(),
            "s3cret".to_string(),
            Duration::from_secs(5),
            store,
        )
    }

    #[tokio::test]
    async fn test_call_succeeds_with_valid_token() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let store = MemoryCredentials::with(user_id, "good-token", "refresh-1");

        let _mock = server
            .mock("GET", "/v1/transactions/JP-1")
            .match_header("authorization", "Bearer good-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"transaction_id":"JP-1","status":"pending"}"#)
            .create_async()
            .await;

        let client = client_for(&server, store);
        let tx = client.transaction_info(user_id, "JP-1").await.unwrap();
        assert_eq!(tx.transaction_id, "JP-1");
        assert_eq!(tx.status, "pending");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_call_retried_once() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let store = MemoryCredentials::with(user_id, "stale-token", "refresh-1");

        let _stale = server
            .mock("GET", "/v1/transactions/JP-2")
            .match_header("authorization", "Bearer stale-token")
            .with_status(401)
            .create_async()
            .await;
        let _token = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"fresh-token","refresh_token":"refresh-2"}"#)
            .create_async()
            .await;
        let _fresh = server
            .mock("GET", "/v1/transactions/JP-2")
            .match_header("authorization", "Bearer fresh-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"transaction_id":"JP-2","status":"confirmed"}"#)
            .create_async()
            .await;

        let client = client_for(&server, store.clone());
        // The caller sees one logical success, no intermediate error.
        let tx = client.transaction_info(user_id, "JP-2").await.unwrap();
        assert_eq!(tx.status, "confirmed");

        // The rotated pair was persisted through the store.
        let pair = store.current(user_id).unwrap();
        assert_eq!(pair.access_token, "fresh-token");
        assert_eq!(pair.refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn test_invalid_grant_clears_both_tokens_and_requires_reauth() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let store = MemoryCredentials::with(user_id, "stale-token", "dead-refresh");

        let _stale = server
            .mock("GET", "/v1/transactions/JP-3")
            .match_header("authorization", "Bearer stale-token")
            .with_status(401)
            .create_async()
            .await;
        let _token = server
            .mock("POST", "/oauth/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let client = client_for(&server, store.clone());
        let result = client.transaction_info(user_id, "JP-3").await;
        assert!(matches!(result, Err(GatewayError::ReauthRequired)));
        assert!(store.current(user_id).is_none());
    }

    #[tokio::test]
    async fn test_transient_refresh_failure_keeps_tokens() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let store = MemoryCredentials::with(user_id, "stale-token", "refresh-1");

        let _stale = server
            .mock("GET", "/v1/transactions/JP-4")
            .match_header("authorization", "Bearer stale-token")
            .with_status(401)
            .create_async()
            .await;
        let _token = server
            .mock("POST", "/oauth/token")
            .with_status(503)
            .create_async()
            .await;

        let client = client_for(&server, store.clone());
        let result = client.transaction_info(user_id, "JP-4").await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        // A flaky token endpoint must not log the user out.
        assert!(store.current(user_id).is_some());
    }

    #[tokio::test]
    async fn test_missing_credentials_require_reauth_without_network() {
        let server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let store = Arc::new(MemoryCredentials {
            pairs: StdMutex::new(HashMap::new()),
        });

        let client = client_for(&server, store);
        let result = client.transaction_info(user_id, "JP-5").await;
        assert!(matches!(result, Err(GatewayError::ReauthRequired)));
    }

    #[tokio::test]
    async fn test_concurrent_401s_refresh_only_once() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let store = MemoryCredentials::with(user_id, "stale-token", "refresh-1");

        let _stale = server
            .mock("GET", "/v1/transactions/JP-6")
            .match_header("authorization", "Bearer stale-token")
            .with_status(401)
            .expect_at_most(2)
            .create_async()
            .await;
        // The token endpoint tolerates exactly one hit; a second refresh
        // would fail the test through the assert below.
        let _token = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"fresh-token","refresh_token":"refresh-2"}"#)
            .expect(1)
            .create_async()
            .await;
        let _fresh = server
            .mock("GET", "/v1/transactions/JP-6")
            .match_header("authorization", "Bearer fresh-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"transaction_id":"JP-6","status":"pending"}"#)
            .expect_at_most(2)
            .create_async()
            .await;

        let client = Arc::new(client_for(&server, store));
        let a = {
            let client = client.clone();
            tokio::spawn(async move { client.transaction_info(user_id, "JP-6").await })
        };
        let b = {
            let client = client.clone();
            tokio::spawn(async move { client.transaction_info(user_id, "JP-6").await })
        };

        assert!(a.await.unwrap().is_ok());
        assert!(b.await.unwrap().is_ok());
        _token.assert_async().await;
    }

    #[tokio::test]
    async fn test_provider_rejection_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let store = MemoryCredentials::with(user_id, "good-token", "refresh-1");

        let _mock = server
            .mock("POST", "/v1/transactions")
            .with_status(422)
            .with_body("insufficient funds")
            .create_async()
            .await;

        let client = client_for(&server, store);
        let request = CreateTransactionRequest {
            seller_client_id: "seller-client".to_string(),
            product_name: "Speedmaster".to_string(),
            product_code: "310.30.42".to_string(),
            currency: "USD".to_string(),
            purchase_price: "5200.00".to_string(),
            shipping_price: "40.00".to_string(),
            buyer_fee: "78.00".to_string(),
            total_price: "5318.00".to_string(),
            note: None,
        };
        let result = client.create_transaction(user_id, &request).await;
        match result {
            Err(GatewayError::Rejected { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "insufficient funds");
            }
            other => panic!("expected Rejected, got {:?}", other.map(|t| t.status)),
        }
    }

    #[test]
    fn test_circuit_breaker_starts_closed() {
        let store = Arc::new(MemoryCredentials {
            pairs: StdMutex::new(HashMap::new()),
        });
        let client = JunoPayClient::new(
            "https://api.junopay.example".to_string(),
            "marketplace".to_string(),
            "s3cret".to_string(),
            Duration::from_secs(5),
            store,
        );
        assert_eq!(client.circuit_state(), "closed");
    }
}
