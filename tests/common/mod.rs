//! Shared in-memory fakes for the collaborator ports, plus fixture helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use watchbid_core::domain::{Bid, OrderStatus, Transaction};
use watchbid_core::ports::{
    BidRepository, CredentialStore, NotificationKind, NotificationSink, RepositoryError,
    RepositoryResult, TokenPair, TransactionRepository, UserDirectory, UserProfile, WatchSnapshot,
    WatchStore,
};

#[derive(Default)]
pub struct MemoryBids {
    bids: Mutex<HashMap<Uuid, Bid>>,
}

impl MemoryBids {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stored(&self, id: Uuid) -> Option<Bid> {
        self.bids.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl BidRepository for MemoryBids {
    async fn insert(&self, bid: &Bid) -> RepositoryResult<Bid> {
        self.bids.lock().unwrap().insert(bid.id, bid.clone());
        Ok(bid.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Bid> {
        self.bids
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_for_watch(&self, watch_id: Uuid) -> RepositoryResult<Vec<Bid>> {
        Ok(self
            .bids
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.watch_id == watch_id)
            .cloned()
            .collect())
    }

    async fn update(&self, bid: &Bid, expected_version: i64) -> RepositoryResult<Bid> {
        let mut bids = self.bids.lock().unwrap();
        let stored = bids
            .get_mut(&bid.id)
            .ok_or_else(|| RepositoryError::NotFound(bid.id.to_string()))?;

        if stored.version != expected_version {
            return Err(RepositoryError::Conflict(format!(
                "bid {} was modified concurrently",
                bid.id
            )));
        }

        let mut updated = bid.clone();
        updated.version = expected_version + 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn count_open_for_watch(&self, watch_id: Uuid) -> RepositoryResult<i64> {
        Ok(self
            .bids
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.watch_id == watch_id && !b.status.is_terminal())
            .count() as i64)
    }
}

#[derive(Default)]
pub struct MemoryTransactions {
    transactions: Mutex<Vec<Transaction>>,
}

impl MemoryTransactions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stored(&self, id: Uuid) -> Option<Transaction> {
        self.transactions
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub fn seed(&self, tx: Transaction) {
        self.transactions.lock().unwrap().push(tx);
    }

    pub fn count(&self) -> usize {
        self.transactions.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionRepository for MemoryTransactions {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        self.transactions.lock().unwrap().push(tx.clone());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.stored(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_for_buyer(&self, buyer_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.buyer_id == buyer_id)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: &OrderStatus) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.lock().unwrap();
        let tx = transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        tx.status = status.clone();
        tx.updated_at = chrono::Utc::now();
        Ok(tx.clone())
    }

    async fn set_total(&self, id: Uuid, total: &BigDecimal) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.lock().unwrap();
        let tx = transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        tx.total_price = total.clone();
        tx.updated_at = chrono::Utc::now();
        Ok(tx.clone())
    }
}

#[derive(Default)]
pub struct MemoryWatches {
    watches: Mutex<HashMap<Uuid, WatchSnapshot>>,
}

impl MemoryWatches {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, watch: WatchSnapshot) {
        self.watches.lock().unwrap().insert(watch.id, watch);
    }

    pub fn remove(&self, id: Uuid) {
        self.watches.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl WatchStore for MemoryWatches {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<WatchSnapshot>> {
        Ok(self.watches.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, UserProfile>>,
}

impl MemoryUsers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, user: UserProfile) {
        self.users.lock().unwrap().insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUsers {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<UserProfile>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    pairs: Mutex<HashMap<Uuid, TokenPair>>,
}

impl MemoryCredentials {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, user_id: Uuid, access: &str, refresh: &str) {
        self.pairs.lock().unwrap().insert(
            user_id,
            TokenPair {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
            },
        );
    }

    pub fn current(&self, user_id: Uuid) -> Option<TokenPair> {
        self.pairs.lock().unwrap().get(&user_id).cloned()
    }

    pub fn wipe(&self, user_id: Uuid) {
        self.pairs.lock().unwrap().remove(&user_id);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn get(&self, user_id: Uuid) -> RepositoryResult<Option<TokenPair>> {
        Ok(self.pairs.lock().unwrap().get(&user_id).cloned())
    }

    async fn put(&self, user_id: Uuid, pair: &TokenPair) -> RepositoryResult<()> {
        self.pairs.lock().unwrap().insert(user_id, pair.clone());
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> RepositoryResult<()> {
        self.pairs.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

/// Records every delivered notification.
#[derive(Default)]
pub struct RecordingNotifications {
    pub delivered: Mutex<Vec<(Uuid, NotificationKind, String)>>,
}

impl RecordingNotifications {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recipients(&self) -> Vec<Uuid> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(recipient, _, _)| *recipient)
            .collect()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, kind, _)| *kind)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifications {
    async fn notify(
        &self,
        recipient: Uuid,
        kind: NotificationKind,
        title: &str,
        _message: &str,
        _related_entity: Uuid,
    ) -> RepositoryResult<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((recipient, kind, title.to_string()));
        Ok(())
    }
}

/// Always fails delivery; transitions must not care.
pub struct FailingNotifications;

#[async_trait]
impl NotificationSink for FailingNotifications {
    async fn notify(
        &self,
        _recipient: Uuid,
        _kind: NotificationKind,
        _title: &str,
        _message: &str,
        _related_entity: Uuid,
    ) -> RepositoryResult<()> {
        Err(RepositoryError::Storage("sink offline".to_string()))
    }
}

pub fn money(s: &str) -> BigDecimal {
    s.parse::<BigDecimal>().unwrap()
}

pub fn watch_snapshot(owner_id: Uuid, list_price: Option<&str>) -> WatchSnapshot {
    WatchSnapshot {
        id: Uuid::new_v4(),
        owner_id,
        owner_email: "seller@example.com".to_string(),
        name: "Nautilus 5711".to_string(),
        reference_code: "5711/1A-010".to_string(),
        list_price: list_price.map(money),
    }
}

pub fn user_profile(id: Uuid, email: &str, client_id: Option<&str>, fee_rate: &str) -> UserProfile {
    UserProfile {
        id,
        email: email.to_string(),
        junopay_client_id: client_id.map(str::to_string),
        fee_rate_percent: money(fee_rate),
    }
}
