//! Negotiation engine: the bid lifecycle between buyer and seller.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Bid, BidStatus, PartyRole};
use crate::error::AppError;
use crate::ports::{
    BidRepository, NotificationKind, NotificationSink, UserDirectory, WatchSnapshot, WatchStore,
};
use crate::validation;

pub struct NegotiationService {
    bids: Arc<dyn BidRepository>,
    watches: Arc<dyn WatchStore>,
    users: Arc<dyn UserDirectory>,
    notifications: Arc<dyn NotificationSink>,
}

impl NegotiationService {
    pub fn new(
        bids: Arc<dyn BidRepository>,
        watches: Arc<dyn WatchStore>,
        users: Arc<dyn UserDirectory>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            bids,
            watches,
            users,
            notifications,
        }
    }

    /// Places an initial offer on a watch.
    ///
    /// The opening amount must sit strictly below the fixed list price when
    /// the seller set one; counters later in the negotiation are free to
    /// move in either direction.
    pub async fn place_bid(
        &self,
        caller: Uuid,
        watch_id: Uuid,
        amount: BigDecimal,
        message: Option<String>,
    ) -> Result<Bid, AppError> {
        let watch = self.require_watch(watch_id).await?;

        if caller == watch.owner_id {
            return Err(AppError::Forbidden(
                "cannot bid on your own watch".to_string(),
            ));
        }
        if amount <= BigDecimal::from(0) {
            return Err(AppError::Validation(
                "amount: must be greater than zero".to_string(),
            ));
        }
        if let Some(list_price) = &watch.list_price {
            if &amount >= list_price {
                return Err(AppError::Validation(format!(
                    "amount: an opening offer must be below the list price of {}",
                    list_price
                )));
            }
        }

        let bid = Bid::new(
            watch_id,
            caller,
            watch.owner_email.clone(),
            amount,
            message.map(|m| validation::sanitize_string(&m)),
        );
        let bid = self.bids.insert(&bid).await?;

        tracing::info!(bid_id = %bid.id, %watch_id, bidder = %caller, "bid placed");
        self.notify(
            watch.owner_id,
            NotificationKind::BidPlaced,
            "New offer received",
            &format!("You received an offer of {} on {}", bid.amount, watch.name),
            bid.id,
        )
        .await;

        Ok(bid)
    }

    /// Drives a bid through one state-machine transition.
    ///
    /// The caller's role is computed against the watch's current owner,
    /// falling back to the owner email captured at placement so a seller
    /// whose canonical owner link changed can still act on old bids.
    pub async fn transition(
        &self,
        caller: Uuid,
        bid_id: Uuid,
        requested: BidStatus,
        counter_amount: Option<BigDecimal>,
        message: Option<String>,
    ) -> Result<Bid, AppError> {
        let stored = self.bids.get_by_id(bid_id).await?;
        let watch = self.require_watch(stored.watch_id).await?;
        let role = self.resolve_role(caller, &stored, &watch).await?;

        if requested == BidStatus::CounterOffer {
            match &counter_amount {
                None => {
                    return Err(AppError::Validation(
                        "amount: required for a counter-offer".to_string(),
                    ));
                }
                Some(amount) if amount <= &BigDecimal::from(0) => {
                    return Err(AppError::Validation(
                        "amount: must be greater than zero".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }

        if !stored.may_transition(requested, role) {
            return Err(AppError::InvalidTransition {
                current: stored.status,
                requested,
                role,
            });
        }

        let expected_version = stored.version;
        let mut bid = stored;
        bid.apply_transition(
            requested,
            caller,
            role,
            counter_amount,
            message.map(|m| validation::sanitize_string(&m)),
        );
        let bid = self.bids.update(&bid, expected_version).await?;

        tracing::info!(
            %bid_id,
            status = bid.status.as_str(),
            role = ?role,
            "bid transition applied"
        );
        self.emit_transition_notification(&bid, &watch, requested, role)
            .await;

        Ok(bid)
    }

    /// Appends a comment to the bid's thread. Either party may comment at
    /// any point, including after the negotiation settled.
    pub async fn add_comment(
        &self,
        caller: Uuid,
        bid_id: Uuid,
        body: String,
    ) -> Result<Bid, AppError> {
        validation::validate_required("body", &body).map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_max_len("body", &body, validation::COMMENT_MAX_LEN)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let stored = self.bids.get_by_id(bid_id).await?;
        let watch = self.require_watch(stored.watch_id).await?;
        self.resolve_role(caller, &stored, &watch).await?;

        let expected_version = stored.version;
        let mut bid = stored;
        bid.add_comment(caller, validation::sanitize_string(&body));

        Ok(self.bids.update(&bid, expected_version).await?)
    }

    pub async fn get_bid(&self, bid_id: Uuid) -> Result<Bid, AppError> {
        Ok(self.bids.get_by_id(bid_id).await?)
    }

    pub async fn bids_for_watch(&self, watch_id: Uuid) -> Result<Vec<Bid>, AppError> {
        self.require_watch(watch_id).await?;
        Ok(self.bids.list_for_watch(watch_id).await?)
    }

    /// Deletion guard for the listing module: a watch with bids still in
    /// play must not be removed.
    pub async fn watch_has_open_bids(&self, watch_id: Uuid) -> Result<bool, AppError> {
        Ok(self.bids.count_open_for_watch(watch_id).await? > 0)
    }

    async fn require_watch(&self, watch_id: Uuid) -> Result<WatchSnapshot, AppError> {
        self.watches
            .get(watch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Watch {} not found", watch_id)))
    }

    async fn resolve_role(
        &self,
        caller: Uuid,
        bid: &Bid,
        watch: &WatchSnapshot,
    ) -> Result<PartyRole, AppError> {
        if caller == bid.bidder_id {
            return Ok(PartyRole::Buyer);
        }
        if caller == watch.owner_id {
            return Ok(PartyRole::Seller);
        }
        // Owner link may have been reassigned since placement; the contact
        // email captured on the bid still identifies the seller.
        if let Some(profile) = self.users.get(caller).await? {
            if profile.email == bid.seller_email {
                return Ok(PartyRole::Seller);
            }
        }

        Err(AppError::Forbidden(
            "caller is neither the bidder nor the seller of this bid".to_string(),
        ))
    }

    /// One notification per transition, always to the counterparty, never
    /// to the actor. Cancellation stays silent.
    async fn emit_transition_notification(
        &self,
        bid: &Bid,
        watch: &WatchSnapshot,
        requested: BidStatus,
        actor_role: PartyRole,
    ) {
        let counterparty = match actor_role {
            PartyRole::Buyer => watch.owner_id,
            PartyRole::Seller => bid.bidder_id,
        };

        let (kind, title, message) = match requested {
            BidStatus::CounterOffer => (
                NotificationKind::BidCounter,
                "Counter-offer received",
                format!("The other party countered with {} on {}", bid.amount, watch.name),
            ),
            BidStatus::Accepted => (
                NotificationKind::BidAccepted,
                "Offer accepted",
                format!(
                    "Your negotiation on {} settled at {}",
                    watch.name,
                    bid.agreed_price.as_ref().unwrap_or(&bid.amount)
                ),
            ),
            BidStatus::Rejected => (
                NotificationKind::BidRejected,
                "Offer declined",
                format!("Your offer of {} on {} was declined", bid.amount, watch.name),
            ),
            // Cancellation is not wired to the feed.
            _ => return,
        };

        self.notify(counterparty, kind, title, &message, bid.id).await;
    }

    async fn notify(
        &self,
        recipient: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        related_entity: Uuid,
    ) {
        if let Err(err) = self
            .notifications
            .notify(recipient, kind, title, message, related_entity)
            .await
        {
            tracing::warn!(%recipient, error = %err, "notification delivery failed");
        }
    }
}
