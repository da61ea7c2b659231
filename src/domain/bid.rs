//! Bid domain entity and negotiation state machine.
//! Framework-agnostic: transition rules live here so they can be checked
//! without touching storage.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Negotiation states for a bid.
///
/// `Negotiating` is a legacy status that imported rows may still carry; the
/// engine never writes it and treats it exactly like `CounterOffer` when
/// deciding transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Offered,
    CounterOffer,
    Negotiating,
    Accepted,
    Rejected,
    Cancelled,
}

impl BidStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BidStatus::Accepted | BidStatus::Rejected | BidStatus::Cancelled
        )
    }

    /// Collapses the legacy `Negotiating` status onto `CounterOffer` for
    /// transition decisions.
    fn normalized(&self) -> BidStatus {
        match self {
            BidStatus::Negotiating => BidStatus::CounterOffer,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Offered => "offered",
            BidStatus::CounterOffer => "counter_offer",
            BidStatus::Negotiating => "negotiating",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
            BidStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for BidStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offered" => Ok(BidStatus::Offered),
            "counter_offer" => Ok(BidStatus::CounterOffer),
            "negotiating" => Ok(BidStatus::Negotiating),
            "accepted" => Ok(BidStatus::Accepted),
            "rejected" => Ok(BidStatus::Rejected),
            "cancelled" => Ok(BidStatus::Cancelled),
            other => Err(format!("unknown bid status: {}", other)),
        }
    }
}

/// Which side of the negotiation a caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Buyer,
    Seller,
}

impl PartyRole {
    pub fn counterpart(&self) -> PartyRole {
        match self {
            PartyRole::Buyer => PartyRole::Seller,
            PartyRole::Seller => PartyRole::Buyer,
        }
    }
}

/// One step of the negotiation. Appended on every transition, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationEntry {
    pub amount: BigDecimal,
    pub proposed_by: Uuid,
    pub role: PartyRole,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidComment {
    pub author_id: Uuid,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// A buyer's proposed price for a watch, subject to negotiation.
#[derive(Debug, Clone)]
pub struct Bid {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub bidder_id: Uuid,
    /// Owner contact captured at placement; survives owner reassignment on
    /// the listing side.
    pub seller_email: String,
    pub amount: BigDecimal,
    pub status: BidStatus,
    /// Frozen at the moment of acceptance, immutable afterwards. Readers of
    /// "the accepted price" must use this, never re-derive from `amount`.
    pub agreed_price: Option<BigDecimal>,
    pub history: Vec<NegotiationEntry>,
    pub comments: Vec<BidComment>,
    /// Optimistic-concurrency counter; bumped by the repository on every
    /// successful write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(
        watch_id: Uuid,
        bidder_id: Uuid,
        seller_email: String,
        amount: BigDecimal,
        message: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            watch_id,
            bidder_id,
            seller_email,
            amount: amount.clone(),
            status: BidStatus::Offered,
            agreed_price: None,
            history: vec![NegotiationEntry {
                amount,
                proposed_by: bidder_id,
                role: PartyRole::Buyer,
                message,
                at: now,
            }],
            comments: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Role of the party who proposed the price currently on the table.
    pub fn last_proposer(&self) -> Option<PartyRole> {
        self.history.last().map(|entry| entry.role)
    }

    /// Whether `role` may drive the bid from its current status to
    /// `requested`.
    ///
    /// The rules:
    /// - `offered -> accepted | rejected`: seller only
    /// - `offered -> cancelled`: buyer only
    /// - `counter_offer -> accepted`: the recipient of the counter, i.e.
    ///   whoever did not propose the amount on the table
    /// - `counter_offer -> cancelled`: buyer only
    /// - any non-terminal `-> counter_offer`: either party
    /// - terminal states admit nothing
    pub fn may_transition(&self, requested: BidStatus, role: PartyRole) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match (self.status.normalized(), requested) {
            (_, BidStatus::CounterOffer) => true,
            (BidStatus::Offered, BidStatus::Accepted) => role == PartyRole::Seller,
            (BidStatus::Offered, BidStatus::Rejected) => role == PartyRole::Seller,
            (BidStatus::Offered, BidStatus::Cancelled) => role == PartyRole::Buyer,
            (BidStatus::CounterOffer, BidStatus::Accepted) => {
                // A party cannot accept its own counter.
                self.last_proposer() == Some(role.counterpart())
            }
            (BidStatus::CounterOffer, BidStatus::Cancelled) => role == PartyRole::Buyer,
            _ => false,
        }
    }

    /// Applies an authorized transition, appending exactly one history
    /// entry. Callers must have checked `may_transition` first.
    pub fn apply_transition(
        &mut self,
        requested: BidStatus,
        actor_id: Uuid,
        role: PartyRole,
        counter_amount: Option<BigDecimal>,
        message: Option<String>,
    ) {
        let now = Utc::now();

        if requested == BidStatus::CounterOffer {
            if let Some(new_amount) = counter_amount {
                self.amount = new_amount;
            }
        }
        if requested == BidStatus::Accepted {
            self.agreed_price = Some(self.amount.clone());
        }

        self.status = requested;
        self.history.push(NegotiationEntry {
            amount: self.amount.clone(),
            proposed_by: actor_id,
            role,
            message,
            at: now,
        });
        self.updated_at = now;
    }

    pub fn add_comment(&mut self, author_id: Uuid, body: String) {
        let now = Utc::now();
        self.comments.push(BidComment {
            author_id,
            body,
            at: now,
        });
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(amount: u32) -> Bid {
        Bid::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "owner@example.com".to_string(),
            BigDecimal::from(amount),
            None,
        )
    }

    #[test]
    fn test_new_bid_starts_offered_with_one_history_entry() {
        let b = bid(9000);
        assert_eq!(b.status, BidStatus::Offered);
        assert_eq!(b.history.len(), 1);
        assert_eq!(b.history[0].role, PartyRole::Buyer);
        assert_eq!(b.history[0].amount, BigDecimal::from(9000));
        assert!(b.agreed_price.is_none());
    }

    #[test]
    fn test_seller_accepts_offer() {
        let b = bid(9000);
        assert!(b.may_transition(BidStatus::Accepted, PartyRole::Seller));
        assert!(!b.may_transition(BidStatus::Accepted, PartyRole::Buyer));
    }

    #[test]
    fn test_only_buyer_cancels_offer() {
        let b = bid(9000);
        assert!(b.may_transition(BidStatus::Cancelled, PartyRole::Buyer));
        assert!(!b.may_transition(BidStatus::Cancelled, PartyRole::Seller));
    }

    #[test]
    fn test_either_party_counters() {
        let b = bid(9000);
        assert!(b.may_transition(BidStatus::CounterOffer, PartyRole::Buyer));
        assert!(b.may_transition(BidStatus::CounterOffer, PartyRole::Seller));
    }

    #[test]
    fn test_counter_recipient_accepts() {
        let mut b = bid(9000);
        let seller = Uuid::new_v4();
        b.apply_transition(
            BidStatus::CounterOffer,
            seller,
            PartyRole::Seller,
            Some(BigDecimal::from(9500)),
            None,
        );

        // Seller countered, so only the buyer may accept.
        assert!(b.may_transition(BidStatus::Accepted, PartyRole::Buyer));
        assert!(!b.may_transition(BidStatus::Accepted, PartyRole::Seller));
    }

    #[test]
    fn test_rejection_not_reachable_from_counter() {
        let mut b = bid(9000);
        b.apply_transition(
            BidStatus::CounterOffer,
            Uuid::new_v4(),
            PartyRole::Seller,
            Some(BigDecimal::from(9500)),
            None,
        );
        assert!(!b.may_transition(BidStatus::Rejected, PartyRole::Seller));
        assert!(!b.may_transition(BidStatus::Rejected, PartyRole::Buyer));
    }

    #[test]
    fn test_accept_freezes_agreed_price() {
        let mut b = bid(9000);
        b.apply_transition(
            BidStatus::CounterOffer,
            Uuid::new_v4(),
            PartyRole::Seller,
            Some(BigDecimal::from(9500)),
            None,
        );
        b.apply_transition(
            BidStatus::Accepted,
            b.bidder_id,
            PartyRole::Buyer,
            None,
            None,
        );

        assert_eq!(b.status, BidStatus::Accepted);
        assert_eq!(b.agreed_price, Some(BigDecimal::from(9500)));
        assert_eq!(b.history.len(), 3);
        assert_eq!(b.history.last().unwrap().amount, b.amount);
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        let mut b = bid(9000);
        b.apply_transition(
            BidStatus::Accepted,
            Uuid::new_v4(),
            PartyRole::Seller,
            None,
            None,
        );
        for requested in [
            BidStatus::CounterOffer,
            BidStatus::Cancelled,
            BidStatus::Rejected,
            BidStatus::Accepted,
        ] {
            assert!(!b.may_transition(requested, PartyRole::Buyer));
            assert!(!b.may_transition(requested, PartyRole::Seller));
        }
    }

    #[test]
    fn test_negotiating_behaves_like_counter_offer() {
        let mut b = bid(9000);
        b.apply_transition(
            BidStatus::CounterOffer,
            Uuid::new_v4(),
            PartyRole::Seller,
            Some(BigDecimal::from(9500)),
            None,
        );
        b.status = BidStatus::Negotiating;

        assert!(b.may_transition(BidStatus::Accepted, PartyRole::Buyer));
        assert!(!b.may_transition(BidStatus::Accepted, PartyRole::Seller));
        assert!(b.may_transition(BidStatus::CounterOffer, PartyRole::Seller));
    }

    #[test]
    fn test_history_grows_by_one_per_transition() {
        let mut b = bid(9000);
        let before = b.history.len();
        b.apply_transition(
            BidStatus::CounterOffer,
            Uuid::new_v4(),
            PartyRole::Seller,
            Some(BigDecimal::from(9300)),
            Some("meet me halfway".to_string()),
        );
        assert_eq!(b.history.len(), before + 1);
        assert_eq!(b.amount, BigDecimal::from(9300));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            BidStatus::Offered,
            BidStatus::CounterOffer,
            BidStatus::Negotiating,
            BidStatus::Accepted,
            BidStatus::Rejected,
            BidStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<BidStatus>().unwrap(), status);
        }
    }
}
