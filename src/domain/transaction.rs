//! Transaction domain entity.
//! Framework-agnostic record of a purchase handed off to JunoPay.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local view of a JunoPay transaction's status. The provider's status
/// string is authoritative; anything it reports that we do not recognize is
/// carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Initiated,
    Pending,
    Confirmed,
    Completed,
    Declined,
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Initiated => "initiated",
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Declined => "declined",
            OrderStatus::Other(s) => s.as_str(),
        }
    }

    pub fn from_provider(raw: &str) -> OrderStatus {
        match raw {
            "initiated" => OrderStatus::Initiated,
            "pending" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "completed" => OrderStatus::Completed,
            "declined" => OrderStatus::Declined,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

/// Actions a buyer (or admin on their behalf) may forward to JunoPay for an
/// open transaction. Anything else is rejected before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Confirm,
    Query,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Confirm => "confirm",
            OrderAction::Query => "query",
        }
    }
}

impl std::str::FromStr for OrderAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm" => Ok(OrderAction::Confirm),
            "query" => Ok(OrderAction::Query),
            other => Err(format!("unrecognized action: {}", other)),
        }
    }
}

/// The record of a purchase settled through JunoPay.
///
/// Monetary fields and both parties' provider client ids are snapshots taken
/// at creation time; later changes to the user or the fee schedule never
/// touch an existing transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    /// JunoPay's own id; only exists once the initiate call succeeded.
    pub provider_tx_id: String,
    pub watch_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_client_id: String,
    pub seller_client_id: String,
    pub product_name: String,
    pub product_code: String,
    pub currency: String,
    pub purchase_price: BigDecimal,
    pub shipping_price: BigDecimal,
    pub buyer_fee: BigDecimal,
    pub total_price: BigDecimal,
    pub status: OrderStatus,
    pub buyer_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Buyer fee at the rate in effect right now. Rounded to cents, half-up.
pub fn compute_buyer_fee(purchase_price: &BigDecimal, fee_rate_percent: &BigDecimal) -> BigDecimal {
    (purchase_price * fee_rate_percent / BigDecimal::from(100)).round(2)
}

impl Transaction {
    /// Builds the local record for a transaction the provider has already
    /// accepted. `total_price` is computed here, once; it is never
    /// recomputed on read (stale totals are fixed by the explicit repair
    /// operation).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
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
        status: OrderStatus,
        buyer_note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let total_price = &purchase_price + &shipping_price + &buyer_fee;
        Self {
            id: Uuid::new_v4(),
            provider_tx_id,
            watch_id,
            buyer_id,
            seller_id,
            buyer_client_id,
            seller_client_id,
            product_name,
            product_code,
            currency,
            purchase_price,
            shipping_price,
            buyer_fee,
            total_price,
            status,
            buyer_note,
            created_at: now,
            updated_at: now,
        }
    }

    /// The total the stored components add up to. Compared against
    /// `total_price` by the repair operation.
    pub fn expected_total(&self) -> BigDecimal {
        &self.purchase_price + &self.shipping_price + &self.buyer_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn sample(purchase: &str, shipping: &str, fee: &str) -> Transaction {
        Transaction::new(
            "JP-1001".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "buyer-client".to_string(),
            "seller-client".to_string(),
            "Submariner Date".to_string(),
            "126610LN".to_string(),
            "USD".to_string(),
            money(purchase),
            money(shipping),
            money(fee),
            OrderStatus::Initiated,
            None,
        )
    }

    #[test]
    fn test_total_is_sum_of_components() {
        let tx = sample("9500.00", "45.00", "142.50");
        assert_eq!(tx.total_price, money("9687.50"));
        assert_eq!(tx.expected_total(), tx.total_price);
    }

    #[test]
    fn test_buyer_fee_computation() {
        let fee = compute_buyer_fee(&money("9500.00"), &money("1.5"));
        assert_eq!(fee, money("142.50"));
    }

    #[test]
    fn test_buyer_fee_rounds_to_cents() {
        // 3333.33 * 1.5% = 49.99995 -> 50.00
        let fee = compute_buyer_fee(&money("3333.33"), &money("1.5"));
        assert_eq!(fee, money("50.00"));
    }

    #[test]
    fn test_zero_fee_rate() {
        let fee = compute_buyer_fee(&money("9500.00"), &money("0"));
        assert_eq!(fee.round(2), money("0.00"));
    }

    #[test]
    fn test_order_status_from_provider_keeps_unknown_values() {
        assert_eq!(OrderStatus::from_provider("pending"), OrderStatus::Pending);
        assert_eq!(
            OrderStatus::from_provider("under_review"),
            OrderStatus::Other("under_review".to_string())
        );
    }

    #[test]
    fn test_order_action_parsing() {
        assert_eq!("confirm".parse::<OrderAction>(), Ok(OrderAction::Confirm));
        assert_eq!("query".parse::<OrderAction>(), Ok(OrderAction::Query));
        assert!("refund".parse::<OrderAction>().is_err());
    }
}
