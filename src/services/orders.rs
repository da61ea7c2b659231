//! Transaction orchestrator: initiation, status reconciliation and explicit
//! provider actions for purchases settled through JunoPay.

use bigdecimal::BigDecimal;
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{OrderAction, OrderStatus, Transaction, compute_buyer_fee};
use crate::error::AppError;
use crate::junopay::{CreateTransactionRequest, JunoPayClient};
use crate::ports::{
    NotificationKind, NotificationSink, TransactionRepository, UserDirectory, UserProfile,
    WatchStore,
};

/// Input for initiating a purchase. Prices arrive already parsed from their
/// wire form.
#[derive(Debug)]
pub struct InitiateOrder {
    pub watch_id: Uuid,
    pub purchase_price: BigDecimal,
    pub shipping_price: BigDecimal,
    pub buyer_note: Option<String>,
}

/// A transaction together with how fresh its status is. `provider_synced`
/// is false when the provider could not be reached and the stored status is
/// served instead.
#[derive(Debug)]
pub struct OrderView {
    pub transaction: Transaction,
    pub provider_synced: bool,
}

/// Outcome of the explicit totals-repair operation.
#[derive(Debug)]
pub struct RepairOutcome {
    pub transaction: Transaction,
    pub repaired: bool,
}

pub struct OrderService {
    transactions: Arc<dyn TransactionRepository>,
    watches: Arc<dyn WatchStore>,
    users: Arc<dyn UserDirectory>,
    notifications: Arc<dyn NotificationSink>,
    junopay: Arc<JunoPayClient>,
    refresh_concurrency: usize,
}

impl OrderService {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        watches: Arc<dyn WatchStore>,
        users: Arc<dyn UserDirectory>,
        notifications: Arc<dyn NotificationSink>,
        junopay: Arc<JunoPayClient>,
        refresh_concurrency: usize,
    ) -> Self {
        Self {
            transactions,
            watches,
            users,
            notifications,
            junopay,
            refresh_concurrency: refresh_concurrency.max(1),
        }
    }

    /// Opens the transaction at JunoPay and persists the local record only
    /// once the provider accepted it. Client ids and the buyer fee are
    /// snapshotted here; nothing recomputes them later.
    pub async fn initiate(&self, buyer_id: Uuid, input: InitiateOrder) -> Result<Transaction, AppError> {
        let watch = self
            .watches
            .get(input.watch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Watch {} not found", input.watch_id)))?;

        if buyer_id == watch.owner_id {
            return Err(AppError::Validation(
                "cannot purchase your own watch".to_string(),
            ));
        }
        if input.purchase_price <= BigDecimal::from(0) {
            return Err(AppError::Validation(
                "purchase_price: must be greater than zero".to_string(),
            ));
        }
        if input.shipping_price < BigDecimal::from(0) {
            return Err(AppError::Validation(
                "shipping_price: must not be negative".to_string(),
            ));
        }

        let buyer = self.require_user(buyer_id).await?;
        let seller = self.require_user(watch.owner_id).await?;

        let seller_client_id = seller.junopay_client_id.clone().ok_or_else(|| {
            AppError::Validation("seller is not connected to JunoPay".to_string())
        })?;
        // A buyer with no linked JunoPay identity has to go through the
        // external login flow before anything can settle.
        let buyer_client_id = buyer
            .junopay_client_id
            .clone()
            .ok_or(AppError::ReauthRequired)?;

        let buyer_fee = compute_buyer_fee(&input.purchase_price, &buyer.fee_rate_percent);
        let total_price = &input.purchase_price + &input.shipping_price + &buyer_fee;

        let request = CreateTransactionRequest {
            seller_client_id: seller_client_id.clone(),
            product_name: watch.name.clone(),
            product_code: watch.reference_code.clone(),
            currency: "USD".to_string(),
            purchase_price: input.purchase_price.to_string(),
            shipping_price: input.shipping_price.to_string(),
            buyer_fee: buyer_fee.to_string(),
            total_price: total_price.to_string(),
            note: input.buyer_note.clone(),
        };

        // Provider first. If this fails there must be no local row, and a
        // reauth signal must reach the caller undiluted.
        let provider_tx = self.junopay.create_transaction(buyer_id, &request).await?;

        let tx = Transaction::new(
            provider_tx.transaction_id,
            watch.id,
            buyer_id,
            watch.owner_id,
            buyer_client_id,
            seller_client_id,
            watch.name.clone(),
            watch.reference_code.clone(),
            "USD".to_string(),
            input.purchase_price,
            input.shipping_price,
            buyer_fee,
            OrderStatus::from_provider(&provider_tx.status),
            input.buyer_note,
        );
        let tx = self.transactions.insert(&tx).await?;

        tracing::info!(
            tx_id = %tx.id,
            provider_tx_id = %tx.provider_tx_id,
            %buyer_id,
            "transaction initiated"
        );
        self.notify(
            tx.seller_id,
            NotificationKind::OrderInitiated,
            "Watch sold",
            &format!("{} sold for {}", tx.product_name, tx.total_price),
            tx.id,
        )
        .await;

        Ok(tx)
    }

    /// Reconciles one transaction against the provider. Best-effort: a
    /// provider failure degrades to the stored status with
    /// `provider_synced: false`, it never fails the caller's page.
    pub async fn refresh_status(&self, caller: Uuid, tx_id: Uuid) -> Result<OrderView, AppError> {
        let tx = self.transactions.get_by_id(tx_id).await?;
        if caller != tx.buyer_id && caller != tx.seller_id {
            return Err(AppError::Forbidden(
                "caller is not a party to this transaction".to_string(),
            ));
        }

        Ok(self.reconcile(tx).await)
    }

    /// All of the buyer's orders, each reconciled live against JunoPay with
    /// bounded concurrency. One failing provider call degrades that row
    /// only. Dropping the returned future stops issuing further provider
    /// calls; rows already persisted stay persisted.
    pub async fn list_orders(&self, buyer_id: Uuid) -> Result<Vec<OrderView>, AppError> {
        let stored = self.transactions.list_for_buyer(buyer_id).await?;

        let views = futures::stream::iter(stored)
            .map(|tx| self.reconcile(tx))
            .buffered(self.refresh_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(views)
    }

    /// Forwards an explicit confirm/query action to the provider. The
    /// action value is validated before any network call; provider failure
    /// here is a hard error since there is no safe fallback.
    pub async fn submit_action(
        &self,
        caller: Uuid,
        tx_id: Uuid,
        action: &str,
    ) -> Result<Transaction, AppError> {
        let action = action
            .parse::<OrderAction>()
            .map_err(AppError::Validation)?;

        let tx = self.transactions.get_by_id(tx_id).await?;
        if caller != tx.buyer_id {
            return Err(AppError::Forbidden(
                "only the buyer may act on this transaction".to_string(),
            ));
        }

        let provider_tx = self
            .junopay
            .submit_action(tx.buyer_id, &tx.provider_tx_id, action.as_str())
            .await?;

        let status = OrderStatus::from_provider(&provider_tx.status);
        let tx = if status != tx.status {
            self.transactions.set_status(tx.id, &status).await?
        } else {
            tx
        };

        tracing::info!(%tx_id, action = action.as_str(), status = status.as_str(), "provider action submitted");
        Ok(tx)
    }

    /// Explicit repair for the stale-total bug class: recomputes
    /// `total_price` from the stored components. Reads never do this.
    pub async fn repair_totals(&self, tx_id: Uuid) -> Result<RepairOutcome, AppError> {
        let tx = self.transactions.get_by_id(tx_id).await?;
        let expected = tx.expected_total();

        if expected == tx.total_price {
            return Ok(RepairOutcome {
                transaction: tx,
                repaired: false,
            });
        }

        tracing::warn!(
            %tx_id,
            stored = %tx.total_price,
            expected = %expected,
            "repairing stale total"
        );
        let tx = self.transactions.set_total(tx.id, &expected).await?;

        Ok(RepairOutcome {
            transaction: tx,
            repaired: true,
        })
    }

    /// Queries the provider for one transaction and persists a changed
    /// status. Every failure path returns the stored row.
    async fn reconcile(&self, tx: Transaction) -> OrderView {
        let provider_tx = match self
            .junopay
            .transaction_info(tx.buyer_id, &tx.provider_tx_id)
            .await
        {
            Ok(provider_tx) => provider_tx,
            Err(err) => {
                tracing::warn!(
                    tx_id = %tx.id,
                    error = %err,
                    "status refresh degraded to stored status"
                );
                return OrderView {
                    transaction: tx,
                    provider_synced: false,
                };
            }
        };

        let status = OrderStatus::from_provider(&provider_tx.status);
        if status == tx.status {
            return OrderView {
                transaction: tx,
                provider_synced: true,
            };
        }

        match self.transactions.set_status(tx.id, &status).await {
            Ok(updated) => {
                self.notify(
                    updated.buyer_id,
                    NotificationKind::OrderStatusChanged,
                    "Order update",
                    &format!(
                        "Your order for {} is now {}",
                        updated.product_name,
                        status.as_str()
                    ),
                    updated.id,
                )
                .await;
                OrderView {
                    transaction: updated,
                    provider_synced: true,
                }
            }
            Err(err) => {
                tracing::error!(tx_id = %tx.id, error = %err, "failed to persist refreshed status");
                OrderView {
                    transaction: tx,
                    provider_synced: false,
                }
            }
        }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<UserProfile, AppError> {
        self.users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
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
