//! Checkout orchestrator driving a cart through pricing, payment and commit.

use std::time::{Duration, Instant};

use common::{Money, ProductId, UserId};
use domain::{CartLedger, InventoryLedger, OrderLedger};
use store::{NewOrder, NewOrderLine, Order, OrderStatus, Session, Store};

use crate::error::CheckoutError;
use crate::services::notification::{NotificationJob, NotificationQueue};
use crate::services::payment::{PaymentGateway, PaymentRequest, PaymentResponse};
use crate::state::CheckoutState;

/// Upper bound on a single payment authorization.
pub const PAYMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings forwarded to the payment gateway.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub currency: String,
    pub payment_token: String,
    pub payment_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            payment_token: String::new(),
            payment_timeout: PAYMENT_TIMEOUT,
        }
    }
}

/// Cart contents and total as read in the `Priced` state.
#[derive(Debug)]
struct PricedCart {
    lines: Vec<(ProductId, i64)>,
    total: Money,
}

/// Orchestrates checkouts.
///
/// The payment call happens before any row lock is taken, and all local
/// writes happen in one store session after the gateway approved. Nothing
/// reverses an authorization when that session fails to commit.
pub struct CheckoutOrchestrator<S, P, N>
where
    S: Store,
    P: PaymentGateway,
    N: NotificationQueue,
{
    store: S,
    payment: P,
    notifications: N,
    config: CheckoutConfig,
    cart: CartLedger,
    inventory: InventoryLedger,
    orders: OrderLedger,
}

impl<S, P, N> CheckoutOrchestrator<S, P, N>
where
    S: Store,
    P: PaymentGateway,
    N: NotificationQueue,
{
    /// Creates an orchestrator with the default configuration.
    pub fn new(store: S, payment: P, notifications: N) -> Self {
        Self::with_config(store, payment, notifications, CheckoutConfig::default())
    }

    pub fn with_config(store: S, payment: P, notifications: N, config: CheckoutConfig) -> Self {
        Self {
            store,
            payment,
            notifications,
            config,
            cart: CartLedger::new(),
            inventory: InventoryLedger::new(),
            orders: OrderLedger::new(),
        }
    }

    /// Replaces the inventory ledger, e.g. to apply another stock policy.
    pub fn with_inventory(mut self, inventory: InventoryLedger) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Turns the user's cart into a paid order.
    ///
    /// On success the returned order is committed, stock is reduced by the
    /// purchased quantities and the cart is empty. On failure no local state
    /// has changed.
    #[tracing::instrument(skip(self), fields(%user_id))]
    pub async fn checkout(&self, user_id: UserId) -> Result<Order, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let mut state = CheckoutState::Start;
        let result = self.run(user_id, &mut state).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("checkout_committed_total").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total, "checkout committed");
                self.notify(order).await;
            }
            Err(e) => {
                let failed_in = state;
                transition(&mut state, CheckoutState::Aborted);
                metrics::counter!("checkout_aborted_total", "reason" => e.reason()).increment(1);
                tracing::warn!(%failed_in, reason = e.reason(), error = %e, "checkout aborted");
            }
        }

        result
    }

    async fn run(&self, user_id: UserId, state: &mut CheckoutState) -> Result<Order, CheckoutError> {
        let priced = self.price(user_id).await?;
        transition(state, CheckoutState::Priced);

        let authorization = self.authorize(&priced).await?;
        transition(state, CheckoutState::Authorized);

        let order = self
            .commit(user_id, &priced, &authorization.transaction_id)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    transaction_id = %authorization.transaction_id,
                    amount = %priced.total,
                    error = %e,
                    "commit failed after payment authorization; authorization was not reversed"
                );
            })?;
        transition(state, CheckoutState::Committed);

        Ok(order)
    }

    /// Start → Priced: reads the cart and totals it at current prices.
    async fn price(&self, user_id: UserId) -> Result<PricedCart, CheckoutError> {
        let mut session = self.store.begin().await?;
        let items = self.cart.get(&mut session, user_id).await;
        session.rollback().await?;
        let items = items?;

        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = Money::checked_sum(items.iter().map(|item| item.subtotal()))
            .ok_or_else(|| {
                CheckoutError::InvalidAmount("cart total exceeds the supported range".to_string())
            })?;
        let lines = items
            .iter()
            .map(|item| (item.product.id, item.quantity))
            .collect();

        tracing::debug!(%total, "cart priced");
        Ok(PricedCart { lines, total })
    }

    /// Priced → Authorized: one bounded gateway call, never retried.
    async fn authorize(&self, priced: &PricedCart) -> Result<PaymentResponse, CheckoutError> {
        let request = PaymentRequest {
            order_reference: format!("chk-{}", uuid::Uuid::new_v4()),
            amount: PaymentRequest::major_units(priced.total),
            currency: self.config.currency.clone(),
            payment_token: self.config.payment_token.clone(),
        };
        let order_reference = request.order_reference.clone();

        let response =
            match tokio::time::timeout(self.config.payment_timeout, self.payment.authorize(request))
                .await
            {
                Err(_) => {
                    return Err(CheckoutError::PaymentUnavailable(format!(
                        "no answer within {:?}",
                        self.config.payment_timeout
                    )));
                }
                Ok(Err(e)) => return Err(CheckoutError::PaymentUnavailable(e.to_string())),
                Ok(Ok(response)) => response,
            };

        if !response.success {
            return Err(CheckoutError::PaymentDeclined(response.message));
        }

        tracing::info!(%order_reference, transaction_id = %response.transaction_id, "payment authorized");
        Ok(response)
    }

    /// Authorized → Committed: all local writes in one session.
    ///
    /// Commits the priced snapshot. Lines added to the cart while payment was
    /// in flight are cleared along with the purchased ones.
    async fn commit(
        &self,
        user_id: UserId,
        priced: &PricedCart,
        transaction_id: &str,
    ) -> Result<Order, CheckoutError> {
        let mut session = self.store.begin().await?;

        match self
            .apply(&mut session, user_id, priced, transaction_id)
            .await
        {
            Ok(order) => {
                session.commit().await?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback) = session.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        session: &mut S::Session,
        user_id: UserId,
        priced: &PricedCart,
        transaction_id: &str,
    ) -> Result<Order, CheckoutError> {
        let mut lines = Vec::with_capacity(priced.lines.len());
        for &(product_id, quantity) in &priced.lines {
            let product = self
                .inventory
                .get_for_exclusive_read(session, product_id)
                .await?;
            self.inventory.decrement(session, &product, quantity).await?;
            lines.push(NewOrderLine {
                product_id,
                quantity,
                unit_price: product.price,
            });
        }

        let order = self
            .orders
            .create(
                session,
                NewOrder {
                    user_id,
                    total: priced.total,
                    status: OrderStatus::Paid,
                    transaction_id: transaction_id.to_string(),
                    lines,
                },
            )
            .await?;
        self.cart.clear(session, user_id).await?;

        Ok(order)
    }

    /// Enqueues the confirmation job; failures are logged and dropped.
    async fn notify(&self, order: &Order) {
        if let Err(e) = self
            .notifications
            .enqueue(NotificationJob::order_confirmation(order))
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "failed to enqueue order confirmation");
        }
    }
}

fn transition(state: &mut CheckoutState, next: CheckoutState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal checkout transition {state} -> {next}"
    );
    tracing::debug!(from = %state, to = %next, "checkout state changed");
    *state = next;
}
