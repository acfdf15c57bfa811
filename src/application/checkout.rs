//! Payment Bridge
//!
//! Opens hosted checkout sessions and finalizes orders when the customer
//! returns from the payment provider.
//!
//! A new checkout has no order document until payment succeeds. The client
//! keeps a [`CheckoutHandoff`] describing the provisional order under a
//! `new_`-prefixed id and hands it back on completion, when the document is
//! upserted already paid. Orders that existed before checkout are updated
//! in place instead.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::orders::OrderService;
use crate::domain::aggregates::{Order, OrderError, OrderLine, OrderStatus};
use crate::domain::ports::{CheckoutSession, CheckoutSessionRequest, PaymentIntentQuery, PaymentProvider};
use crate::domain::value_objects::{Customer, Money, OrderId, ShippingInfo};
use crate::{Result, StorefrontError};

/// Half-width of the window searched around an order's creation time when
/// recovering a missing payment reference.
pub const RECOVERY_WINDOW_DAYS: i64 = 1;

/// Provisional order contents carried by the client through the hosted
/// payment flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutHandoff {
    pub order_id: OrderId,
    pub customer: Customer,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub total_amount: Money,
    pub shipping_info: Option<ShippingInfo>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub customer: Customer,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub shipping_info: Option<ShippingInfo>,
    /// The client already holds a cart reservation for this quantity.
    pub stock_reserved: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStarted {
    pub order_id: String,
    pub session_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff: Option<CheckoutHandoff>,
}

#[derive(Clone)]
pub struct PaymentBridge {
    orders: OrderService,
    payments: Arc<dyn PaymentProvider>,
    app_base_url: String,
}

impl PaymentBridge {
    pub fn new(orders: OrderService, payments: Arc<dyn PaymentProvider>, app_base_url: impl Into<String>) -> Self {
        Self { orders, payments, app_base_url: app_base_url.into().trim_end_matches('/').to_string() }
    }

    /// Opens a session for a provisional order. Stock is reserved here unless
    /// the client says it already holds the reservation; a failed session
    /// releases whatever this call reserved.
    #[instrument(skip(self, req), fields(user_id = %req.customer.user_id, product_id = %req.product_id, quantity = req.quantity))]
    pub async fn begin_checkout(&self, req: CheckoutRequest) -> Result<CheckoutStarted> {
        if req.quantity == 0 { return Err(StorefrontError::Validation("quantity must be at least 1".into())); }
        let ledger = self.orders.ledger();
        if !req.stock_reserved && !ledger.reserve(&req.product_id, req.quantity).await {
            let available = ledger.available(&req.product_id).await;
            return Err(StorefrontError::InsufficientStock { product_id: req.product_id, requested: req.quantity, available });
        }

        let handoff = CheckoutHandoff {
            order_id: OrderId::new_checkout(),
            total_amount: req.unit_price.multiply(req.quantity),
            customer: req.customer,
            product_id: req.product_id,
            product_name: req.product_name,
            quantity: req.quantity,
            shipping_info: req.shipping_info,
            created_at: Utc::now(),
        };
        let session = self
            .open_session(&handoff.order_id, &handoff.customer, &handoff.product_name, handoff.quantity, &handoff.total_amount)
            .await;
        match session {
            Ok(session) => {
                info!(order_id = %handoff.order_id, session_id = %session.session_id, "Checkout session opened");
                Ok(CheckoutStarted { order_id: handoff.order_id.to_string(), session_id: session.session_id, url: session.url, handoff: Some(handoff) })
            }
            Err(e) => {
                if !req.stock_reserved { ledger.release(&handoff.product_id, handoff.quantity).await; }
                Err(e)
            }
        }
    }

    /// Opens a session to pay for an order that already exists in the store,
    /// attaching the delivery address when the order has none yet.
    #[instrument(skip(self, shipping_info))]
    pub async fn begin_checkout_for_order(&self, actor: &str, order_id: &str, shipping_info: Option<ShippingInfo>) -> Result<CheckoutStarted> {
        let mut order = self.orders.load(&OrderId::parse(order_id)?).await?;
        if order.user_id() != actor { return Err(StorefrontError::Forbidden(format!("order {order_id} belongs to another user"))); }
        if order.status() != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition { from: order.status(), action: "check out" }.into());
        }
        if let Some(info) = shipping_info {
            order.set_shipping_info(info)?;
            self.orders.save(&mut order).await?;
        }
        let session = self.open_session(order.id(), order.customer(), order.product_name(), order.quantity(), order.total_amount()).await?;
        Ok(CheckoutStarted { order_id: order.id().to_string(), session_id: session.session_id, url: session.url, handoff: None })
    }

    /// Finalizes a paid checkout. Creates the order for a `new_` id from its
    /// handoff, updates a pre-existing order otherwise, then converts the
    /// reservation into a sale. An order whose hold was released by an earlier
    /// abandonment reserves its stock again first. Completing an order that
    /// is already paid changes nothing.
    #[instrument(skip(self, handoff))]
    pub async fn complete_checkout(&self, actor: &str, order_id: &str, session_id: &str, handoff: Option<CheckoutHandoff>) -> Result<Order> {
        let id = OrderId::parse(order_id)?;
        let mut order = match self.orders.find(&id).await? {
            Some(existing) => existing,
            None => order_from_handoff(&id, handoff)?,
        };
        if order.user_id() != actor { return Err(StorefrontError::Forbidden(format!("order {id} belongs to another user"))); }
        if order.status() != OrderStatus::Pending && order.status() != OrderStatus::Cancelled {
            info!("Checkout already finalized");
            return Ok(order);
        }

        let ledger = self.orders.ledger();
        let rehold = order.status() == OrderStatus::Pending && !order.holds_reservation();
        if rehold && !ledger.reserve(order.product_id(), order.quantity()).await {
            let available = ledger.available(order.product_id()).await;
            warn!(available, "Stock was sold while the payment was outstanding");
            return Err(StorefrontError::InsufficientStock { product_id: order.product_id().to_string(), requested: order.quantity(), available });
        }

        let reference = match self.payments.get_payment_intent(session_id).await {
            Ok(Some(intent)) => Some(intent.id),
            Ok(None) => recover_payment_reference(self.payments.as_ref(), &order).await,
            Err(e) => {
                warn!(error = %e, "Session lookup failed");
                recover_payment_reference(self.payments.as_ref(), &order).await
            }
        };
        let recorded = match order.record_payment(reference) {
            Ok(()) => self.orders.save(&mut order).await,
            Err(OrderError::AlreadyPaid) => return Ok(order),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = recorded {
            if rehold { ledger.release(order.product_id(), order.quantity()).await; }
            return Err(e);
        }
        ledger.purchase(order.product_id(), order.quantity()).await;
        info!(payment_intent_id = ?order.payment_intent_id(), "Checkout completed");
        Ok(order)
    }

    /// Gives up on a checkout: records the failed payment and releases the
    /// held stock. A `new_` checkout is stored as a failed order so that a
    /// repeated abandonment or a late completion sees the hold is gone.
    /// Abandoning a checkout that already gave up its hold changes nothing.
    #[instrument(skip(self, handoff))]
    pub async fn abandon_checkout(&self, actor: &str, order_id: &str, handoff: Option<CheckoutHandoff>) -> Result<Order> {
        let id = OrderId::parse(order_id)?;
        let mut order = match self.orders.find(&id).await? {
            Some(existing) => existing,
            None => order_from_handoff(&id, handoff)?,
        };
        if order.user_id() != actor { return Err(StorefrontError::Forbidden(format!("order {id} belongs to another user"))); }
        if order.status() == OrderStatus::Pending && !order.holds_reservation() {
            info!("Checkout already abandoned");
            return Ok(order);
        }
        order.record_payment_failure()?;
        self.orders.save(&mut order).await?;
        self.orders.ledger().release(order.product_id(), order.quantity()).await;
        info!("Checkout abandoned");
        Ok(order)
    }

    async fn open_session(&self, id: &OrderId, customer: &Customer, product_name: &str, quantity: u32, total: &Money) -> Result<CheckoutSession> {
        let request = CheckoutSessionRequest {
            order_id: id.to_string(),
            amount: total.minor_units()?,
            currency: total.currency().to_lowercase(),
            customer_email: customer.email.clone(),
            product_name: product_name.to_string(),
            quantity,
            success_url: format!("{}/checkout/success?order_id={id}&session_id={{CHECKOUT_SESSION_ID}}", self.app_base_url),
            cancel_url: format!("{}/checkout/cancel?order_id={id}", self.app_base_url),
        };
        self.payments.create_checkout_session(&request).await
    }
}

/// Rebuilds the provisional order a client carried through the payment flow.
fn order_from_handoff(id: &OrderId, handoff: Option<CheckoutHandoff>) -> Result<Order> {
    if !id.is_new_checkout() { return Err(StorefrontError::OrderNotFound(id.to_string())); }
    let handoff = handoff.ok_or_else(|| StorefrontError::MissingHandoff(id.to_string()))?;
    if &handoff.order_id != id { return Err(StorefrontError::HandoffMismatch(id.to_string())); }
    let line = OrderLine {
        product_id: handoff.product_id,
        product_name: handoff.product_name,
        quantity: handoff.quantity,
        total_amount: handoff.total_amount,
    };
    Ok(Order::place_at(id.clone(), handoff.customer, line, handoff.shipping_info, handoff.created_at))
}

/// Searches the provider for a captured charge matching the order's total
/// and customer email within [`RECOVERY_WINDOW_DAYS`] of its creation.
/// Only for orders whose reference was never captured; provider errors
/// count as no match.
pub async fn recover_payment_reference(payments: &dyn PaymentProvider, order: &Order) -> Option<String> {
    let amount = match order.total_amount().minor_units() {
        Ok(amount) => amount,
        Err(e) => {
            warn!(order_id = %order.id(), error = %e, "Order total cannot be searched");
            return None;
        }
    };
    let window = Duration::days(RECOVERY_WINDOW_DAYS);
    let query = PaymentIntentQuery {
        amount,
        customer_email: order.customer().email.clone(),
        created_after: order.created_at() - window,
        created_before: order.created_at() + window,
    };
    match payments.find_payment_intent(&query).await {
        Ok(Some(intent)) => {
            info!(order_id = %order.id(), payment_intent_id = %intent.id, "Recovered payment reference");
            Some(intent.id)
        }
        Ok(None) => {
            warn!(order_id = %order.id(), "No payment matched the order");
            None
        }
        Err(e) => {
            warn!(order_id = %order.id(), error = %e, "Payment search failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orders::tests::{customer, fixture, Fixture};
    use crate::domain::aggregates::{NotificationKind, PaymentStatus};
    use crate::domain::ports::PaymentIntent;
    use crate::infrastructure::sandbox::SandboxPaymentProvider;
    use rust_decimal::Decimal;

    fn bridge() -> (PaymentBridge, Arc<SandboxPaymentProvider>, Fixture) {
        let f = fixture();
        let payments = Arc::new(SandboxPaymentProvider::new());
        (PaymentBridge::new(f.orders.clone(), payments.clone(), "https://shop.test/"), payments, f)
    }

    fn request(quantity: u32, stock_reserved: bool) -> CheckoutRequest {
        CheckoutRequest {
            customer: customer(), product_id: "P1".into(), product_name: "Widget".into(), quantity,
            unit_price: Money::usd(Decimal::new(10, 0)), shipping_info: None, stock_reserved,
        }
    }

    #[tokio::test]
    async fn test_happy_path_purchase() {
        let (bridge, _, f) = bridge();
        let started = bridge.begin_checkout(request(2, false)).await.unwrap();
        assert!(started.order_id.starts_with("new_"));
        assert!(started.url.starts_with("https://shop.test/checkout/success"));
        assert_eq!(f.orders.ledger().snapshot("P1").await.unwrap().reserved_stock(), 2);

        let order = bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, started.handoff).await.unwrap();
        assert_eq!((order.status(), order.payment_status()), (OrderStatus::Paid, PaymentStatus::Completed));
        assert!(order.payment_intent_id().is_some_and(|pi| pi.starts_with("pi_sandbox_")));
        let s = f.orders.ledger().snapshot("P1").await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (13, 0));

        let kinds: Vec<_> = f.notifications.list("CUST001").await.unwrap().into_iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::PaymentSuccess]);
    }

    #[tokio::test]
    async fn test_replayed_completion_does_not_purchase_twice() {
        let (bridge, _, f) = bridge();
        let started = bridge.begin_checkout(request(2, false)).await.unwrap();
        bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, started.handoff.clone()).await.unwrap();
        let again = bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, started.handoff).await.unwrap();
        assert_eq!(again.status(), OrderStatus::Paid);
        assert_eq!(f.orders.ledger().get_stock("P1").await, 13);
    }

    #[tokio::test]
    async fn test_new_order_requires_matching_handoff() {
        let (bridge, _, _) = bridge();
        let started = bridge.begin_checkout(request(1, false)).await.unwrap();
        assert!(matches!(
            bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, None).await,
            Err(StorefrontError::MissingHandoff(_))
        ));
        let mut other = started.handoff.clone().unwrap();
        other.order_id = OrderId::new_checkout();
        assert!(matches!(
            bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, Some(other)).await,
            Err(StorefrontError::HandoffMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_existing_order_is_updated_not_duplicated() {
        let (bridge, _, f) = bridge();
        let placed = f.orders.place_order(placed_order(1)).await.unwrap();
        let address = ShippingInfo { full_name: "Ada".into(), city: "Lagos".into(), ..Default::default() };
        let started = bridge.begin_checkout_for_order("CUST001", placed.id().as_str(), Some(address)).await.unwrap();
        assert_eq!(started.order_id, placed.id().to_string());
        bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, None).await.unwrap();
        let orders = f.orders.list_for_user("CUST001", "CUST001").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status(), OrderStatus::Paid);
        assert_eq!(orders[0].shipping_info().map(|i| i.city.as_str()), Some("Lagos"));
    }

    #[tokio::test]
    async fn test_reference_falls_back_to_payment_search() {
        let (bridge, payments, _) = bridge();
        payments.hide_session_intents(true);
        let started = bridge.begin_checkout(request(1, false)).await.unwrap();
        let created = started.handoff.as_ref().unwrap().created_at;
        payments.register_intent(PaymentIntent {
            id: "pi_found".into(), amount: 1000, status: "succeeded".into(),
            customer_email: Some("ADA@example.com".into()), created: created + Duration::hours(2),
        });
        let order = bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, started.handoff).await.unwrap();
        assert_eq!(order.payment_intent_id(), Some("pi_found"));
    }

    #[tokio::test]
    async fn test_abandon_releases_reservation() {
        let (bridge, _, f) = bridge();
        let started = bridge.begin_checkout(request(3, false)).await.unwrap();
        let abandoned = bridge.abandon_checkout("CUST001", &started.order_id, started.handoff).await.unwrap();
        assert_eq!((abandoned.status(), abandoned.payment_status()), (OrderStatus::Pending, PaymentStatus::Failed));
        assert_eq!(f.orders.ledger().snapshot("P1").await.unwrap().reserved_stock(), 0);
    }

    fn placed_order(quantity: u32) -> crate::application::orders::PlaceOrder {
        crate::application::orders::PlaceOrder {
            customer: customer(), product_id: "P1".into(), product_name: "Widget".into(), quantity,
            unit_price: Money::usd(Decimal::new(10, 0)), shipping_info: None,
        }
    }

    #[tokio::test]
    async fn test_released_hold_is_not_released_again() {
        let (bridge, _, f) = bridge();
        let placed = f.orders.place_order(placed_order(2)).await.unwrap();
        assert!(f.orders.ledger().reserve("P1", 3).await);

        bridge.abandon_checkout("CUST001", placed.id().as_str(), None).await.unwrap();
        bridge.abandon_checkout("CUST001", placed.id().as_str(), None).await.unwrap();
        f.orders.cancel("CUST001", placed.id().as_str()).await.unwrap();

        assert_eq!(f.orders.ledger().snapshot("P1").await.unwrap().reserved_stock(), 3);
    }

    #[tokio::test]
    async fn test_completion_after_abandon_reserves_again() {
        let (bridge, _, f) = bridge();
        let placed = f.orders.place_order(placed_order(2)).await.unwrap();
        let started = bridge.begin_checkout_for_order("CUST001", placed.id().as_str(), None).await.unwrap();
        bridge.abandon_checkout("CUST001", &started.order_id, None).await.unwrap();
        assert!(f.orders.ledger().reserve("P1", 3).await);

        let order = bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, None).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        let s = f.orders.ledger().snapshot("P1").await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (13, 3));
    }

    #[tokio::test]
    async fn test_completion_after_abandon_fails_when_stock_is_gone() {
        let (bridge, _, f) = bridge();
        f.stock.put(crate::domain::aggregates::ProductStock::seeded("P1", 5));
        let placed = f.orders.place_order(placed_order(2)).await.unwrap();
        bridge.abandon_checkout("CUST001", placed.id().as_str(), None).await.unwrap();
        assert!(f.orders.ledger().reserve("P1", 4).await);

        let err = bridge.complete_checkout("CUST001", placed.id().as_str(), "cs_late", None).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InsufficientStock { requested: 2, available: 1, .. }));
        let order = f.orders.get("CUST001", placed.id().as_str()).await.unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        let s = f.orders.ledger().snapshot("P1").await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (5, 4));
    }

    #[tokio::test]
    async fn test_abandoned_new_checkout_is_remembered() {
        let (bridge, _, f) = bridge();
        let started = bridge.begin_checkout(request(3, false)).await.unwrap();
        assert!(f.orders.ledger().reserve("P1", 3).await);

        bridge.abandon_checkout("CUST001", &started.order_id, started.handoff.clone()).await.unwrap();
        bridge.abandon_checkout("CUST001", &started.order_id, started.handoff.clone()).await.unwrap();
        assert_eq!(f.orders.ledger().snapshot("P1").await.unwrap().reserved_stock(), 3);

        bridge.complete_checkout("CUST001", &started.order_id, &started.session_id, started.handoff).await.unwrap();
        let s = f.orders.ledger().snapshot("P1").await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (12, 3));
        assert_eq!(f.orders.list_for_user("CUST001", "CUST001").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_client_held_reservation_is_not_doubled() {
        let (bridge, _, f) = bridge();
        assert!(f.orders.ledger().reserve("P1", 2).await);
        bridge.begin_checkout(request(2, true)).await.unwrap();
        assert_eq!(f.orders.ledger().snapshot("P1").await.unwrap().reserved_stock(), 2);
    }

    #[tokio::test]
    async fn test_failed_session_releases_stock() {
        let (bridge, _, f) = bridge();
        let mut free = request(1, false);
        free.unit_price = Money::usd(Decimal::ZERO);
        assert!(matches!(bridge.begin_checkout(free).await, Err(StorefrontError::Payment(_))));
        assert_eq!(f.orders.ledger().snapshot("P1").await.unwrap().reserved_stock(), 0);
    }
}
