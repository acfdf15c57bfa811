//! Order Service
//!
//! Loads and saves order documents and drives the fulfillment axis. Every
//! save hands the aggregate's pending events to the [`EventDispatcher`] once
//! the write has committed.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::access::AccessControl;
use crate::application::notifications::EventDispatcher;
use crate::application::stock_ledger::StockLedger;
use crate::domain::aggregates::{Order, OrderLine};
use crate::domain::ports::OrderRepository;
use crate::domain::value_objects::{Customer, Money, OrderId, ShippingInfo};
use crate::{Result, StorefrontError};

/// A legacy order placed directly, without a hosted checkout session.
#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub customer: Customer,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub shipping_info: Option<ShippingInfo>,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    ledger: StockLedger,
    access: AccessControl,
    dispatcher: EventDispatcher,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, ledger: StockLedger, access: AccessControl, dispatcher: EventDispatcher) -> Self {
        Self { repo, ledger, access, dispatcher }
    }

    pub fn ledger(&self) -> &StockLedger { &self.ledger }
    pub fn access(&self) -> &AccessControl { &self.access }

    /// Places a pending order under a server-assigned id, holding its stock.
    #[instrument(skip(self, cmd), fields(user_id = %cmd.customer.user_id, product_id = %cmd.product_id, quantity = cmd.quantity))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order> {
        if cmd.quantity == 0 { return Err(StorefrontError::Validation("quantity must be at least 1".into())); }
        if !self.ledger.reserve(&cmd.product_id, cmd.quantity).await {
            let available = self.ledger.available(&cmd.product_id).await;
            return Err(StorefrontError::InsufficientStock { product_id: cmd.product_id, requested: cmd.quantity, available });
        }
        let line = OrderLine {
            total_amount: cmd.unit_price.multiply(cmd.quantity),
            product_id: cmd.product_id,
            product_name: cmd.product_name,
            quantity: cmd.quantity,
        };
        let mut order = Order::place(OrderId::assigned(), cmd.customer, line, cmd.shipping_info);
        if let Err(e) = self.save(&mut order).await {
            self.ledger.release(order.product_id(), order.quantity()).await;
            return Err(e);
        }
        info!(order_id = %order.id(), "Order placed");
        Ok(order)
    }

    /// Reads an order visible to `actor`: its owner or staff.
    pub async fn get(&self, actor: &str, order_id: &str) -> Result<Order> {
        let order = self.load(&OrderId::parse(order_id)?).await?;
        self.require_owner_or_staff(actor, &order).await?;
        Ok(order)
    }

    pub async fn list_for_user(&self, actor: &str, user_id: &str) -> Result<Vec<Order>> {
        if actor != user_id { self.access.require_staff(actor).await?; }
        self.repo.list_for_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn ship(&self, actor: &str, order_id: &str, tracking_number: Option<String>) -> Result<Order> {
        self.access.require_staff(actor).await?;
        let mut order = self.load(&OrderId::parse(order_id)?).await?;
        order.ship(tracking_number)?;
        self.save(&mut order).await?;
        info!("Order shipped");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn deliver(&self, actor: &str, order_id: &str) -> Result<Order> {
        self.access.require_staff(actor).await?;
        let mut order = self.load(&OrderId::parse(order_id)?).await?;
        order.deliver()?;
        self.save(&mut order).await?;
        info!("Order delivered");
        Ok(order)
    }

    /// Cancels a pending order and releases the stock it still holds.
    #[instrument(skip(self))]
    pub async fn cancel(&self, actor: &str, order_id: &str) -> Result<Order> {
        let mut order = self.load(&OrderId::parse(order_id)?).await?;
        self.require_owner_or_staff(actor, &order).await?;
        let held = order.holds_reservation();
        order.cancel()?;
        self.save(&mut order).await?;
        if held { self.ledger.release(order.product_id(), order.quantity()).await; }
        info!("Order cancelled");
        Ok(order)
    }

    pub(crate) async fn load(&self, id: &OrderId) -> Result<Order> {
        self.repo.get(id).await?.ok_or_else(|| StorefrontError::OrderNotFound(id.to_string()))
    }

    pub(crate) async fn find(&self, id: &OrderId) -> Result<Option<Order>> { self.repo.get(id).await }

    /// Persists the order, then dispatches the events its transitions raised.
    pub(crate) async fn save(&self, order: &mut Order) -> Result<()> {
        let events = order.take_events();
        if let Err(e) = self.repo.upsert(order).await {
            warn!(order_id = %order.id(), error = %e, dropped_events = events.len(), "Order write failed");
            return Err(e);
        }
        self.dispatcher.dispatch(events).await;
        Ok(())
    }

    pub(crate) async fn require_owner_or_staff(&self, actor: &str, order: &Order) -> Result<()> {
        if order.user_id() == actor { return Ok(()); }
        self.access.require_staff(actor).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::notifications::{NotificationCountCache, NotificationService};
    use crate::domain::aggregates::{NotificationKind, OrderStatus, ProductStock};
    use crate::domain::ports::Role;
    use crate::infrastructure::memory::{MemoryNotificationRepository, MemoryOrderRepository, MemoryRoleStore, MemoryStockRepository};
    use rust_decimal::Decimal;
    use std::time::Duration;

    pub(crate) struct Fixture {
        pub orders: OrderService,
        pub stock: Arc<MemoryStockRepository>,
        pub notifications: NotificationService,
    }

    /// In-memory wiring with `admin` and `staff` users granted.
    pub(crate) fn fixture() -> Fixture {
        let stock = Arc::new(MemoryStockRepository::new());
        let roles = Arc::new(MemoryRoleStore::new());
        roles.grant("admin", vec![Role::Admin]);
        roles.grant("staff", vec![Role::TeamMember]);
        let notifications = NotificationService::new(
            Arc::new(MemoryNotificationRepository::new()),
            Arc::new(NotificationCountCache::new(Duration::from_secs(30))),
            "default",
        );
        let orders = OrderService::new(
            Arc::new(MemoryOrderRepository::new()),
            StockLedger::new(stock.clone(), 15),
            AccessControl::new(roles),
            EventDispatcher::new(notifications.clone(), None),
        );
        Fixture { orders, stock, notifications }
    }

    pub(crate) fn customer() -> Customer {
        Customer { user_id: "CUST001".into(), email: "ada@example.com".into(), name: "Ada".into() }
    }

    fn place(quantity: u32) -> PlaceOrder {
        PlaceOrder {
            customer: customer(), product_id: "P1".into(), product_name: "Widget".into(), quantity,
            unit_price: Money::usd(Decimal::new(1250, 2)), shipping_info: None,
        }
    }

    #[tokio::test]
    async fn test_place_order_reserves_stock() {
        let f = fixture();
        let order = f.orders.place_order(place(2)).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount().amount(), Decimal::new(2500, 2));
        let s = f.orders.ledger().snapshot("P1").await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (15, 2));
    }

    #[tokio::test]
    async fn test_place_order_reports_available_stock() {
        let f = fixture();
        f.stock.put(ProductStock::from_parts("P1", 5, 4, chrono::Utc::now()));
        let err = f.orders.place_order(place(3)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InsufficientStock { requested: 3, available: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancel_releases_reservation() {
        let f = fixture();
        let order = f.orders.place_order(place(2)).await.unwrap();
        assert!(matches!(f.orders.cancel("someone-else", order.id().as_str()).await, Err(StorefrontError::Forbidden(_))));
        let cancelled = f.orders.cancel("CUST001", order.id().as_str()).await.unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(f.orders.ledger().snapshot("P1").await.unwrap().reserved_stock(), 0);
    }

    #[tokio::test]
    async fn test_shipping_requires_staff_and_notifies() {
        let f = fixture();
        let order = f.orders.place_order(place(1)).await.unwrap();
        let id = order.id().clone();
        let mut paid = f.orders.load(&id).await.unwrap();
        paid.record_payment(Some("pi_1".into())).unwrap();
        f.orders.save(&mut paid).await.unwrap();

        assert!(matches!(f.orders.ship("CUST001", id.as_str(), None).await, Err(StorefrontError::Forbidden(_))));
        let shipped = f.orders.ship("staff", id.as_str(), Some("TRK1".into())).await.unwrap();
        assert_eq!(shipped.tracking().unwrap().tracking_number(), Some("TRK1"));
        let delivered = f.orders.deliver("admin", id.as_str()).await.unwrap();
        assert_eq!(delivered.status(), OrderStatus::Delivered);

        let kinds: Vec<_> = f.notifications.list("CUST001").await.unwrap().into_iter().map(|n| n.kind).collect();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&NotificationKind::OrderShipped));
        assert!(kinds.contains(&NotificationKind::OrderDelivered));
    }

    #[tokio::test]
    async fn test_orders_are_private_to_owner_and_staff() {
        let f = fixture();
        let order = f.orders.place_order(place(1)).await.unwrap();
        assert!(f.orders.get("CUST001", order.id().as_str()).await.is_ok());
        assert!(f.orders.get("staff", order.id().as_str()).await.is_ok());
        assert!(f.orders.get("CUST002", order.id().as_str()).await.is_err());
        assert_eq!(f.orders.list_for_user("admin", "CUST001").await.unwrap().len(), 1);
        assert!(f.orders.list_for_user("CUST002", "CUST001").await.is_err());
        assert!(matches!(f.orders.get("admin", "missing").await, Err(StorefrontError::OrderNotFound(_))));
    }
}
