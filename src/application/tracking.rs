//! Staff edits to an order's shipment timeline.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::orders::OrderService;
use crate::domain::aggregates::{Order, TrackingError, TrackingEventDraft, TrackingTimeline};
use crate::domain::value_objects::OrderId;
use crate::Result;

#[derive(Clone)]
pub struct TrackingService { orders: OrderService }

impl TrackingService {
    pub fn new(orders: OrderService) -> Self { Self { orders } }

    #[instrument(skip(self, draft))]
    pub async fn add_event(&self, actor: &str, order_id: &str, draft: TrackingEventDraft) -> Result<Order> {
        let order = self.edit(actor, order_id, |t| t.add(draft)).await?;
        info!("Tracking event added");
        Ok(order)
    }

    #[instrument(skip(self, draft))]
    pub async fn edit_event(&self, actor: &str, order_id: &str, event_id: Uuid, draft: TrackingEventDraft) -> Result<Order> {
        self.edit(actor, order_id, |t| t.edit(event_id, draft)).await
    }

    #[instrument(skip(self))]
    pub async fn remove_event(&self, actor: &str, order_id: &str, event_id: Uuid) -> Result<Order> {
        self.edit(actor, order_id, |t| t.remove(event_id)).await
    }

    /// Applies a proposed ordering; the stored order is always canonical.
    #[instrument(skip(self, proposed))]
    pub async fn reorder(&self, actor: &str, order_id: &str, proposed: Vec<Uuid>) -> Result<Order> {
        self.edit(actor, order_id, |t| t.reorder(&proposed)).await
    }

    async fn edit<T>(&self, actor: &str, order_id: &str, f: impl FnOnce(&mut TrackingTimeline) -> std::result::Result<T, TrackingError>) -> Result<Order> {
        self.orders.access().require_staff(actor).await?;
        let mut order = self.orders.load(&OrderId::parse(order_id)?).await?;
        order.update_tracking(f)?;
        self.orders.save(&mut order).await?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orders::tests::{customer, fixture, Fixture};
    use crate::domain::aggregates::{OrderError, OrderLine, DESTINATION_LOCATION, ORIGIN_LOCATION};
    use crate::domain::value_objects::Money;
    use crate::StorefrontError;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    async fn order(f: &Fixture, ship: bool) -> Order {
        let line = OrderLine { product_id: "P1".into(), product_name: "Widget".into(), quantity: 1, total_amount: Money::usd(Decimal::new(10, 0)) };
        let mut order = Order::place(OrderId::assigned(), customer(), line, None);
        if ship {
            order.record_payment(Some("pi".into())).unwrap();
            order.ship(None).unwrap();
        }
        f.orders.save(&mut order).await.unwrap();
        order
    }

    fn draft(location: &str, hours: i64) -> TrackingEventDraft {
        TrackingEventDraft { timestamp: Some(Utc::now() + Duration::hours(hours)), location: location.into(), status: "In transit".into(), description: String::new() }
    }

    fn locations(order: &Order) -> Vec<String> {
        order.tracking().unwrap().events().iter().map(|e| e.location.clone()).collect()
    }

    #[tokio::test]
    async fn test_events_stay_between_anchors() {
        let f = fixture();
        let svc = TrackingService::new(f.orders.clone());
        let o = order(&f, true).await;
        let id = o.id().as_str();
        svc.add_event("staff", id, draft("Memphis", 5)).await.unwrap();
        let updated = svc.add_event("admin", id, draft("Lagos", 2)).await.unwrap();
        assert_eq!(locations(&updated), vec![ORIGIN_LOCATION, "Lagos", "Memphis", DESTINATION_LOCATION]);

        let mut ids: Vec<Uuid> = updated.tracking().unwrap().events().iter().map(|e| e.id).collect();
        ids.swap(1, 2);
        let reordered = svc.reorder("staff", id, ids.clone()).await.unwrap();
        assert_eq!(locations(&reordered), vec![ORIGIN_LOCATION, "Lagos", "Memphis", DESTINATION_LOCATION]);

        ids.swap(0, 1);
        assert!(matches!(
            svc.reorder("staff", id, ids).await,
            Err(StorefrontError::Order(OrderError::Tracking(TrackingError::AnchorImmovable(_))))
        ));
    }

    #[tokio::test]
    async fn test_remove_keeps_anchors() {
        let f = fixture();
        let svc = TrackingService::new(f.orders.clone());
        let o = order(&f, true).await;
        let id = o.id().as_str();
        let updated = svc.add_event("staff", id, draft("Memphis", 1)).await.unwrap();
        let events = updated.tracking().unwrap().events().to_vec();
        assert!(svc.remove_event("staff", id, events[0].id).await.is_err());
        let trimmed = svc.remove_event("staff", id, events[1].id).await.unwrap();
        assert_eq!(locations(&trimmed), vec![ORIGIN_LOCATION, DESTINATION_LOCATION]);
    }

    #[tokio::test]
    async fn test_customers_cannot_edit_and_pending_orders_have_no_timeline() {
        let f = fixture();
        let svc = TrackingService::new(f.orders.clone());
        let shipped = order(&f, true).await;
        assert!(matches!(svc.add_event("CUST001", shipped.id().as_str(), draft("X", 1)).await, Err(StorefrontError::Forbidden(_))));
        let pending = order(&f, false).await;
        assert!(matches!(
            svc.add_event("staff", pending.id().as_str(), draft("X", 1)).await,
            Err(StorefrontError::Order(OrderError::TrackingUnavailable { .. }))
        ));
    }
}
