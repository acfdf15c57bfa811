//! User-facing notification records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::OrderEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentSuccess,
    PaymentFailed,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    RefundRequested,
    RefundApproved,
    RefundRejected,
    RefundProcessed,
    TrackingUpdated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority { Low, #[default] Normal, High }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub order_id: Option<String>,
    pub product_name: Option<String>,
    pub amount: Option<Decimal>,
    pub read: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: impl Into<String>, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(), user_id: user_id.into(), kind, title: title.into(), message: message.into(),
            order_id: None, product_name: None, amount: None, read: false, priority: Priority::Normal, created_at: Utc::now(),
        }
    }

    fn for_order(mut self, order_id: &str, product_name: &str, amount: Option<Decimal>, priority: Priority) -> Self {
        self.order_id = Some(order_id.to_string());
        self.product_name = Some(product_name.to_string());
        self.amount = amount;
        self.priority = priority;
        self
    }

    /// The notification a customer should see for an order transition, if any.
    pub fn from_event(event: &OrderEvent) -> Option<Self> {
        use NotificationKind as K;
        let n = match event {
            OrderEvent::Placed { .. } => return None,
            OrderEvent::Paid { order_id, user_id, product_name, amount, .. } => Self::new(user_id, K::PaymentSuccess, "Payment successful",
                format!("We received your payment of {} for {product_name}.", amount.round_dp(2)))
                .for_order(order_id, product_name, Some(*amount), Priority::High),
            OrderEvent::PaymentFailed { order_id, user_id, product_name } => Self::new(user_id, K::PaymentFailed, "Payment failed",
                format!("Your payment for {product_name} did not go through. Your items have been released."))
                .for_order(order_id, product_name, None, Priority::High),
            OrderEvent::Shipped { order_id, user_id, product_name, tracking_number } => Self::new(user_id, K::OrderShipped, "Order shipped",
                match tracking_number {
                    Some(t) => format!("{product_name} is on its way. Tracking number: {t}."),
                    None => format!("{product_name} is on its way."),
                })
                .for_order(order_id, product_name, None, Priority::Normal),
            OrderEvent::Delivered { order_id, user_id, product_name } => Self::new(user_id, K::OrderDelivered, "Order delivered",
                format!("{product_name} has been delivered."))
                .for_order(order_id, product_name, None, Priority::Normal),
            OrderEvent::Cancelled { order_id, user_id, product_name } => Self::new(user_id, K::OrderCancelled, "Order cancelled",
                format!("Your order for {product_name} was cancelled."))
                .for_order(order_id, product_name, None, Priority::Normal),
            OrderEvent::RefundRequested { order_id, user_id, product_name, amount, .. } => Self::new(user_id, K::RefundRequested, "Refund requested",
                format!("We received your refund request for {product_name}. Our team will review it shortly."))
                .for_order(order_id, product_name, Some(*amount), Priority::Normal),
            OrderEvent::RefundApproved { order_id, user_id, product_name, amount } => Self::new(user_id, K::RefundApproved, "Refund approved",
                format!("Your refund of {} for {product_name} was approved and will be processed soon.", amount.round_dp(2)))
                .for_order(order_id, product_name, Some(*amount), Priority::High),
            OrderEvent::RefundRejected { order_id, user_id, product_name, reason } => Self::new(user_id, K::RefundRejected, "Refund rejected",
                format!("Your refund request for {product_name} was rejected: {reason}"))
                .for_order(order_id, product_name, None, Priority::High),
            OrderEvent::RefundProcessed { order_id, user_id, product_name, amount, .. } => Self::new(user_id, K::RefundProcessed, "Refund processed",
                format!("{} has been refunded to your original payment method for {product_name}.", amount.round_dp(2)))
                .for_order(order_id, product_name, Some(*amount), Priority::High),
            OrderEvent::TrackingUpdated { order_id, user_id, product_name, status } => Self::new(user_id, K::TrackingUpdated, "Tracking updated",
                format!("{product_name}: {status}"))
                .for_order(order_id, product_name, None, Priority::Low),
        };
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_event_maps_to_high_priority_notification() {
        let event = OrderEvent::Paid { order_id: "o1".into(), user_id: "u1".into(), product_name: "Lamp".into(), amount: Decimal::new(4500, 2), payment_intent_id: None };
        let n = Notification::from_event(&event).unwrap();
        assert_eq!(n.kind, NotificationKind::PaymentSuccess);
        assert_eq!(n.priority, Priority::High);
        assert_eq!(n.order_id.as_deref(), Some("o1"));
        assert!(!n.read);
    }

    #[test]
    fn test_placed_event_is_silent() {
        assert!(Notification::from_event(&OrderEvent::Placed { order_id: "o1".into(), user_id: "u1".into() }).is_none());
    }

    #[test]
    fn test_serialized_kind_uses_type_key() {
        let n = Notification::new("u1", NotificationKind::RefundRejected, "t", "m");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "refund_rejected");
        assert_eq!(json["userId"], "u1");
    }
}
