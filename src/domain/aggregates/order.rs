//! Order Aggregate
//!
//! Fulfillment, payment and refund progress live in one tagged [`OrderPhase`]
//! rather than three independent fields, so combinations such as a processed
//! refund on an unpaid order cannot be represented. The flat three-axis view
//! is derived on demand by [`Order::status`], [`Order::payment_status`],
//! [`Order::refund_status`] and [`Order::snapshot`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::aggregates::refund::{ProcessedRefund, RefundAction, RefundError, RefundRequest, RefundState, RefundStatus};
use crate::domain::aggregates::tracking::{TrackingError, TrackingTimeline};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Customer, Money, OrderId, ShippingInfo};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    customer: Customer,
    product_id: String,
    product_name: String,
    quantity: u32,
    total_amount: Money,
    payment_intent_id: Option<String>,
    shipping_info: Option<ShippingInfo>,
    tracking_info: Option<TrackingTimeline>,
    phase: OrderPhase,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<OrderEvent>,
}

/// The single product line an order was placed for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderLine { pub product_id: String, pub product_name: String, pub quantity: u32, pub total_amount: Money }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum OrderPhase {
    Pending { payment: PendingPayment },
    Cancelled { payment: PendingPayment },
    Paid,
    Shipped { refund: RefundState },
    Delivered { refund: RefundState },
    Refunded { refund: ProcessedRefund },
}

/// Payment progress of an unpaid order. An awaiting order holds its stock
/// reservation; a failed one has already released it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPayment { #[default] Awaiting, Failed }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Paid, Shipped, Delivered, Cancelled, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Completed, Failed, Refunded }

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending", Self::Paid => "paid", Self::Shipped => "shipped",
            Self::Delivered => "delivered", Self::Cancelled => "cancelled", Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// Flat document view of an order, the shape clients and the admin panel read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub refund_status: RefundStatus,
    pub refund_reason: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub refund_requested_at: Option<DateTime<Utc>>,
    pub refund_rejection_reason: Option<String>,
    pub payment_intent_id: Option<String>,
    pub shipping_info: Option<ShippingInfo>,
    pub tracking_info: Option<TrackingTimeline>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("cannot {action} an order in status {from}")]
    InvalidTransition { from: OrderStatus, action: &'static str },
    #[error("order has already been paid")]
    AlreadyPaid,
    #[error("order in status {status} is not eligible for a refund")]
    NotRefundable { status: OrderStatus },
    #[error("refund amount must be positive and no more than the order total")]
    InvalidRefundAmount,
    #[error("shipping info is already set")]
    ShippingInfoLocked,
    #[error("tracking is not available for an order in status {status}")]
    TrackingUnavailable { status: OrderStatus },
    #[error(transparent)]
    Refund(#[from] RefundError),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

impl Order {
    pub fn place(id: OrderId, customer: Customer, line: OrderLine, shipping_info: Option<ShippingInfo>) -> Self {
        Self::place_at(id, customer, line, shipping_info, Utc::now())
    }

    /// Places an order whose creation time was fixed elsewhere, such as a checkout handoff.
    pub fn place_at(id: OrderId, customer: Customer, line: OrderLine, shipping_info: Option<ShippingInfo>, created_at: DateTime<Utc>) -> Self {
        let mut order = Self {
            id, customer, product_id: line.product_id, product_name: line.product_name, quantity: line.quantity,
            total_amount: line.total_amount, payment_intent_id: None, shipping_info, tracking_info: None,
            phase: OrderPhase::Pending { payment: PendingPayment::Awaiting }, created_at, updated_at: Utc::now(), events: vec![],
        };
        order.raise_event(OrderEvent::Placed { order_id: order.id.to_string(), user_id: order.customer.user_id.clone() });
        order
    }

    pub fn id(&self) -> &OrderId { &self.id }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn user_id(&self) -> &str { &self.customer.user_id }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn product_name(&self) -> &str { &self.product_name }
    pub fn quantity(&self) -> u32 { self.quantity }
    pub fn total_amount(&self) -> &Money { &self.total_amount }
    pub fn payment_intent_id(&self) -> Option<&str> { self.payment_intent_id.as_deref() }
    pub fn shipping_info(&self) -> Option<&ShippingInfo> { self.shipping_info.as_ref() }
    pub fn tracking(&self) -> Option<&TrackingTimeline> { self.tracking_info.as_ref() }
    pub fn phase(&self) -> &OrderPhase { &self.phase }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Whether the order's quantity is still reserved in the stock ledger.
    pub fn holds_reservation(&self) -> bool { self.phase == OrderPhase::Pending { payment: PendingPayment::Awaiting } }

    pub fn status(&self) -> OrderStatus {
        match self.phase {
            OrderPhase::Pending { .. } => OrderStatus::Pending,
            OrderPhase::Cancelled { .. } => OrderStatus::Cancelled,
            OrderPhase::Paid => OrderStatus::Paid,
            OrderPhase::Shipped { .. } => OrderStatus::Shipped,
            OrderPhase::Delivered { .. } => OrderStatus::Delivered,
            OrderPhase::Refunded { .. } => OrderStatus::Refunded,
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        match self.phase {
            OrderPhase::Pending { payment } | OrderPhase::Cancelled { payment } => match payment {
                PendingPayment::Awaiting => PaymentStatus::Pending,
                PendingPayment::Failed => PaymentStatus::Failed,
            },
            OrderPhase::Paid | OrderPhase::Shipped { .. } | OrderPhase::Delivered { .. } => PaymentStatus::Completed,
            OrderPhase::Refunded { .. } => PaymentStatus::Refunded,
        }
    }

    pub fn refund_status(&self) -> RefundStatus {
        match &self.phase {
            OrderPhase::Shipped { refund } | OrderPhase::Delivered { refund } => refund.status(),
            OrderPhase::Refunded { .. } => RefundStatus::Processed,
            _ => RefundStatus::None,
        }
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        let (request, rejection_reason) = match &self.phase {
            OrderPhase::Shipped { refund } | OrderPhase::Delivered { refund } => (
                refund.request(),
                match refund { RefundState::Rejected { reason, .. } => Some(reason.clone()), _ => None },
            ),
            OrderPhase::Refunded { refund } => (Some(&refund.request), None),
            _ => (None, None),
        };
        OrderSnapshot {
            id: self.id.to_string(),
            user_id: self.customer.user_id.clone(),
            user_email: self.customer.email.clone(),
            user_name: self.customer.name.clone(),
            product_id: self.product_id.clone(),
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            total_amount: self.total_amount.amount(),
            currency: self.total_amount.currency().to_string(),
            status: self.status(),
            payment_status: self.payment_status(),
            refund_status: self.refund_status(),
            refund_reason: request.map(|r| r.reason.clone()),
            refund_amount: request.map(|r| r.amount.amount()),
            refund_requested_at: request.map(|r| r.requested_at),
            refund_rejection_reason: rejection_reason,
            payment_intent_id: self.payment_intent_id.clone(),
            shipping_info: self.shipping_info.clone(),
            tracking_info: self.tracking_info.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn set_shipping_info(&mut self, info: ShippingInfo) -> Result<(), OrderError> {
        if self.shipping_info.is_some() { return Err(OrderError::ShippingInfoLocked); }
        self.shipping_info = Some(info);
        self.touch();
        Ok(())
    }

    /// Marks payment captured. Only a pending order can move to paid.
    pub fn record_payment(&mut self, payment_intent_id: Option<String>) -> Result<(), OrderError> {
        match self.phase {
            OrderPhase::Pending { .. } => {}
            OrderPhase::Cancelled { .. } => return Err(self.invalid("record payment for")),
            _ => return Err(OrderError::AlreadyPaid),
        }
        if payment_intent_id.is_some() { self.payment_intent_id = payment_intent_id; }
        self.phase = OrderPhase::Paid;
        self.touch();
        self.raise_event(OrderEvent::Paid {
            order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone(),
            amount: self.total_amount.amount(), payment_intent_id: self.payment_intent_id.clone(),
        });
        Ok(())
    }

    /// Records a failed or abandoned payment. The caller releases the hold.
    pub fn record_payment_failure(&mut self) -> Result<(), OrderError> {
        if !self.holds_reservation() { return Err(self.invalid("fail payment for")); }
        self.phase = OrderPhase::Pending { payment: PendingPayment::Failed };
        self.touch();
        self.raise_event(OrderEvent::PaymentFailed { order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone() });
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        let OrderPhase::Pending { payment } = self.phase else { return Err(self.invalid("cancel")) };
        self.phase = OrderPhase::Cancelled { payment };
        self.touch();
        self.raise_event(OrderEvent::Cancelled { order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone() });
        Ok(())
    }

    pub fn ship(&mut self, tracking_number: Option<String>) -> Result<(), OrderError> {
        if self.phase != OrderPhase::Paid { return Err(self.invalid("ship")); }
        let now = Utc::now();
        self.phase = OrderPhase::Shipped { refund: RefundState::None };
        match self.tracking_info.as_mut() {
            Some(timeline) => { if let Some(t) = &tracking_number { timeline.set_tracking_number(t.clone()); } }
            None => self.tracking_info = Some(TrackingTimeline::start(tracking_number.clone(), now)),
        }
        self.touch();
        self.raise_event(OrderEvent::Shipped {
            order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone(), tracking_number,
        });
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        let OrderPhase::Shipped { refund } = &self.phase else { return Err(self.invalid("deliver")) };
        let now = Utc::now();
        self.phase = OrderPhase::Delivered { refund: refund.clone() };
        self.tracking_info.get_or_insert_with(|| TrackingTimeline::start(None, now)).mark_delivered(now);
        self.touch();
        self.raise_event(OrderEvent::Delivered { order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone() });
        Ok(())
    }

    /// Opens a refund. Only shipped or delivered orders with captured payment
    /// and no earlier refund request qualify; `amount` defaults to the order total.
    pub fn request_refund(&mut self, reason: impl Into<String>, amount: Option<Money>) -> Result<(), OrderError> {
        let amount = amount.unwrap_or_else(|| self.total_amount.clone());
        if !amount.is_positive() || amount.currency() != self.total_amount.currency() || amount.amount() > self.total_amount.amount() {
            return Err(OrderError::InvalidRefundAmount);
        }
        let status = self.status();
        let refund = match &mut self.phase {
            OrderPhase::Shipped { refund } | OrderPhase::Delivered { refund } => refund,
            OrderPhase::Refunded { .. } => return Err(RefundError::InvalidTransition { from: RefundStatus::Processed, action: RefundAction::Request }.into()),
            _ => return Err(OrderError::NotRefundable { status }),
        };
        let reason = reason.into();
        *refund = refund.open(RefundRequest { reason: reason.clone(), amount: amount.clone(), requested_at: Utc::now() })?;
        self.touch();
        self.raise_event(OrderEvent::RefundRequested {
            order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone(), amount: amount.amount(), reason,
        });
        Ok(())
    }

    pub fn approve_refund(&mut self, by: impl Into<String>) -> Result<(), OrderError> {
        let refund = self.refund_slot(RefundAction::Approve)?;
        *refund = refund.approve(by)?;
        let amount = refund.request().map(|r| r.amount.amount()).unwrap_or_default();
        self.touch();
        self.raise_event(OrderEvent::RefundApproved { order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone(), amount });
        Ok(())
    }

    pub fn reject_refund(&mut self, by: impl Into<String>, reason: impl Into<String>) -> Result<(), OrderError> {
        let reason = reason.into();
        let refund = self.refund_slot(RefundAction::Reject)?;
        *refund = refund.reject(by, reason.clone())?;
        self.touch();
        self.raise_event(OrderEvent::RefundRejected { order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone(), reason });
        Ok(())
    }

    /// The approved request awaiting execution at the payment provider.
    pub fn approved_refund(&self) -> Result<&RefundRequest, OrderError> {
        match &self.phase {
            OrderPhase::Shipped { refund: RefundState::Approved { request, .. } }
            | OrderPhase::Delivered { refund: RefundState::Approved { request, .. } } => Ok(request),
            _ => Err(RefundError::InvalidTransition { from: self.refund_status(), action: RefundAction::Process }.into()),
        }
    }

    /// Records a refund the payment provider has executed. A payment reference
    /// recovered during processing is attached if the order had none.
    pub fn complete_refund(&mut self, by: impl Into<String>, provider_refund_id: impl Into<String>, recovered_payment_intent: Option<String>) -> Result<(), OrderError> {
        let processed = match &self.phase {
            OrderPhase::Shipped { refund } | OrderPhase::Delivered { refund } => refund.process(by, provider_refund_id)?,
            _ => return Err(RefundError::InvalidTransition { from: self.refund_status(), action: RefundAction::Process }.into()),
        };
        if self.payment_intent_id.is_none() { self.payment_intent_id = recovered_payment_intent; }
        let (amount, provider_refund_id) = (processed.request.amount.amount(), processed.provider_refund_id.clone());
        self.phase = OrderPhase::Refunded { refund: processed };
        self.touch();
        self.raise_event(OrderEvent::RefundProcessed {
            order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone(), amount, provider_refund_id,
        });
        Ok(())
    }

    /// Runs an edit against the tracking timeline of a dispatched order.
    pub fn update_tracking<T>(&mut self, edit: impl FnOnce(&mut TrackingTimeline) -> Result<T, TrackingError>) -> Result<T, OrderError> {
        match self.phase {
            OrderPhase::Shipped { .. } | OrderPhase::Delivered { .. } | OrderPhase::Refunded { .. } => {}
            _ => return Err(OrderError::TrackingUnavailable { status: self.status() }),
        }
        let dispatched_at = self.updated_at;
        let timeline = self.tracking_info.get_or_insert_with(|| TrackingTimeline::start(None, dispatched_at));
        let out = edit(timeline)?;
        let status = timeline.latest_status().unwrap_or("Updated").to_string();
        self.touch();
        self.raise_event(OrderEvent::TrackingUpdated { order_id: self.id.to_string(), user_id: self.customer.user_id.clone(), product_name: self.product_name.clone(), status });
        Ok(out)
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }

    fn refund_slot(&mut self, action: RefundAction) -> Result<&mut RefundState, OrderError> {
        let from = self.refund_status();
        match &mut self.phase {
            OrderPhase::Shipped { refund } | OrderPhase::Delivered { refund } => Ok(refund),
            _ => Err(RefundError::InvalidTransition { from, action }.into()),
        }
    }

    fn invalid(&self, action: &'static str) -> OrderError { OrderError::InvalidTransition { from: self.status(), action } }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(quantity: u32) -> Order {
        Order::place(
            OrderId::assigned(),
            Customer { user_id: "CUST001".into(), email: "test@example.com".into(), name: "Test".into() },
            OrderLine { product_id: "P1".into(), product_name: "Widget".into(), quantity, total_amount: Money::usd(Decimal::new(10, 0)).multiply(quantity) },
            None,
        )
    }

    fn shipped(quantity: u32) -> Order {
        let mut o = order(quantity);
        o.record_payment(Some("pi_1".into())).unwrap();
        o.ship(Some("TRK".into())).unwrap();
        o.take_events();
        o
    }

    #[test]
    fn test_order_workflow() {
        let mut o = order(2);
        assert_eq!((o.status(), o.payment_status(), o.refund_status()), (OrderStatus::Pending, PaymentStatus::Pending, RefundStatus::None));
        o.record_payment(Some("pi_1".into())).unwrap();
        assert_eq!((o.status(), o.payment_status()), (OrderStatus::Paid, PaymentStatus::Completed));
        o.ship(None).unwrap();
        assert_eq!(o.status(), OrderStatus::Shipped);
        assert_eq!(o.tracking().unwrap().events().len(), 2);
        o.deliver().unwrap();
        assert_eq!(o.status(), OrderStatus::Delivered);
        let names: Vec<_> = o.take_events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["placed", "paid", "shipped", "delivered"]);
    }

    #[test]
    fn test_second_payment_is_rejected() {
        let mut o = order(1);
        o.record_payment(None).unwrap();
        assert_eq!(o.record_payment(Some("pi_2".into())), Err(OrderError::AlreadyPaid));
        assert_eq!(o.payment_intent_id(), None);
    }

    #[test]
    fn test_failed_payment_gives_up_the_hold() {
        let mut o = order(1);
        assert!(o.holds_reservation());
        o.record_payment_failure().unwrap();
        assert!(!o.holds_reservation());
        assert_eq!(o.payment_status(), PaymentStatus::Failed);
        assert!(matches!(o.record_payment_failure(), Err(OrderError::InvalidTransition { .. })));
        o.record_payment(Some("pi_retry".into())).unwrap();
        assert_eq!(o.status(), OrderStatus::Paid);
        assert!(!o.holds_reservation());
    }

    #[test]
    fn test_cancel_only_from_pending() {
        let mut o = order(1);
        o.record_payment_failure().unwrap();
        o.cancel().unwrap();
        assert_eq!((o.status(), o.payment_status()), (OrderStatus::Cancelled, PaymentStatus::Failed));
        assert!(matches!(o.record_payment(None), Err(OrderError::InvalidTransition { .. })));

        let mut paid = order(1);
        paid.record_payment(None).unwrap();
        assert_eq!(paid.cancel(), Err(OrderError::InvalidTransition { from: OrderStatus::Paid, action: "cancel" }));
    }

    #[test]
    fn test_full_refund_cycle() {
        let mut o = shipped(3);
        o.request_refund("arrived broken", None).unwrap();
        assert_eq!(o.refund_status(), RefundStatus::Requested);
        assert_eq!(o.snapshot().refund_amount, Some(Decimal::new(30, 0)));
        o.approve_refund("admin").unwrap();
        assert_eq!(o.approved_refund().unwrap().reason, "arrived broken");
        o.complete_refund("admin", "re_1", None).unwrap();
        assert_eq!((o.status(), o.payment_status(), o.refund_status()), (OrderStatus::Refunded, PaymentStatus::Refunded, RefundStatus::Processed));
        let names: Vec<_> = o.take_events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["refund_requested", "refund_approved", "refund_processed"]);
    }

    #[test]
    fn test_unshipped_orders_are_not_refundable() {
        let mut o = order(1);
        assert_eq!(o.request_refund("changed mind", None), Err(OrderError::NotRefundable { status: OrderStatus::Pending }));
        o.record_payment(None).unwrap();
        assert_eq!(o.request_refund("changed mind", None), Err(OrderError::NotRefundable { status: OrderStatus::Paid }));
    }

    #[test]
    fn test_refund_transitions_out_of_order_are_rejected() {
        let mut o = shipped(1);
        assert_eq!(o.approve_refund("a"), Err(OrderError::Refund(RefundError::InvalidTransition { from: RefundStatus::None, action: RefundAction::Approve })));
        assert!(o.complete_refund("a", "re", None).is_err());
        o.request_refund("late", None).unwrap();
        assert!(o.request_refund("again", None).is_err());
        o.reject_refund("a", "outside window").unwrap();
        assert_eq!(o.snapshot().refund_rejection_reason.as_deref(), Some("outside window"));
        assert!(o.request_refund("third", None).is_err());
        assert!(o.approve_refund("a").is_err());
    }

    #[test]
    fn test_refund_amount_is_bounded_by_total() {
        let mut o = shipped(1);
        assert_eq!(o.request_refund("x", Some(Money::usd(Decimal::new(11, 0)))), Err(OrderError::InvalidRefundAmount));
        assert_eq!(o.request_refund("x", Some(Money::usd(Decimal::ZERO))), Err(OrderError::InvalidRefundAmount));
        o.request_refund("x", Some(Money::usd(Decimal::new(4, 0)))).unwrap();
    }

    #[test]
    fn test_refunded_order_cannot_be_re_requested() {
        let mut o = shipped(1);
        o.request_refund("x", None).unwrap();
        o.approve_refund("a").unwrap();
        o.complete_refund("a", "re", Some("pi_recovered".into())).unwrap();
        assert_eq!(o.payment_intent_id(), Some("pi_1"));
        assert!(matches!(o.request_refund("x", None), Err(OrderError::Refund(RefundError::InvalidTransition { from: RefundStatus::Processed, .. }))));
    }

    #[test]
    fn test_refund_survives_delivery() {
        let mut o = shipped(1);
        o.request_refund("x", None).unwrap();
        o.deliver().unwrap();
        assert_eq!(o.refund_status(), RefundStatus::Requested);
    }

    #[test]
    fn test_shipping_info_is_immutable() {
        let mut o = order(1);
        o.set_shipping_info(ShippingInfo { city: "Lagos".into(), ..Default::default() }).unwrap();
        assert_eq!(o.set_shipping_info(ShippingInfo::default()), Err(OrderError::ShippingInfoLocked));
    }

    #[test]
    fn test_tracking_requires_dispatch() {
        let mut o = order(1);
        assert!(matches!(o.update_tracking(|t| Ok(t.events().len())), Err(OrderError::TrackingUnavailable { status: OrderStatus::Pending })));
        let mut s = shipped(1);
        assert_eq!(s.update_tracking(|t| Ok(t.events().len())).unwrap(), 2);
        assert_eq!(s.take_events().len(), 1);
    }

    #[test]
    fn test_order_document_round_trips_phase() {
        let mut o = shipped(2);
        o.request_refund("x", None).unwrap();
        let json = serde_json::to_string(&o).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.refund_status(), RefundStatus::Requested);
        assert_eq!(back.phase(), o.phase());
    }
}
