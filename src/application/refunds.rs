//! Refund Workflow
//!
//! request → approve | reject → process. Approval returns the sold units to
//! stock; processing executes the refund at the payment provider and only
//! then moves the order to `refunded`.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::application::checkout::recover_payment_reference;
use crate::application::orders::OrderService;
use crate::domain::aggregates::Order;
use crate::domain::ports::{PaymentProvider, ProviderRefundRequest};
use crate::domain::value_objects::{Money, OrderId};
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct RefundWorkflow {
    orders: OrderService,
    payments: Arc<dyn PaymentProvider>,
}

impl RefundWorkflow {
    pub fn new(orders: OrderService, payments: Arc<dyn PaymentProvider>) -> Self { Self { orders, payments } }

    /// Customer asks for a refund; `amount` defaults to the order total.
    #[instrument(skip(self, reason))]
    pub async fn request(&self, actor: &str, order_id: &str, reason: &str, amount: Option<Decimal>) -> Result<Order> {
        let reason = reason.trim();
        if reason.is_empty() { return Err(StorefrontError::Validation("a refund reason is required".into())); }
        let mut order = self.orders.load(&OrderId::parse(order_id)?).await?;
        if order.user_id() != actor { return Err(StorefrontError::Forbidden(format!("order {order_id} belongs to another user"))); }
        let amount = amount.map(|a| Money::new(a, order.total_amount().currency()));
        order.request_refund(reason, amount)?;
        self.orders.save(&mut order).await?;
        info!("Refund requested");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, actor: &str, order_id: &str) -> Result<Order> {
        self.orders.access().require_admin(actor).await?;
        let mut order = self.orders.load(&OrderId::parse(order_id)?).await?;
        order.approve_refund(actor)?;
        self.orders.save(&mut order).await?;
        self.orders.ledger().restore(order.product_id(), order.quantity()).await;
        info!(restored = order.quantity(), "Refund approved");
        Ok(order)
    }

    #[instrument(skip(self, reason))]
    pub async fn reject(&self, actor: &str, order_id: &str, reason: &str) -> Result<Order> {
        self.orders.access().require_admin(actor).await?;
        let mut order = self.orders.load(&OrderId::parse(order_id)?).await?;
        order.reject_refund(actor, reason.trim())?;
        self.orders.save(&mut order).await?;
        info!("Refund rejected");
        Ok(order)
    }

    /// Executes an approved refund. An order without a payment reference gets
    /// one bounded recovery search; if that finds nothing the call fails with
    /// [`StorefrontError::ManualRefundRequired`] and the order is untouched.
    #[instrument(skip(self))]
    pub async fn process(&self, actor: &str, order_id: &str) -> Result<Order> {
        self.orders.access().require_admin(actor).await?;
        let mut order = self.orders.load(&OrderId::parse(order_id)?).await?;
        let request = order.approved_refund()?.clone();

        let (payment_intent_id, recovered) = match order.payment_intent_id() {
            Some(pi) => (pi.to_string(), None),
            None => match recover_payment_reference(self.payments.as_ref(), &order).await {
                Some(pi) => (pi.clone(), Some(pi)),
                None => {
                    error!("Refund needs manual processing");
                    return Err(StorefrontError::ManualRefundRequired { order_id: order.id().to_string() });
                }
            },
        };

        let refund = self
            .payments
            .process_refund(&ProviderRefundRequest { payment_intent_id, amount: request.amount.minor_units()?, reason: request.reason.clone() })
            .await?;
        order.complete_refund(actor, refund.refund_id, recovered)?;
        self.orders.save(&mut order).await?;
        info!("Refund processed");
        Ok(order)
    }
}
