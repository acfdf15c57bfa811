//! Domain events
//!
//! Order transitions record what happened here; a dispatcher outside the
//! aggregate turns them into notifications and bus messages.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: String, user_id: String },
    Paid { order_id: String, user_id: String, product_name: String, amount: Decimal, payment_intent_id: Option<String> },
    PaymentFailed { order_id: String, user_id: String, product_name: String },
    Shipped { order_id: String, user_id: String, product_name: String, tracking_number: Option<String> },
    Delivered { order_id: String, user_id: String, product_name: String },
    Cancelled { order_id: String, user_id: String, product_name: String },
    RefundRequested { order_id: String, user_id: String, product_name: String, amount: Decimal, reason: String },
    RefundApproved { order_id: String, user_id: String, product_name: String, amount: Decimal },
    RefundRejected { order_id: String, user_id: String, product_name: String, reason: String },
    RefundProcessed { order_id: String, user_id: String, product_name: String, amount: Decimal, provider_refund_id: String },
    TrackingUpdated { order_id: String, user_id: String, product_name: String, status: String },
}

impl OrderEvent {
    /// Short name used as the bus subject suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::Paid { .. } => "paid",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::Shipped { .. } => "shipped",
            Self::Delivered { .. } => "delivered",
            Self::Cancelled { .. } => "cancelled",
            Self::RefundRequested { .. } => "refund_requested",
            Self::RefundApproved { .. } => "refund_approved",
            Self::RefundRejected { .. } => "refund_rejected",
            Self::RefundProcessed { .. } => "refund_processed",
            Self::TrackingUpdated { .. } => "tracking_updated",
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            Self::Placed { order_id, .. }
            | Self::Paid { order_id, .. }
            | Self::PaymentFailed { order_id, .. }
            | Self::Shipped { order_id, .. }
            | Self::Delivered { order_id, .. }
            | Self::Cancelled { order_id, .. }
            | Self::RefundRequested { order_id, .. }
            | Self::RefundApproved { order_id, .. }
            | Self::RefundRejected { order_id, .. }
            | Self::RefundProcessed { order_id, .. }
            | Self::TrackingUpdated { order_id, .. } => order_id,
        }
    }
}
