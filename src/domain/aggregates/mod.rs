//! Aggregates module
pub mod stock;
pub mod order;
pub mod refund;
pub mod tracking;
pub mod notification;

pub use stock::{ProductStock, StockError, StockMutation};
pub use order::{Order, OrderError, OrderLine, OrderPhase, OrderSnapshot, OrderStatus, PaymentStatus, PendingPayment};
pub use refund::{ProcessedRefund, RefundAction, RefundError, RefundRequest, RefundState, RefundStatus};
pub use tracking::{TrackingError, TrackingEvent, TrackingEventDraft, TrackingTimeline, DESTINATION_LOCATION, ORIGIN_LOCATION};
pub use notification::{Notification, NotificationKind, Priority};
