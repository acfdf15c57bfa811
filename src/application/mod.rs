//! Application services over the domain ports.
pub mod access;
pub mod checkout;
pub mod marketing;
pub mod notifications;
pub mod orders;
pub mod refunds;
pub mod stock_ledger;
pub mod tracking;

pub use access::AccessControl;
pub use checkout::{CheckoutHandoff, CheckoutRequest, CheckoutStarted, PaymentBridge};
pub use marketing::{Campaign, CampaignReport, MarketingService};
pub use notifications::{EventDispatcher, NotificationCountCache, NotificationService};
pub use orders::{OrderService, PlaceOrder};
pub use refunds::RefundWorkflow;
pub use stock_ledger::{Reservation, StockLedger};
pub use tracking::TrackingService;
