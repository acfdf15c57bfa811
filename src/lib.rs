//! Quibble Commerce
//!
//! Order lifecycle core for the Quibble storefront.
//!
//! ## Features
//! - Stock ledger with reservation-based admission control
//! - Order phases from checkout through delivery
//! - Payment bridge over an external checkout provider
//! - Four-stage refund workflow with stock restoration
//! - Shipment tracking timelines with pinned anchors
//! - Customer notifications and email campaigns

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod state;

use thiserror::Error;

use crate::domain::aggregates::{OrderError, StockError};
use crate::domain::value_objects::{MoneyError, OrderIdError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: String, requested: u32, available: u32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Checkout handoff is required to finalize new order {0}")]
    MissingHandoff(String),

    #[error("Checkout handoff does not belong to order {0}")]
    HandoffMismatch(String),

    #[error("Order {order_id} has no payment reference and none could be recovered; the refund requires manual processing in the payment dashboard")]
    ManualRefundRequired { order_id: String },

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Email provider error: {0}")]
    Email(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StockError> for StorefrontError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient { product_id, requested, available } => Self::InsufficientStock { product_id, requested, available },
        }
    }
}

impl From<OrderIdError> for StorefrontError {
    fn from(err: OrderIdError) -> Self { Self::Validation(err.to_string()) }
}

impl From<MoneyError> for StorefrontError {
    fn from(err: MoneyError) -> Self { Self::Validation(err.to_string()) }
}

impl From<sqlx::Error> for StorefrontError {
    fn from(err: sqlx::Error) -> Self { Self::Storage(err.to_string()) }
}

impl From<sqlx::migrate::MigrateError> for StorefrontError {
    fn from(err: sqlx::migrate::MigrateError) -> Self { Self::Storage(err.to_string()) }
}

impl From<serde_json::Error> for StorefrontError {
    fn from(err: serde_json::Error) -> Self { Self::Storage(format!("document encoding: {err}")) }
}

impl From<validator::ValidationErrors> for StorefrontError {
    fn from(err: validator::ValidationErrors) -> Self { Self::Validation(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
