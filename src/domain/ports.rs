//! Ports
//!
//! Everything the core reads from or writes to outside its own memory goes
//! through one of these traits: the document store collections, the role
//! store, the payment and email providers, and the event bus.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Notification, Order, ProductStock, StockMutation};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::OrderId;
use crate::Result;

/// Result of a stock mutation: the record after the write and the units moved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockUpdate {
    pub stock: ProductStock,
    pub moved: u32,
}

#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Point read that seeds a record with `default_stock` when none exists.
    async fn get_or_seed(&self, product_id: &str, default_stock: u32) -> Result<ProductStock>;

    /// Per-document atomic read-modify-write. Missing records are seeded first.
    async fn apply(&self, product_id: &str, default_stock: u32, mutation: StockMutation) -> Result<StockUpdate>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>>;
    /// Create-or-replace, keyed by order id.
    async fn upsert(&self, order: &Order) -> Result<()>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;
    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>>;
    async fn ids_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Uuid>>;
    async fn count_unread(&self, user_id: &str) -> Result<u64>;
    /// One batch write; callers keep batches within the store's operation limit.
    async fn set_read(&self, ids: &[Uuid], read: bool) -> Result<()>;
    /// One batch delete; same limit as `set_read`.
    async fn delete(&self, ids: &[Uuid]) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role { Admin, TeamMember, Customer }

impl Role {
    pub fn as_tag(&self) -> &'static str {
        match self { Self::Admin => "admin", Self::TeamMember => "team_member", Self::Customer => "customer" }
    }
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() { "admin" => Some(Self::Admin), "team_member" => Some(Self::TeamMember), "customer" => Some(Self::Customer), _ => None }
    }
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// `None` when the user has no profile.
    async fn roles(&self, user_id: &str) -> Result<Option<Vec<Role>>>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: String,
    pub name: Option<String>,
    pub active: bool,
    pub subscribed_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn upsert(&self, subscriber: &Subscriber) -> Result<()>;
    async fn deactivate(&self, email: &str) -> Result<bool>;
    async fn list_active(&self) -> Result<Vec<Subscriber>>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub product_name: String,
    pub quantity: u32,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub status: String,
    pub customer_email: Option<String>,
    pub created: DateTime<Utc>,
}

/// Search criteria for recovering a payment reference after the fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentQuery {
    pub amount: i64,
    pub customer_email: String,
    pub created_after: DateTime<Utc>,
    pub created_before: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRefundRequest {
    pub payment_intent_id: String,
    pub amount: i64,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRefund {
    pub refund_id: String,
    pub status: String,
}

/// External payment provider. Amounts are in minor units.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession>;
    async fn get_payment_intent(&self, session_id: &str) -> Result<Option<PaymentIntent>>;
    async fn find_payment_intent(&self, query: &PaymentIntentQuery) -> Result<Option<PaymentIntent>>;
    async fn process_refund(&self, request: &ProviderRefundRequest) -> Result<ProviderRefund>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_content: String,
    pub from_email: String,
    pub from_name: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<()>;
}
