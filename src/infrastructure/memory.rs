//! In-process document collections.
//!
//! Each collection sits behind its own lock, so a stock mutation is atomic
//! per product the same way a document-store transaction is per document.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::aggregates::{Notification, Order, ProductStock, StockMutation};
use crate::domain::ports::{
    NotificationRepository, OrderRepository, Role, RoleStore, StockRepository, StockUpdate, Subscriber, SubscriberRepository,
};
use crate::domain::value_objects::OrderId;
use crate::Result;

#[derive(Default)]
pub struct MemoryStockRepository { records: RwLock<HashMap<String, ProductStock>> }

impl MemoryStockRepository {
    pub fn new() -> Self { Self::default() }

    /// Installs a record directly, replacing any existing one.
    pub fn put(&self, stock: ProductStock) { self.records.write().insert(stock.product_id().to_string(), stock); }
}

#[async_trait]
impl StockRepository for MemoryStockRepository {
    async fn get_or_seed(&self, product_id: &str, default_stock: u32) -> Result<ProductStock> {
        if let Some(stock) = self.records.read().get(product_id) { return Ok(stock.clone()); }
        let mut records = self.records.write();
        Ok(records.entry(product_id.to_string()).or_insert_with(|| ProductStock::seeded(product_id, default_stock)).clone())
    }

    async fn apply(&self, product_id: &str, default_stock: u32, mutation: StockMutation) -> Result<StockUpdate> {
        let mut records = self.records.write();
        let current = records.entry(product_id.to_string()).or_insert_with(|| ProductStock::seeded(product_id, default_stock));
        let mut next = current.clone();
        let moved = next.apply(mutation)?;
        *current = next.clone();
        Ok(StockUpdate { stock: next, moved })
    }
}

#[derive(Default)]
pub struct MemoryOrderRepository { orders: RwLock<HashMap<OrderId, Order>> }

impl MemoryOrderRepository { pub fn new() -> Self { Self::default() } }

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>> { Ok(self.orders.read().get(id).cloned()) }

    async fn upsert(&self, order: &Order) -> Result<()> {
        self.orders.write().insert(order.id().clone(), order.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.read().values().filter(|o| o.user_id() == user_id).cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }
}

#[derive(Default)]
pub struct MemoryNotificationRepository { notifications: RwLock<HashMap<Uuid, Notification>> }

impl MemoryNotificationRepository { pub fn new() -> Self { Self::default() } }

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        self.notifications.write().insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> { Ok(self.notifications.read().get(&id).cloned()) }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut list: Vec<Notification> = self.notifications.read().values().filter(|n| n.user_id == user_id).cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn ids_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Uuid>> {
        Ok(self.notifications.read().values().filter(|n| n.user_id == user_id && (!unread_only || !n.read)).map(|n| n.id).collect())
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64> {
        Ok(self.notifications.read().values().filter(|n| n.user_id == user_id && !n.read).count() as u64)
    }

    async fn set_read(&self, ids: &[Uuid], read: bool) -> Result<()> {
        let mut map = self.notifications.write();
        for id in ids { if let Some(n) = map.get_mut(id) { n.read = read; } }
        Ok(())
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        let mut map = self.notifications.write();
        for id in ids { map.remove(id); }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRoleStore { roles: RwLock<HashMap<String, Vec<Role>>> }

impl MemoryRoleStore {
    pub fn new() -> Self { Self::default() }
    pub fn grant(&self, user_id: impl Into<String>, roles: Vec<Role>) { self.roles.write().insert(user_id.into(), roles); }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn roles(&self, user_id: &str) -> Result<Option<Vec<Role>>> { Ok(self.roles.read().get(user_id).cloned()) }
}

#[derive(Default)]
pub struct MemorySubscriberRepository { subscribers: RwLock<HashMap<String, Subscriber>> }

impl MemorySubscriberRepository { pub fn new() -> Self { Self::default() } }

#[async_trait]
impl SubscriberRepository for MemorySubscriberRepository {
    async fn upsert(&self, subscriber: &Subscriber) -> Result<()> {
        self.subscribers.write().insert(subscriber.email.to_lowercase(), subscriber.clone());
        Ok(())
    }

    async fn deactivate(&self, email: &str) -> Result<bool> {
        match self.subscribers.write().get_mut(&email.to_lowercase()) {
            Some(s) if s.active => { s.active = false; Ok(true) }
            _ => Ok(false),
        }
    }

    async fn list_active(&self) -> Result<Vec<Subscriber>> {
        let mut list: Vec<Subscriber> = self.subscribers.read().values().filter(|s| s.active).cloned().collect();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_read_seeds_default() {
        let repo = MemoryStockRepository::new();
        let s = repo.get_or_seed("P1", 15).await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (15, 0));
        repo.apply("P1", 15, StockMutation::Reserve(3)).await.unwrap();
        assert_eq!(repo.get_or_seed("P1", 99).await.unwrap().reserved_stock(), 3);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_record_untouched() {
        let repo = MemoryStockRepository::new();
        repo.put(ProductStock::seeded("P1", 1));
        assert!(repo.apply("P1", 15, StockMutation::Reserve(2)).await.is_err());
        assert_eq!(repo.get_or_seed("P1", 15).await.unwrap().reserved_stock(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_deactivation() {
        let repo = MemorySubscriberRepository::new();
        repo.upsert(&Subscriber { email: "A@x.io".into(), name: None, active: true, subscribed_at: chrono::Utc::now() }).await.unwrap();
        assert!(repo.deactivate("a@x.io").await.unwrap());
        assert!(!repo.deactivate("a@x.io").await.unwrap());
        assert!(repo.list_active().await.unwrap().is_empty());
    }
}
