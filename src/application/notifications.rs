//! Notifications
//!
//! [`EventDispatcher`] turns order events into notification records and bus
//! messages after the order write has committed. Its failures are logged
//! and never reach the transition that produced the events.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::Notification;
use crate::domain::events::OrderEvent;
use crate::domain::ports::{EventPublisher, NotificationRepository};
use crate::{Result, StorefrontError};

/// Per-transaction operation ceiling of the backing store.
pub const BATCH_LIMIT: usize = 500;

/// Unread-count cache keyed by `(tenant_id, user_id)`.
pub struct NotificationCountCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), (u64, Instant)>>,
}

impl NotificationCountCache {
    pub fn new(ttl: Duration) -> Self { Self { ttl, entries: Mutex::new(HashMap::new()) } }

    pub fn get(&self, tenant_id: &str, user_id: &str) -> Option<u64> {
        let mut entries = self.entries.lock();
        let key = (tenant_id.to_string(), user_id.to_string());
        match entries.get(&key) {
            Some((count, at)) if at.elapsed() < self.ttl => Some(*count),
            Some(_) => { entries.remove(&key); None }
            None => None,
        }
    }

    /// Stores a fresh count, dropping every entry that has outlived the TTL.
    pub fn put(&self, tenant_id: &str, user_id: &str, count: u64) {
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, at)| at.elapsed() < self.ttl);
        entries.insert((tenant_id.to_string(), user_id.to_string()), (count, Instant::now()));
    }

    pub fn invalidate(&self, tenant_id: &str, user_id: &str) {
        self.entries.lock().remove(&(tenant_id.to_string(), user_id.to_string()));
    }
}

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    cache: Arc<NotificationCountCache>,
    tenant_id: String,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, cache: Arc<NotificationCountCache>, tenant_id: impl Into<String>) -> Self {
        Self { repo, cache, tenant_id: tenant_id.into() }
    }

    pub async fn create(&self, notification: &Notification) -> Result<()> {
        self.repo.insert(notification).await?;
        self.cache.invalidate(&self.tenant_id, &notification.user_id);
        Ok(())
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Notification>> { self.repo.list_for_user(user_id).await }

    pub async fn unread_count(&self, user_id: &str) -> Result<u64> {
        if let Some(count) = self.cache.get(&self.tenant_id, user_id) { return Ok(count); }
        let count = self.repo.count_unread(user_id).await?;
        self.cache.put(&self.tenant_id, user_id, count);
        Ok(count)
    }

    /// Sets the read flag on one of the caller's notifications.
    pub async fn set_read(&self, user_id: &str, id: Uuid, read: bool) -> Result<Notification> {
        let mut n = self.owned(user_id, id).await?;
        self.repo.set_read(&[id], read).await?;
        self.cache.invalidate(&self.tenant_id, user_id);
        n.read = read;
        Ok(n)
    }

    pub async fn delete(&self, user_id: &str, id: Uuid) -> Result<()> {
        self.owned(user_id, id).await?;
        self.repo.delete(&[id]).await?;
        self.cache.invalidate(&self.tenant_id, user_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        let ids = self.repo.ids_for_user(user_id, true).await?;
        let result = self.in_batches(&ids, |chunk| self.repo.set_read(chunk, true)).await;
        self.cache.invalidate(&self.tenant_id, user_id);
        result.map(|_| ids.len())
    }

    #[instrument(skip(self))]
    pub async fn delete_all(&self, user_id: &str) -> Result<usize> {
        let ids = self.repo.ids_for_user(user_id, false).await?;
        let result = self.in_batches(&ids, |chunk| self.repo.delete(chunk)).await;
        self.cache.invalidate(&self.tenant_id, user_id);
        result.map(|_| ids.len())
    }

    /// Commits one batch at a time, stopping at the first failed batch.
    async fn in_batches<'a, F, Fut>(&self, ids: &'a [Uuid], op: F) -> Result<()>
    where
        F: Fn(&'a [Uuid]) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        for (n, chunk) in ids.chunks(BATCH_LIMIT).enumerate() {
            op(chunk).await?;
            debug!(batch = n, size = chunk.len(), "Notification batch committed");
        }
        Ok(())
    }

    async fn owned(&self, user_id: &str, id: Uuid) -> Result<Notification> {
        match self.repo.get(id).await? {
            Some(n) if n.user_id == user_id => Ok(n),
            _ => Err(StorefrontError::NotificationNotFound(id.to_string())),
        }
    }
}

/// Performs the side effects of order transitions.
#[derive(Clone)]
pub struct EventDispatcher {
    notifications: NotificationService,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl EventDispatcher {
    pub fn new(notifications: NotificationService, publisher: Option<Arc<dyn EventPublisher>>) -> Self { Self { notifications, publisher } }

    pub async fn dispatch(&self, events: Vec<OrderEvent>) {
        for event in events {
            if let Some(n) = Notification::from_event(&event) {
                if let Err(e) = self.notifications.create(&n).await {
                    warn!(order_id = %event.order_id(), event = event.name(), error = %e, "Notification write failed");
                }
            }
            if let Some(publisher) = &self.publisher {
                if let Err(e) = publisher.publish(&event).await {
                    warn!(order_id = %event.order_id(), event = event.name(), error = %e, "Event publish failed");
                }
            }
        }
    }
}
