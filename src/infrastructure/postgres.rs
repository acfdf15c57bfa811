//! Postgres-backed collections.
//!
//! Orders and notifications are stored as JSONB documents with a few
//! columns lifted out for filtering. Stock mutations lock the product row
//! for the duration of the read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::aggregates::{Notification, Order, ProductStock, StockMutation};
use crate::domain::ports::{
    NotificationRepository, OrderRepository, Role, RoleStore, StockRepository, StockUpdate, Subscriber, SubscriberRepository,
};
use crate::domain::value_objects::OrderId;
use crate::Result;

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Connected to Postgres and applied migrations");
        Ok(Self { pool })
    }
}

#[derive(sqlx::FromRow)]
struct StockRow { product_id: String, stock_count: i64, reserved_stock: i64, last_updated: DateTime<Utc> }

impl StockRow {
    fn into_stock(self) -> ProductStock {
        ProductStock::from_parts(self.product_id, to_u32(self.stock_count), to_u32(self.reserved_stock), self.last_updated)
    }
}

fn to_u32(v: i64) -> u32 { v.clamp(0, u32::MAX as i64) as u32 }

const SEED_STOCK: &str = "INSERT INTO product_stock (product_id, stock_count, reserved_stock, last_updated) VALUES ($1, $2, 0, NOW()) ON CONFLICT (product_id) DO NOTHING";

#[async_trait]
impl StockRepository for PgStore {
    async fn get_or_seed(&self, product_id: &str, default_stock: u32) -> Result<ProductStock> {
        sqlx::query(SEED_STOCK).bind(product_id).bind(default_stock as i64).execute(&self.pool).await?;
        let row = sqlx::query_as::<_, StockRow>("SELECT product_id, stock_count, reserved_stock, last_updated FROM product_stock WHERE product_id = $1")
            .bind(product_id).fetch_one(&self.pool).await?;
        Ok(row.into_stock())
    }

    async fn apply(&self, product_id: &str, default_stock: u32, mutation: StockMutation) -> Result<StockUpdate> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(SEED_STOCK).bind(product_id).bind(default_stock as i64).execute(&mut *tx).await?;
        let row = sqlx::query_as::<_, StockRow>("SELECT product_id, stock_count, reserved_stock, last_updated FROM product_stock WHERE product_id = $1 FOR UPDATE")
            .bind(product_id).fetch_one(&mut *tx).await?;
        let mut stock = row.into_stock();
        // Dropping the transaction on a rejected mutation rolls it back.
        let moved = stock.apply(mutation)?;
        sqlx::query("UPDATE product_stock SET stock_count = $2, reserved_stock = $3, last_updated = $4 WHERE product_id = $1")
            .bind(product_id).bind(stock.stock_count() as i64).bind(stock.reserved_stock() as i64).bind(stock.last_updated())
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(StockUpdate { stock, moved })
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, (Json<Order>,)>("SELECT document FROM orders WHERE id = $1")
            .bind(id.as_str()).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(order),)| order))
    }

    async fn upsert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, user_id, status, document, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, document = EXCLUDED.document, updated_at = EXCLUDED.updated_at",
        )
        .bind(order.id().as_str()).bind(order.user_id()).bind(order.status().to_string()).bind(Json(order))
        .bind(order.created_at()).bind(order.updated_at())
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, (Json<Order>,)>("SELECT document FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(order),)| order).collect())
    }
}

fn with_read_flag((Json(mut n), read): (Json<Notification>, bool)) -> Notification {
    n.read = read;
    n
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        sqlx::query("INSERT INTO notifications (id, user_id, read, document, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(notification.id).bind(&notification.user_id).bind(notification.read).bind(Json(notification)).bind(notification.created_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query_as::<_, (Json<Notification>, bool)>("SELECT document, read FROM notifications WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(with_read_flag))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, (Json<Notification>, bool)>("SELECT document, read FROM notifications WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(with_read_flag).collect())
    }

    async fn ids_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM notifications WHERE user_id = $1 AND (NOT $2 OR read = FALSE)")
            .bind(user_id).bind(unread_only).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE")
            .bind(user_id).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn set_read(&self, ids: &[Uuid], read: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE notifications SET read = $2 WHERE id = ANY($1)").bind(ids).bind(read).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM notifications WHERE id = ANY($1)").bind(ids).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn roles(&self, user_id: &str) -> Result<Option<Vec<Role>>> {
        let row = sqlx::query_as::<_, (Vec<String>,)>("SELECT roles FROM user_roles WHERE user_id = $1")
            .bind(user_id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(tags,)| tags.iter().filter_map(|t| Role::from_tag(t)).collect()))
    }
}

#[derive(sqlx::FromRow)]
struct SubscriberRow { email: String, name: Option<String>, active: bool, subscribed_at: DateTime<Utc> }

#[async_trait]
impl SubscriberRepository for PgStore {
    async fn upsert(&self, subscriber: &Subscriber) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscribers (email, name, active, subscribed_at) VALUES (LOWER($1), $2, $3, $4) \
             ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, active = EXCLUDED.active",
        )
        .bind(&subscriber.email).bind(&subscriber.name).bind(subscriber.active).bind(subscriber.subscribed_at)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn deactivate(&self, email: &str) -> Result<bool> {
        let done = sqlx::query("UPDATE subscribers SET active = FALSE WHERE email = LOWER($1) AND active")
            .bind(email).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, SubscriberRow>("SELECT email, name, active, subscribed_at FROM subscribers WHERE active ORDER BY email")
            .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| Subscriber { email: r.email, name: r.name, active: r.active, subscribed_at: r.subscribed_at }).collect())
    }
}
