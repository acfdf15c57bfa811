//! Stock Ledger
//!
//! Per-product owned/reserved counters. Reads and writes degrade to a safe
//! default (zero units, `false`, no-op) on store failures and log the
//! error instead of propagating it.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::domain::aggregates::{ProductStock, StockMutation};
use crate::domain::ports::StockRepository;
use crate::StorefrontError;

#[derive(Clone)]
pub struct StockLedger {
    repo: Arc<dyn StockRepository>,
    default_stock: u32,
}

/// Outcome of a clamped reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub requested: u32,
    pub granted: u32,
    pub available: u32,
}

impl Reservation {
    pub fn is_partial(&self) -> bool { self.granted < self.requested }
}

impl StockLedger {
    pub fn new(repo: Arc<dyn StockRepository>, default_stock: u32) -> Self { Self { repo, default_stock } }

    /// Units owned; seeds the record with the default on first read.
    #[instrument(skip(self))]
    pub async fn get_stock(&self, product_id: &str) -> u32 {
        self.snapshot(product_id).await.map(|s| s.stock_count()).unwrap_or(0)
    }

    pub async fn snapshot(&self, product_id: &str) -> Option<ProductStock> {
        match self.repo.get_or_seed(product_id, self.default_stock).await {
            Ok(stock) => Some(stock),
            Err(e) => {
                error!(%product_id, error = %e, "Stock read failed");
                None
            }
        }
    }

    pub async fn available(&self, product_id: &str) -> u32 {
        self.snapshot(product_id).await.map(|s| s.available()).unwrap_or(0)
    }

    /// All-or-nothing hold of `qty` units.
    #[instrument(skip(self))]
    pub async fn reserve(&self, product_id: &str, qty: u32) -> bool {
        match self.repo.apply(product_id, self.default_stock, StockMutation::Reserve(qty)).await {
            Ok(update) => {
                info!(reserved = update.stock.reserved_stock(), "Stock reserved");
                true
            }
            Err(StorefrontError::InsufficientStock { available, .. }) => {
                warn!(available, "Reservation refused");
                false
            }
            Err(e) => {
                error!(error = %e, "Reservation failed");
                false
            }
        }
    }

    /// Holds as many of `qty` units as are available.
    #[instrument(skip(self))]
    pub async fn reserve_up_to(&self, product_id: &str, qty: u32) -> Reservation {
        match self.repo.apply(product_id, self.default_stock, StockMutation::ReserveUpTo(qty)).await {
            Ok(update) => {
                if update.moved < qty { warn!(granted = update.moved, "Reservation clamped to available stock"); }
                Reservation { requested: qty, granted: update.moved, available: update.stock.available() }
            }
            Err(e) => {
                error!(error = %e, "Reservation failed");
                Reservation { requested: qty, granted: 0, available: 0 }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn release(&self, product_id: &str, qty: u32) { self.write(product_id, StockMutation::Release(qty)).await; }

    /// Converts a reservation into a sale. Callers gate this on the order's
    /// payment transition; the ledger itself does not deduplicate.
    #[instrument(skip(self))]
    pub async fn purchase(&self, product_id: &str, qty: u32) { self.write(product_id, StockMutation::Purchase(qty)).await; }

    /// Returns sold units to the sellable pool. Reservations are untouched.
    #[instrument(skip(self))]
    pub async fn restore(&self, product_id: &str, qty: u32) { self.write(product_id, StockMutation::Restore(qty)).await; }

    async fn write(&self, product_id: &str, mutation: StockMutation) {
        match self.repo.apply(product_id, self.default_stock, mutation).await {
            Ok(update) => info!(stock = update.stock.stock_count(), reserved = update.stock.reserved_stock(), moved = update.moved, "Stock updated"),
            Err(e) => error!(?mutation, error = %e, "Stock update failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::StockUpdate;
    use crate::infrastructure::memory::MemoryStockRepository;
    use async_trait::async_trait;
    use chrono::Utc;

    fn ledger_with(stock: ProductStock) -> (StockLedger, Arc<MemoryStockRepository>) {
        let repo = Arc::new(MemoryStockRepository::new());
        repo.put(stock);
        (StockLedger::new(repo.clone(), 15), repo)
    }

    #[tokio::test]
    async fn test_get_stock_seeds_default() {
        let ledger = StockLedger::new(Arc::new(MemoryStockRepository::new()), 15);
        assert_eq!(ledger.get_stock("fresh").await, 15);
        assert_eq!(ledger.available("fresh").await, 15);
    }

    #[tokio::test]
    async fn test_happy_path_purchase() {
        let (ledger, _) = ledger_with(ProductStock::seeded("P1", 15));
        assert!(ledger.reserve("P1", 2).await);
        assert_eq!(ledger.snapshot("P1").await.unwrap().reserved_stock(), 2);
        ledger.purchase("P1", 2).await;
        let s = ledger.snapshot("P1").await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (13, 0));
    }

    #[tokio::test]
    async fn test_oversell_rejection() {
        let (ledger, _) = ledger_with(ProductStock::from_parts("P1", 5, 5, Utc::now()));
        assert!(!ledger.reserve("P1", 1).await);
        let s = ledger.snapshot("P1").await.unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (5, 5));
    }

    #[tokio::test]
    async fn test_reserve_up_to_reports_clamp() {
        let (ledger, _) = ledger_with(ProductStock::from_parts("P1", 5, 3, Utc::now()));
        let r = ledger.reserve_up_to("P1", 4).await;
        assert_eq!(r, Reservation { requested: 4, granted: 2, available: 0 });
        assert!(r.is_partial());
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let (ledger, _) = ledger_with(ProductStock::seeded("P1", 10));
        ledger.reserve("P1", 1).await;
        ledger.purchase("P1", 3).await;
        ledger.restore("P1", 3).await;
        let s = ledger.snapshot("P1").await.unwrap();
        assert_eq!(s.stock_count(), 10);
        assert_eq!(s.reserved_stock(), 0);
    }

    struct BrokenStore;

    #[async_trait]
    impl StockRepository for BrokenStore {
        async fn get_or_seed(&self, _: &str, _: u32) -> crate::Result<ProductStock> { Err(StorefrontError::Storage("offline".into())) }
        async fn apply(&self, _: &str, _: u32, _: StockMutation) -> crate::Result<StockUpdate> { Err(StorefrontError::Storage("offline".into())) }
    }

    #[tokio::test]
    async fn test_store_failures_degrade_to_safe_defaults() {
        let ledger = StockLedger::new(Arc::new(BrokenStore), 15);
        assert_eq!(ledger.get_stock("P1").await, 0);
        assert!(!ledger.reserve("P1", 1).await);
        assert_eq!(ledger.reserve_up_to("P1", 3).await.granted, 0);
        ledger.release("P1", 1).await;
        ledger.purchase("P1", 1).await;
        ledger.restore("P1", 1).await;
    }
}
