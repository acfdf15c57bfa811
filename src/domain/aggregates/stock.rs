//! Product Stock record
//!
//! Two counters per product: units owned (`stock_count`) and units held by
//! active carts (`reserved_stock`). `reserved_stock <= stock_count` holds
//! after every mutation, and `stock_count - reserved_stock` is what new
//! reservations are admitted against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
    product_id: String,
    stock_count: u32,
    reserved_stock: u32,
    last_updated: DateTime<Utc>,
}

/// A single read-modify-write against a stock record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockMutation {
    /// All-or-nothing hold.
    Reserve(u32),
    /// Hold as many units as are available, up to the given amount.
    ReserveUpTo(u32),
    Release(u32),
    /// Converts a hold into a sale.
    Purchase(u32),
    /// Returns sold units to the sellable pool.
    Restore(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    Insufficient { product_id: String, requested: u32, available: u32 },
}

impl ProductStock {
    pub fn seeded(product_id: impl Into<String>, stock_count: u32) -> Self {
        Self { product_id: product_id.into(), stock_count, reserved_stock: 0, last_updated: Utc::now() }
    }

    /// Rebuilds a persisted record. Out-of-range reservations are clamped.
    pub fn from_parts(product_id: impl Into<String>, stock_count: u32, reserved_stock: u32, last_updated: DateTime<Utc>) -> Self {
        Self { product_id: product_id.into(), stock_count, reserved_stock: reserved_stock.min(stock_count), last_updated }
    }

    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn stock_count(&self) -> u32 { self.stock_count }
    pub fn reserved_stock(&self) -> u32 { self.reserved_stock }
    pub fn last_updated(&self) -> DateTime<Utc> { self.last_updated }
    pub fn available(&self) -> u32 { self.stock_count - self.reserved_stock }

    /// Applies a mutation and returns the number of units it moved.
    pub fn apply(&mut self, mutation: StockMutation) -> Result<u32, StockError> {
        let moved = match mutation {
            StockMutation::Reserve(qty) => {
                if qty > self.available() {
                    return Err(StockError::Insufficient { product_id: self.product_id.clone(), requested: qty, available: self.available() });
                }
                self.reserved_stock += qty;
                qty
            }
            StockMutation::ReserveUpTo(qty) => {
                let granted = qty.min(self.available());
                self.reserved_stock += granted;
                granted
            }
            StockMutation::Release(qty) => {
                let released = qty.min(self.reserved_stock);
                self.reserved_stock -= released;
                released
            }
            StockMutation::Purchase(qty) => {
                let sold = qty.min(self.stock_count);
                self.stock_count -= sold;
                self.reserved_stock = self.reserved_stock.saturating_sub(qty).min(self.stock_count);
                sold
            }
            StockMutation::Restore(qty) => {
                self.stock_count = self.stock_count.saturating_add(qty);
                qty
            }
        };
        self.last_updated = Utc::now();
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reserve_then_purchase() {
        let mut s = ProductStock::seeded("P1", 15);
        assert_eq!(s.apply(StockMutation::Reserve(2)), Ok(2));
        assert_eq!(s.reserved_stock(), 2);
        s.apply(StockMutation::Purchase(2)).unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (13, 0));
    }

    #[test]
    fn test_oversell_rejected_without_mutation() {
        let mut s = ProductStock::from_parts("P1", 5, 5, Utc::now());
        let before = s.clone();
        assert!(matches!(s.apply(StockMutation::Reserve(1)), Err(StockError::Insufficient { available: 0, .. })));
        assert_eq!((s.stock_count(), s.reserved_stock()), (before.stock_count(), before.reserved_stock()));
    }

    #[test]
    fn test_reserve_up_to_clamps() {
        let mut s = ProductStock::from_parts("P1", 10, 7, Utc::now());
        assert_eq!(s.apply(StockMutation::ReserveUpTo(5)), Ok(3));
        assert_eq!(s.available(), 0);
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut s = ProductStock::seeded("P1", 4);
        s.apply(StockMutation::Reserve(1)).unwrap();
        assert_eq!(s.apply(StockMutation::Release(3)), Ok(1));
        assert_eq!(s.reserved_stock(), 0);
    }

    #[test]
    fn test_restore_reverses_purchase_and_leaves_reservations() {
        let mut s = ProductStock::seeded("P1", 10);
        s.apply(StockMutation::Reserve(4)).unwrap();
        s.apply(StockMutation::Purchase(3)).unwrap();
        let reserved = s.reserved_stock();
        s.apply(StockMutation::Restore(3)).unwrap();
        assert_eq!(s.stock_count(), 10);
        assert_eq!(s.reserved_stock(), reserved);
    }

    #[test]
    fn test_double_purchase_is_not_guarded() {
        // The ledger has no per-order memory; order transitions gate the call.
        let mut s = ProductStock::seeded("P1", 10);
        s.apply(StockMutation::Reserve(2)).unwrap();
        s.apply(StockMutation::Purchase(2)).unwrap();
        s.apply(StockMutation::Purchase(2)).unwrap();
        assert_eq!((s.stock_count(), s.reserved_stock()), (6, 0));
    }

    fn mutation() -> impl Strategy<Value = StockMutation> {
        prop_oneof![
            (0u32..20).prop_map(StockMutation::Reserve),
            (0u32..20).prop_map(StockMutation::ReserveUpTo),
            (0u32..20).prop_map(StockMutation::Release),
            (0u32..20).prop_map(StockMutation::Purchase),
        ]
    }

    proptest! {
        #[test]
        fn reserved_never_exceeds_stock(initial in 0u32..50, ops in proptest::collection::vec(mutation(), 0..64)) {
            let mut s = ProductStock::seeded("P", initial);
            for op in ops {
                let before = s.clone();
                match s.apply(op) {
                    Ok(_) => {}
                    Err(_) => {
                        prop_assert_eq!(s.stock_count(), before.stock_count());
                        prop_assert_eq!(s.reserved_stock(), before.reserved_stock());
                    }
                }
                prop_assert!(s.reserved_stock() <= s.stock_count());
            }
        }

        #[test]
        fn reserve_admits_iff_available(stock in 0u32..30, reserved in 0u32..30, qty in 0u32..40) {
            let mut s = ProductStock::from_parts("P", stock, reserved, Utc::now());
            let available = s.available();
            prop_assert_eq!(s.apply(StockMutation::Reserve(qty)).is_ok(), qty <= available);
        }
    }
}
