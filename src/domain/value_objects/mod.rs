//! Value Objects for the storefront core

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix carried by ids minted at checkout for orders that do not exist yet.
pub const NEW_ORDER_PREFIX: &str = "new_";

/// Order identifier.
///
/// Checkout flows mint `new_`-prefixed ids on the client side of the payment
/// redirect; the document is only written once payment succeeds. Legacy
/// flows get a server-assigned UUID and the document exists up front.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn parse(value: impl Into<String>) -> Result<Self, OrderIdError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(OrderIdError::Empty); }
        if value.len() > 128 { return Err(OrderIdError::TooLong); }
        Ok(Self(value))
    }
    pub fn new_checkout() -> Self { Self(format!("{NEW_ORDER_PREFIX}{}", Uuid::now_v7().simple())) }
    pub fn assigned() -> Self { Self(Uuid::now_v7().to_string()) }
    pub fn is_new_checkout(&self) -> bool { self.0.starts_with(NEW_ORDER_PREFIX) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderIdError {
    #[error("order id is empty")]
    Empty,
    #[error("order id is too long")]
    TooLong,
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, "USD") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_positive(&self) -> bool { self.amount > Decimal::ZERO }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// Amount in minor units (cents), the unit payment providers charge in.
    pub fn minor_units(&self) -> Result<i64, MoneyError> {
        (self.amount * Decimal::ONE_HUNDRED).round().to_i64().ok_or(MoneyError::OutOfRange)
    }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount.round_dp(2), self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("currency mismatch")]
    CurrencyMismatch,
    #[error("amount out of range")]
    OutOfRange,
}

/// The shopper an order belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

/// Delivery address captured at checkout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub full_name: String,
    pub street1: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub zip: String,
    pub country: String,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_order_id_prefix() {
        assert!(OrderId::new_checkout().is_new_checkout());
        assert!(!OrderId::assigned().is_new_checkout());
        assert_eq!(OrderId::parse("  "), Err(OrderIdError::Empty));
    }
    #[test]
    fn test_money_add() {
        let a = Money::usd(Decimal::new(100, 0));
        let b = Money::usd(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.add(&Money::zero("EUR")), Err(MoneyError::CurrencyMismatch));
    }
    #[test]
    fn test_minor_units() {
        assert_eq!(Money::usd(Decimal::new(1999, 2)).minor_units().unwrap(), 1999);
        assert_eq!(Money::usd(Decimal::new(5, 0)).multiply(3).minor_units().unwrap(), 1500);
    }
}
