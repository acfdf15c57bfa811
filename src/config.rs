//! Environment-driven configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::{Result, StorefrontError};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub payment_api_url: Option<String>,
    pub payment_api_key: Option<String>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: String,
    pub email_from_name: String,
    pub app_base_url: String,
    pub default_stock_count: u32,
    pub currency: String,
    pub tenant_id: String,
    pub notification_cache_ttl: Duration,
    pub provider_timeout: Duration,
    pub json_logs: bool,
    /// Users granted `admin` in the in-memory role store.
    pub admin_user_ids: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            nats_url: None,
            payment_api_url: None,
            payment_api_key: None,
            email_api_url: None,
            email_api_key: None,
            email_from: "noreply@quibble.shop".to_string(),
            email_from_name: "Quibble".to_string(),
            app_base_url: "http://localhost:8083".to_string(),
            default_stock_count: 15,
            currency: "USD".to_string(),
            tenant_id: "default".to_string(),
            notification_cache_ttl: Duration::from_secs(30),
            provider_timeout: Duration::from_secs(30),
            json_logs: false,
            admin_user_ids: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let opt = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse(&lookup, "PORT", defaults.port)?;
        let app_base_url = opt("APP_BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}"));

        Ok(Self {
            port,
            database_url: opt("DATABASE_URL"),
            nats_url: opt("NATS_URL"),
            payment_api_url: opt("PAYMENT_API_URL"),
            payment_api_key: opt("PAYMENT_API_KEY"),
            email_api_url: opt("EMAIL_API_URL"),
            email_api_key: opt("EMAIL_API_KEY"),
            email_from: opt("EMAIL_FROM").unwrap_or(defaults.email_from),
            email_from_name: opt("EMAIL_FROM_NAME").unwrap_or(defaults.email_from_name),
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
            default_stock_count: parse(&lookup, "DEFAULT_STOCK_COUNT", defaults.default_stock_count)?,
            currency: opt("CURRENCY").map(|c| c.to_uppercase()).unwrap_or(defaults.currency),
            tenant_id: opt("TENANT_ID").unwrap_or(defaults.tenant_id),
            notification_cache_ttl: Duration::from_secs(parse(&lookup, "NOTIFICATION_CACHE_TTL_SECS", 30u64)?),
            provider_timeout: Duration::from_secs(parse(&lookup, "PROVIDER_TIMEOUT_SECS", 30u64)?),
            json_logs: opt("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            admin_user_ids: opt("ADMIN_USER_IDS")
                .map(|ids| ids.split(',').map(str::trim).filter(|id| !id.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| StorefrontError::Config(format!("Invalid {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c.port, 8083);
        assert_eq!(c.default_stock_count, 15);
        assert_eq!(c.app_base_url, "http://localhost:8083");
        assert!(c.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let c = AppConfig::from_lookup(lookup(&[("PORT", "9000"), ("DEFAULT_STOCK_COUNT", "40"), ("CURRENCY", "ngn"), ("DATABASE_URL", " ")])).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.app_base_url, "http://localhost:9000");
        assert_eq!(c.default_stock_count, 40);
        assert_eq!(c.currency, "NGN");
        assert!(c.database_url.is_none());
    }

    #[test]
    fn test_admin_ids_are_split() {
        let c = AppConfig::from_lookup(lookup(&[("ADMIN_USER_IDS", "ops, alice,,")])).unwrap();
        assert_eq!(c.admin_user_ids, vec!["ops", "alice"]);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, StorefrontError::Config(m) if m.contains("PORT")));
    }
}
