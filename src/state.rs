//! Backend selection and the shared application state.

use std::sync::Arc;
use tracing::{info, warn};

use crate::application::{
    AccessControl, EventDispatcher, MarketingService, NotificationCountCache, NotificationService, OrderService, PaymentBridge,
    RefundWorkflow, StockLedger, TrackingService,
};
use crate::config::AppConfig;
use crate::domain::ports::{
    EmailProvider, EventPublisher, NotificationRepository, OrderRepository, PaymentProvider, Role, RoleStore, StockRepository,
    SubscriberRepository,
};
use crate::infrastructure::http_providers::{HttpEmailProvider, HttpPaymentProvider, HttpProviderConfig};
use crate::infrastructure::memory::{
    MemoryNotificationRepository, MemoryOrderRepository, MemoryRoleStore, MemoryStockRepository, MemorySubscriberRepository,
};
use crate::infrastructure::nats::NatsPublisher;
use crate::infrastructure::postgres::PgStore;
use crate::infrastructure::sandbox::{SandboxEmailProvider, SandboxPaymentProvider};
use crate::Result;

/// Concrete adapters behind every port.
#[derive(Clone)]
pub struct Backends {
    pub stock: Arc<dyn StockRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub subscribers: Arc<dyn SubscriberRepository>,
    pub roles: Arc<dyn RoleStore>,
    pub payments: Arc<dyn PaymentProvider>,
    pub email: Arc<dyn EmailProvider>,
    pub publisher: Option<Arc<dyn EventPublisher>>,
}

impl Backends {
    /// In-memory stores with sandbox providers; nothing leaves the process.
    pub fn in_memory_with_roles(roles: Arc<MemoryRoleStore>) -> Self {
        Self {
            stock: Arc::new(MemoryStockRepository::new()),
            orders: Arc::new(MemoryOrderRepository::new()),
            notifications: Arc::new(MemoryNotificationRepository::new()),
            subscribers: Arc::new(MemorySubscriberRepository::new()),
            roles,
            payments: Arc::new(SandboxPaymentProvider::new()),
            email: Arc::new(SandboxEmailProvider::new()),
            publisher: None,
        }
    }

    pub fn postgres(store: Arc<PgStore>) -> Self {
        Self {
            stock: store.clone(),
            orders: store.clone(),
            notifications: store.clone(),
            subscribers: store.clone(),
            roles: store,
            payments: Arc::new(SandboxPaymentProvider::new()),
            email: Arc::new(SandboxEmailProvider::new()),
            publisher: None,
        }
    }

    /// Picks each adapter from configuration: Postgres when `DATABASE_URL` is
    /// set, HTTP providers when their URLs are set, NATS when reachable.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let mut backends = match &config.database_url {
            Some(url) => Self::postgres(Arc::new(PgStore::connect(url).await?)),
            None => {
                warn!("DATABASE_URL not set, using in-memory stores");
                let roles = Arc::new(MemoryRoleStore::new());
                for admin in &config.admin_user_ids { roles.grant(admin.clone(), vec![Role::Admin]); }
                Self::in_memory_with_roles(roles)
            }
        };

        match &config.payment_api_url {
            Some(url) => {
                let http = HttpProviderConfig::new(url.clone()).with_api_key(config.payment_api_key.clone()).with_timeout(config.provider_timeout);
                backends.payments = Arc::new(HttpPaymentProvider::new(http)?);
                info!(%url, "Using HTTP payment provider");
            }
            None => warn!("PAYMENT_API_URL not set, using sandbox payments"),
        }
        match &config.email_api_url {
            Some(url) => {
                let http = HttpProviderConfig::new(url.clone()).with_api_key(config.email_api_key.clone()).with_timeout(config.provider_timeout);
                backends.email = Arc::new(HttpEmailProvider::new(http)?);
                info!(%url, "Using HTTP email provider");
            }
            None => warn!("EMAIL_API_URL not set, using sandbox email"),
        }
        if let Some(url) = &config.nats_url {
            match NatsPublisher::connect(url).await {
                Ok(publisher) => backends.publisher = Some(Arc::new(publisher)),
                Err(e) => warn!(error = %e, "Order events will not be published"),
            }
        }
        Ok(backends)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ledger: StockLedger,
    pub orders: OrderService,
    pub checkout: PaymentBridge,
    pub refunds: RefundWorkflow,
    pub tracking: TrackingService,
    pub notifications: NotificationService,
    pub marketing: MarketingService,
}

impl AppState {
    pub fn new(config: AppConfig, backends: Backends) -> Self {
        let access = AccessControl::new(backends.roles);
        let ledger = StockLedger::new(backends.stock, config.default_stock_count);
        let notifications = NotificationService::new(
            backends.notifications,
            Arc::new(NotificationCountCache::new(config.notification_cache_ttl)),
            config.tenant_id.clone(),
        );
        let dispatcher = EventDispatcher::new(notifications.clone(), backends.publisher);
        let orders = OrderService::new(backends.orders, ledger.clone(), access.clone(), dispatcher);
        let checkout = PaymentBridge::new(orders.clone(), backends.payments.clone(), config.app_base_url.clone());
        let refunds = RefundWorkflow::new(orders.clone(), backends.payments);
        let tracking = TrackingService::new(orders.clone());
        let marketing = MarketingService::new(backends.subscribers, backends.email, access, config.email_from.clone(), config.email_from_name.clone());
        Self { config: Arc::new(config), ledger, orders, checkout, refunds, tracking, notifications, marketing }
    }
}
