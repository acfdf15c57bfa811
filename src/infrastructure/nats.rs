//! Order events on NATS.

use async_trait::async_trait;

use crate::domain::events::OrderEvent;
use crate::domain::ports::EventPublisher;
use crate::{Result, StorefrontError};

pub const SUBJECT_PREFIX: &str = "quibble.orders";

pub struct NatsPublisher { client: async_nats::Client }

impl NatsPublisher {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url).await.map_err(|e| StorefrontError::Config(format!("NATS connect failed: {e}")))?;
        tracing::info!(%url, "Connected to NATS");
        Ok(Self { client })
    }
}

pub fn subject_for(event: &OrderEvent) -> String { format!("{SUBJECT_PREFIX}.{}", event.name()) }

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(subject_for(event), payload.into())
            .await
            .map_err(|e| StorefrontError::Storage(format!("NATS publish failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_uses_event_name() {
        let e = OrderEvent::Delivered { order_id: "o".into(), user_id: "u".into(), product_name: "p".into() };
        assert_eq!(subject_for(&e), "quibble.orders.delivered");
    }
}
