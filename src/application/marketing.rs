//! Email marketing: subscriber list and campaign sends.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::access::AccessControl;
use crate::domain::ports::{EmailMessage, EmailProvider, Subscriber, SubscriberRepository};
use crate::{Result, StorefrontError};

const NAME_PLACEHOLDER: &str = "{{name}}";
const FALLBACK_NAME: &str = "there";

#[derive(Clone, Debug)]
pub struct Campaign {
    pub subject: String,
    pub html_content: String,
}

/// Aggregate outcome of a campaign; individual failures never abort the send.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct MarketingService {
    subscribers: Arc<dyn SubscriberRepository>,
    email: Arc<dyn EmailProvider>,
    access: AccessControl,
    from_email: String,
    from_name: String,
}

impl MarketingService {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        email: Arc<dyn EmailProvider>,
        access: AccessControl,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self { subscribers, email, access, from_email: from_email.into(), from_name: from_name.into() }
    }

    pub async fn subscribe(&self, email: &str, name: Option<String>) -> Result<Subscriber> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') { return Err(StorefrontError::Validation(format!("'{email}' is not an email address"))); }
        let subscriber = Subscriber { email, name: name.filter(|n| !n.trim().is_empty()), active: true, subscribed_at: Utc::now() };
        self.subscribers.upsert(&subscriber).await?;
        info!(email = %subscriber.email, "Subscribed");
        Ok(subscriber)
    }

    /// Returns whether an active subscription was found.
    pub async fn unsubscribe(&self, email: &str) -> Result<bool> { self.subscribers.deactivate(&email.trim().to_lowercase()).await }

    pub async fn list_active(&self, actor: &str) -> Result<Vec<Subscriber>> {
        self.access.require_admin(actor).await?;
        self.subscribers.list_active().await
    }

    #[instrument(skip(self, campaign), fields(subject = %campaign.subject))]
    pub async fn send_campaign(&self, actor: &str, campaign: &Campaign) -> Result<CampaignReport> {
        self.access.require_admin(actor).await?;
        let mut report = CampaignReport::default();
        for subscriber in self.subscribers.list_active().await? {
            let message = EmailMessage {
                to: subscriber.email.clone(),
                subject: campaign.subject.clone(),
                html_content: personalise(&campaign.html_content, subscriber.name.as_deref()),
                from_email: self.from_email.clone(),
                from_name: self.from_name.clone(),
            };
            match self.email.send(&message).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(to = %subscriber.email, error = %e, "Campaign email failed");
                    report.failed += 1;
                }
            }
        }
        info!(sent = report.sent, failed = report.failed, "Campaign sent");
        Ok(report)
    }
}

fn personalise(template: &str, name: Option<&str>) -> String { template.replace(NAME_PLACEHOLDER, name.unwrap_or(FALLBACK_NAME)) }
