//! JSON-over-HTTP clients for the payment and email providers.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::ports::{
    CheckoutSession, CheckoutSessionRequest, EmailMessage, EmailProvider, PaymentIntent, PaymentIntentQuery, PaymentProvider,
    ProviderRefund, ProviderRefundRequest,
};
use crate::{Result, StorefrontError};

/// Endpoint plus credentials shared by both provider clients.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), api_key: None, timeout: Duration::from_secs(30) }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self) -> std::result::Result<Client, reqwest::Error> { Client::builder().timeout(self.timeout).build() }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

pub struct HttpPaymentProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpPaymentProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = config.client().map_err(payment_error)?;
        Ok(Self { client, config })
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}/{path}", self.config.base_url);
        debug!(%url, "payment provider request");
        let response = self.config.authorize(self.client.post(&url)).json(body).send().await.map_err(payment_error)?;
        response.error_for_status().map_err(payment_error)?.json::<T>().await.map_err(payment_error)
    }
}

fn payment_error(err: reqwest::Error) -> StorefrontError { StorefrontError::Payment(err.to_string()) }

#[derive(serde::Deserialize)]
struct IntentEnvelope { #[serde(rename = "paymentIntent")] payment_intent: Option<PaymentIntent> }

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        self.post("create-checkout-session", request).await
    }

    async fn get_payment_intent(&self, session_id: &str) -> Result<Option<PaymentIntent>> {
        let envelope: IntentEnvelope = self.post("get-payment-intent", &serde_json::json!({ "sessionId": session_id })).await?;
        Ok(envelope.payment_intent)
    }

    async fn find_payment_intent(&self, query: &PaymentIntentQuery) -> Result<Option<PaymentIntent>> {
        let envelope: IntentEnvelope = self.post("find-payment-intent", query).await?;
        Ok(envelope.payment_intent)
    }

    async fn process_refund(&self, request: &ProviderRefundRequest) -> Result<ProviderRefund> {
        self.post("process-refund", request).await
    }
}

pub struct HttpEmailProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpEmailProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = config.client().map_err(|e| StorefrontError::Email(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let url = format!("{}/send", self.config.base_url);
        self.config
            .authorize(self.client.post(&url))
            .json(message)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StorefrontError::Email(e.to_string()))?;
        Ok(())
    }
}
