//! Sandbox payment and email providers.
//!
//! Used when no provider endpoint is configured, and by tests. Checkout
//! sessions complete immediately with a fabricated payment intent; every
//! call is recorded so callers can inspect what was sent.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::domain::ports::{
    CheckoutSession, CheckoutSessionRequest, EmailMessage, EmailProvider, PaymentIntent, PaymentIntentQuery, PaymentProvider,
    ProviderRefund, ProviderRefundRequest,
};
use crate::{Result, StorefrontError};

#[derive(Default)]
pub struct SandboxPaymentProvider {
    sessions: Mutex<HashMap<String, PaymentIntent>>,
    /// Intents visible to the date-range search, independent of sessions.
    searchable: Mutex<Vec<PaymentIntent>>,
    refunds: Mutex<Vec<ProviderRefundRequest>>,
    fail_refunds: Mutex<bool>,
    hide_session_intents: Mutex<bool>,
}

impl SandboxPaymentProvider {
    pub fn new() -> Self { Self::default() }

    /// Makes an intent discoverable by `find_payment_intent`.
    pub fn register_intent(&self, intent: PaymentIntent) { self.searchable.lock().push(intent); }

    pub fn refunds(&self) -> Vec<ProviderRefundRequest> { self.refunds.lock().clone() }

    pub fn fail_refunds(&self, fail: bool) { *self.fail_refunds.lock() = fail; }

    /// Simulates a provider that cannot resolve an intent from its session.
    pub fn hide_session_intents(&self, hide: bool) { *self.hide_session_intents.lock() = hide; }
}

#[async_trait]
impl PaymentProvider for SandboxPaymentProvider {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
        if request.amount <= 0 { return Err(StorefrontError::Payment("Amount must be greater than zero".to_string())); }
        let session_id = format!("cs_sandbox_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: format!("pi_sandbox_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            status: "succeeded".to_string(),
            customer_email: Some(request.customer_email.clone()),
            created: Utc::now(),
        };
        info!(order_id = %request.order_id, %session_id, "Sandbox checkout session created");
        self.sessions.lock().insert(session_id.clone(), intent);
        Ok(CheckoutSession { url: format!("{}?session_id={session_id}", request.success_url), session_id })
    }

    async fn get_payment_intent(&self, session_id: &str) -> Result<Option<PaymentIntent>> {
        if *self.hide_session_intents.lock() { return Ok(None); }
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn find_payment_intent(&self, query: &PaymentIntentQuery) -> Result<Option<PaymentIntent>> {
        let found = self.searchable.lock().iter().find(|pi| {
            pi.amount == query.amount
                && pi.customer_email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(&query.customer_email))
                && pi.created >= query.created_after
                && pi.created <= query.created_before
        }).cloned();
        Ok(found)
    }

    async fn process_refund(&self, request: &ProviderRefundRequest) -> Result<ProviderRefund> {
        if *self.fail_refunds.lock() { return Err(StorefrontError::Payment("Sandbox refund declined".to_string())); }
        self.refunds.lock().push(request.clone());
        info!(payment_intent_id = %request.payment_intent_id, amount = request.amount, "Sandbox refund issued");
        Ok(ProviderRefund { refund_id: format!("re_sandbox_{}", Uuid::new_v4().simple()), status: "succeeded".to_string() })
    }
}

#[derive(Default)]
pub struct SandboxEmailProvider {
    sent: Mutex<Vec<EmailMessage>>,
    failing_recipients: Mutex<Vec<String>>,
}

impl SandboxEmailProvider {
    pub fn new() -> Self { Self::default() }
    pub fn sent(&self) -> Vec<EmailMessage> { self.sent.lock().clone() }
    pub fn fail_for(&self, recipient: impl Into<String>) { self.failing_recipients.lock().push(recipient.into()); }
}

#[async_trait]
impl EmailProvider for SandboxEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.failing_recipients.lock().iter().any(|r| r.eq_ignore_ascii_case(&message.to)) {
            return Err(StorefrontError::Email(format!("Sandbox rejected recipient {}", message.to)));
        }
        info!(to = %message.to, subject = %message.subject, "Sandbox email sent");
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
