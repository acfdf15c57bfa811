//! Refund sub-state machine
//!
//! `none -> requested -> {approved | rejected}`, then `approved -> processed`.
//! Rejected is terminal: there is no path back to a fresh request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus { #[default] None, Requested, Approved, Processed, Rejected }

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none", Self::Requested => "requested", Self::Approved => "approved",
            Self::Processed => "processed", Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefundAction { Request, Approve, Reject, Process }

impl fmt::Display for RefundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self { Self::Request => "request", Self::Approve => "approve", Self::Reject => "reject", Self::Process => "process" };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefundError {
    #[error("cannot {action} a refund whose status is {from}")]
    InvalidTransition { from: RefundStatus, action: RefundAction },
}

/// What the customer asked for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub reason: String,
    pub amount: Money,
    pub requested_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub by: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefundState {
    #[default]
    None,
    Requested { request: RefundRequest },
    Approved { request: RefundRequest, approval: Decision },
    Rejected { request: RefundRequest, rejection: Decision, reason: String },
}

/// A refund the payment provider has executed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRefund {
    pub request: RefundRequest,
    pub approval: Decision,
    pub processing: Decision,
    pub provider_refund_id: String,
}

impl RefundState {
    pub fn status(&self) -> RefundStatus {
        match self {
            Self::None => RefundStatus::None,
            Self::Requested { .. } => RefundStatus::Requested,
            Self::Approved { .. } => RefundStatus::Approved,
            Self::Rejected { .. } => RefundStatus::Rejected,
        }
    }

    pub fn request(&self) -> Option<&RefundRequest> {
        match self {
            Self::None => None,
            Self::Requested { request } | Self::Approved { request, .. } | Self::Rejected { request, .. } => Some(request),
        }
    }

    pub fn open(&self, request: RefundRequest) -> Result<Self, RefundError> {
        match self {
            Self::None => Ok(Self::Requested { request }),
            other => Err(other.invalid(RefundAction::Request)),
        }
    }

    pub fn approve(&self, by: impl Into<String>) -> Result<Self, RefundError> {
        match self {
            Self::Requested { request } => Ok(Self::Approved { request: request.clone(), approval: Decision { by: by.into(), at: Utc::now() } }),
            other => Err(other.invalid(RefundAction::Approve)),
        }
    }

    pub fn reject(&self, by: impl Into<String>, reason: impl Into<String>) -> Result<Self, RefundError> {
        match self {
            Self::Requested { request } => Ok(Self::Rejected {
                request: request.clone(),
                rejection: Decision { by: by.into(), at: Utc::now() },
                reason: reason.into(),
            }),
            other => Err(other.invalid(RefundAction::Reject)),
        }
    }

    pub fn process(&self, by: impl Into<String>, provider_refund_id: impl Into<String>) -> Result<ProcessedRefund, RefundError> {
        match self {
            Self::Approved { request, approval } => Ok(ProcessedRefund {
                request: request.clone(),
                approval: approval.clone(),
                processing: Decision { by: by.into(), at: Utc::now() },
                provider_refund_id: provider_refund_id.into(),
            }),
            other => Err(other.invalid(RefundAction::Process)),
        }
    }

    fn invalid(&self, action: RefundAction) -> RefundError {
        RefundError::InvalidTransition { from: self.status(), action }
    }
}
