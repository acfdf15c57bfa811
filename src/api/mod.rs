//! HTTP surface
//!
//! Every route acts on behalf of the caller named in the `x-user-id` header.
//! Authentication happens upstream; this service only authorizes.

pub mod handlers;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::error;

use crate::domain::aggregates::OrderError;
use crate::state::AppState;
use crate::StorefrontError;

pub const USER_HEADER: &str = "x-user-id";

/// Build the router (separated from `main` for testing).
pub fn router(state: AppState) -> Router {
    use handlers::*;

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/stock/:product_id", get(get_stock))
        .route("/api/v1/stock/:product_id/reserve", post(reserve_stock))
        .route("/api/v1/stock/:product_id/release", post(release_stock))
        .route("/api/v1/orders", get(list_orders).post(place_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/cancel", post(cancel_order))
        .route("/api/v1/orders/:id/ship", post(ship_order))
        .route("/api/v1/orders/:id/deliver", post(deliver_order))
        .route("/api/v1/orders/:id/checkout", post(checkout_existing_order))
        .route("/api/v1/orders/:id/refund", post(request_refund))
        .route("/api/v1/orders/:id/refund/approve", post(approve_refund))
        .route("/api/v1/orders/:id/refund/reject", post(reject_refund))
        .route("/api/v1/orders/:id/refund/process", post(process_refund))
        .route("/api/v1/orders/:id/tracking", post(add_tracking_event).put(reorder_tracking))
        .route("/api/v1/orders/:id/tracking/:event_id", put(edit_tracking_event).delete(remove_tracking_event))
        .route("/api/v1/checkout", post(begin_checkout))
        .route("/api/v1/checkout/complete", post(complete_checkout))
        .route("/api/v1/checkout/abandon", post(abandon_checkout))
        .route("/api/v1/notifications", get(list_notifications).delete(delete_all_notifications))
        .route("/api/v1/notifications/unread-count", get(unread_count))
        .route("/api/v1/notifications/read-all", post(mark_all_read))
        .route("/api/v1/notifications/:id", put(set_notification_read).delete(delete_notification))
        .route("/api/v1/subscribers", get(list_subscribers).post(subscribe))
        .route("/api/v1/subscribers/:email", axum::routing::delete(unsubscribe))
        .route("/api/v1/campaigns", post(send_campaign))
        .with_state(state)
}

/// The calling user, from the [`USER_HEADER`] header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor(pub String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Actor(v.to_string()))
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, Json(json!({"error": format!("missing {USER_HEADER} header"), "code": "unauthenticated"}))).into_response())
    }
}

impl StorefrontError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::OrderNotFound(_) | Self::NotificationNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::Validation(_) | Self::MissingHandoff(_) | Self::HandoffMismatch(_) => StatusCode::BAD_REQUEST,
            Self::Order(OrderError::InvalidRefundAmount) => StatusCode::BAD_REQUEST,
            Self::Order(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ManualRefundRequired { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Payment(_) | Self::Email(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "order_not_found",
            Self::NotificationNotFound(_) => "notification_not_found",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::Validation(_) => "validation_failed",
            Self::Forbidden(_) => "forbidden",
            Self::MissingHandoff(_) => "missing_handoff",
            Self::HandoffMismatch(_) => "handoff_mismatch",
            Self::ManualRefundRequired { .. } => "manual_refund_required",
            Self::Order(_) => "invalid_transition",
            Self::Payment(_) => "payment_provider_error",
            Self::Email(_) => "email_provider_error",
            Self::Storage(_) => "storage_error",
            Self::Config(_) => "config_error",
        }
    }
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() { error!(error = %self, "Request failed"); }
        let mut body = json!({"error": self.to_string(), "code": self.code()});
        if let Self::InsufficientStock { requested, available, .. } = &self {
            body["requested"] = json!(requested);
            body["available"] = json!(available);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OrderStatus;

    #[test]
    fn test_error_statuses() {
        assert_eq!(StorefrontError::ManualRefundRequired { order_id: "o".into() }.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(StorefrontError::InsufficientStock { product_id: "p".into(), requested: 2, available: 1 }.status(), StatusCode::CONFLICT);
        assert_eq!(StorefrontError::Order(OrderError::InvalidRefundAmount).status(), StatusCode::BAD_REQUEST);
        assert_eq!(StorefrontError::Order(OrderError::NotRefundable { status: OrderStatus::Paid }).status(), StatusCode::CONFLICT);
        assert_eq!(StorefrontError::Payment("down".into()).status(), StatusCode::BAD_GATEWAY);
    }
}
