use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::api::Actor;
use crate::application::{Campaign, CampaignReport, CheckoutHandoff, CheckoutRequest, CheckoutStarted, PlaceOrder, Reservation};
use crate::domain::aggregates::{Notification, Order, OrderSnapshot, TrackingEventDraft};
use crate::domain::ports::Subscriber;
use crate::domain::value_objects::{Customer, Money, ShippingInfo};
use crate::state::AppState;
use crate::{Result, StorefrontError};

type ApiResult<T> = Result<Json<T>>;

fn snapshot(order: Order) -> Json<OrderSnapshot> { Json(order.snapshot()) }

fn price(state: &AppState, amount: Decimal) -> Result<Money> {
    if amount <= Decimal::ZERO { return Err(StorefrontError::Validation("unit price must be positive".into())); }
    Ok(Money::new(amount, &state.config.currency))
}

pub async fn health() -> Json<Value> { Json(json!({"status": "healthy", "service": "quibble-commerce"})) }

// =============================================================================
// Stock
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockView {
    pub product_id: String,
    pub stock_count: u32,
    pub reserved_stock: u32,
    pub available: u32,
}

pub async fn get_stock(State(s): State<AppState>, Path(product_id): Path<String>) -> ApiResult<StockView> {
    let stock = s.ledger.snapshot(&product_id).await.ok_or_else(|| StorefrontError::Storage(format!("stock for {product_id} is unavailable")))?;
    Ok(Json(StockView { available: stock.available(), stock_count: stock.stock_count(), reserved_stock: stock.reserved_stock(), product_id }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuantityRequest {
    #[validate(range(min = 1, max = 10000))]
    pub quantity: u32,
    /// Grant what is available instead of refusing.
    #[serde(default)]
    pub partial: bool,
}

pub async fn reserve_stock(State(s): State<AppState>, _actor: Actor, Path(product_id): Path<String>, Json(r): Json<QuantityRequest>) -> ApiResult<Reservation> {
    r.validate()?;
    if r.partial { return Ok(Json(s.ledger.reserve_up_to(&product_id, r.quantity).await)); }
    if s.ledger.reserve(&product_id, r.quantity).await {
        let available = s.ledger.available(&product_id).await;
        return Ok(Json(Reservation { requested: r.quantity, granted: r.quantity, available }));
    }
    let available = s.ledger.available(&product_id).await;
    Err(StorefrontError::InsufficientStock { product_id, requested: r.quantity, available })
}

/// Manual release of held units. Customer holds are given up through
/// checkout abandonment or order cancellation instead.
pub async fn release_stock(State(s): State<AppState>, actor: Actor, Path(product_id): Path<String>, Json(r): Json<QuantityRequest>) -> Result<StatusCode> {
    r.validate()?;
    s.orders.access().require_staff(&actor.0).await?;
    s.ledger.release(&product_id, r.quantity).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 128))]
    pub product_id: String,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: u32,
    pub unit_price: Decimal,
    pub shipping_info: Option<ShippingInfo>,
    /// Checkout only: the client already holds a cart reservation.
    #[serde(default)]
    pub stock_reserved: bool,
}

impl OrderRequest {
    fn customer(&self, actor: Actor) -> Customer { Customer { user_id: actor.0, email: self.email.trim().to_string(), name: self.name.trim().to_string() } }
}

pub async fn place_order(State(s): State<AppState>, actor: Actor, Json(r): Json<OrderRequest>) -> Result<(StatusCode, Json<OrderSnapshot>)> {
    r.validate()?;
    let unit_price = price(&s, r.unit_price)?;
    let order = s.orders.place_order(PlaceOrder {
        customer: r.customer(actor),
        product_id: r.product_id,
        product_name: r.product_name,
        quantity: r.quantity,
        unit_price,
        shipping_info: r.shipping_info,
    }).await?;
    Ok((StatusCode::CREATED, snapshot(order)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams { pub user_id: Option<String> }

pub async fn list_orders(State(s): State<AppState>, actor: Actor, Query(p): Query<ListOrdersParams>) -> ApiResult<Vec<OrderSnapshot>> {
    let user_id = p.user_id.unwrap_or_else(|| actor.0.clone());
    let orders = s.orders.list_for_user(&actor.0, &user_id).await?;
    Ok(Json(orders.iter().map(Order::snapshot).collect()))
}

pub async fn get_order(State(s): State<AppState>, actor: Actor, Path(id): Path<String>) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.orders.get(&actor.0, &id).await?))
}

pub async fn cancel_order(State(s): State<AppState>, actor: Actor, Path(id): Path<String>) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.orders.cancel(&actor.0, &id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipRequest { pub tracking_number: Option<String> }

pub async fn ship_order(State(s): State<AppState>, actor: Actor, Path(id): Path<String>, body: Option<Json<ShipRequest>>) -> ApiResult<OrderSnapshot> {
    let tracking_number = body.and_then(|Json(b)| b.tracking_number).filter(|t| !t.trim().is_empty());
    Ok(snapshot(s.orders.ship(&actor.0, &id, tracking_number).await?))
}

pub async fn deliver_order(State(s): State<AppState>, actor: Actor, Path(id): Path<String>) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.orders.deliver(&actor.0, &id).await?))
}

// =============================================================================
// Checkout
// =============================================================================

pub async fn begin_checkout(State(s): State<AppState>, actor: Actor, Json(r): Json<OrderRequest>) -> Result<(StatusCode, Json<CheckoutStarted>)> {
    r.validate()?;
    let unit_price = price(&s, r.unit_price)?;
    let started = s.checkout.begin_checkout(CheckoutRequest {
        customer: r.customer(actor),
        product_id: r.product_id,
        product_name: r.product_name,
        quantity: r.quantity,
        unit_price,
        shipping_info: r.shipping_info,
        stock_reserved: r.stock_reserved,
    }).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingOrderCheckout { pub shipping_info: Option<ShippingInfo> }

pub async fn checkout_existing_order(
    State(s): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    body: Option<Json<ExistingOrderCheckout>>,
) -> ApiResult<CheckoutStarted> {
    let shipping_info = body.and_then(|Json(b)| b.shipping_info);
    Ok(Json(s.checkout.begin_checkout_for_order(&actor.0, &id, shipping_info).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteCheckoutRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub session_id: String,
    pub handoff: Option<CheckoutHandoff>,
}

pub async fn complete_checkout(State(s): State<AppState>, actor: Actor, Json(r): Json<CompleteCheckoutRequest>) -> ApiResult<OrderSnapshot> {
    r.validate()?;
    Ok(snapshot(s.checkout.complete_checkout(&actor.0, &r.order_id, &r.session_id, r.handoff).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AbandonCheckoutRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    pub handoff: Option<CheckoutHandoff>,
}

pub async fn abandon_checkout(State(s): State<AppState>, actor: Actor, Json(r): Json<AbandonCheckoutRequest>) -> Result<StatusCode> {
    r.validate()?;
    s.checkout.abandon_checkout(&actor.0, &r.order_id, r.handoff).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Refunds
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequestBody {
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    pub amount: Option<Decimal>,
}

pub async fn request_refund(State(s): State<AppState>, actor: Actor, Path(id): Path<String>, Json(r): Json<RefundRequestBody>) -> ApiResult<OrderSnapshot> {
    r.validate()?;
    Ok(snapshot(s.refunds.request(&actor.0, &id, &r.reason, r.amount).await?))
}

pub async fn approve_refund(State(s): State<AppState>, actor: Actor, Path(id): Path<String>) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.refunds.approve(&actor.0, &id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRefundBody {
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

pub async fn reject_refund(State(s): State<AppState>, actor: Actor, Path(id): Path<String>, Json(r): Json<RejectRefundBody>) -> ApiResult<OrderSnapshot> {
    r.validate()?;
    Ok(snapshot(s.refunds.reject(&actor.0, &id, &r.reason).await?))
}

pub async fn process_refund(State(s): State<AppState>, actor: Actor, Path(id): Path<String>) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.refunds.process(&actor.0, &id).await?))
}

// =============================================================================
// Tracking
// =============================================================================

pub async fn add_tracking_event(State(s): State<AppState>, actor: Actor, Path(id): Path<String>, Json(draft): Json<TrackingEventDraft>) -> Result<(StatusCode, Json<OrderSnapshot>)> {
    Ok((StatusCode::CREATED, snapshot(s.tracking.add_event(&actor.0, &id, draft).await?)))
}

pub async fn edit_tracking_event(
    State(s): State<AppState>,
    actor: Actor,
    Path((id, event_id)): Path<(String, Uuid)>,
    Json(draft): Json<TrackingEventDraft>,
) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.tracking.edit_event(&actor.0, &id, event_id, draft).await?))
}

pub async fn remove_tracking_event(State(s): State<AppState>, actor: Actor, Path((id, event_id)): Path<(String, Uuid)>) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.tracking.remove_event(&actor.0, &id, event_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest { pub event_ids: Vec<Uuid> }

pub async fn reorder_tracking(State(s): State<AppState>, actor: Actor, Path(id): Path<String>, Json(r): Json<ReorderRequest>) -> ApiResult<OrderSnapshot> {
    Ok(snapshot(s.tracking.reorder(&actor.0, &id, r.event_ids).await?))
}

// =============================================================================
// Notifications
// =============================================================================

pub async fn list_notifications(State(s): State<AppState>, actor: Actor) -> ApiResult<Vec<Notification>> {
    Ok(Json(s.notifications.list(&actor.0).await?))
}

pub async fn unread_count(State(s): State<AppState>, actor: Actor) -> ApiResult<Value> {
    Ok(Json(json!({"unread": s.notifications.unread_count(&actor.0).await?})))
}

#[derive(Debug, Deserialize)]
pub struct ReadRequest { pub read: bool }

pub async fn set_notification_read(State(s): State<AppState>, actor: Actor, Path(id): Path<Uuid>, Json(r): Json<ReadRequest>) -> ApiResult<Notification> {
    Ok(Json(s.notifications.set_read(&actor.0, id, r.read).await?))
}

pub async fn delete_notification(State(s): State<AppState>, actor: Actor, Path(id): Path<Uuid>) -> Result<StatusCode> {
    s.notifications.delete(&actor.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(State(s): State<AppState>, actor: Actor) -> ApiResult<Value> {
    Ok(Json(json!({"updated": s.notifications.mark_all_read(&actor.0).await?})))
}

pub async fn delete_all_notifications(State(s): State<AppState>, actor: Actor) -> ApiResult<Value> {
    Ok(Json(json!({"deleted": s.notifications.delete_all(&actor.0).await?})))
}

// =============================================================================
// Marketing
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
}

pub async fn subscribe(State(s): State<AppState>, Json(r): Json<SubscribeRequest>) -> Result<(StatusCode, Json<Subscriber>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(s.marketing.subscribe(&r.email, r.name).await?)))
}

pub async fn unsubscribe(State(s): State<AppState>, Path(email): Path<String>) -> Result<StatusCode> {
    if s.marketing.unsubscribe(&email).await? { Ok(StatusCode::NO_CONTENT) } else { Ok(StatusCode::NOT_FOUND) }
}

pub async fn list_subscribers(State(s): State<AppState>, actor: Actor) -> ApiResult<Vec<Subscriber>> {
    Ok(Json(s.marketing.list_active(&actor.0).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    #[validate(length(min = 1, max = 300))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub html_content: String,
}

pub async fn send_campaign(State(s): State<AppState>, actor: Actor, Json(r): Json<CampaignRequest>) -> ApiResult<CampaignReport> {
    r.validate()?;
    Ok(Json(s.marketing.send_campaign(&actor.0, &Campaign { subject: r.subject, html_content: r.html_content }).await?))
}
