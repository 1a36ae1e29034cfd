use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use metrics::histogram;
use serde::{Deserialize, Serialize};

use crate::handlers::{error_response, AppState};
use crate::model::{
    valid_coupon_code, ItemRevenueBucket, ModelId, NewCategory, NewCoupon, NewItem, RevenueBucket,
    ShopError, StaleItem, StockAlert,
};
use crate::ui_model::FilterRequest;

/// Admin surface, nested under `/admin`. Exposure is the deployment's
/// concern; nothing here is reachable from the storefront routes.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/orders/query", post(query_orders))
        .route("/orders/accept-refunds", post(accept_refunds))
        .route("/orders/mark-delivered", post(mark_delivered))
        .route("/items/query", post(query_items))
        .route("/items", post(create_item))
        .route("/items/copy", post(copy_items))
        .route("/items/alerts", get(stock_alerts))
        .route("/addresses/query", post(query_addresses))
        .route("/payments/query", post(query_payments))
        .route("/categories", post(create_category))
        .route("/coupons", post(create_coupon))
        .route("/revenue", get(revenue_report))
}

pub async fn query_orders(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Response {
    let ids = match state.admin.filter_order_ids(&request).await {
        Ok(ids) => ids,
        Err(e) => return error_response("query_orders", e),
    };
    match state.orders.orders_by_ids(&ids).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => error_response("query_orders", e),
    }
}

pub async fn query_items(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Response {
    let ids = match state.admin.filter_item_ids(&request).await {
        Ok(ids) => ids,
        Err(e) => return error_response("query_items", e),
    };
    match state.catalog.items_by_ids(&ids).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => error_response("query_items", e),
    }
}

pub async fn query_addresses(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Response {
    let ids = match state.admin.filter_address_ids(&request).await {
        Ok(ids) => ids,
        Err(e) => return error_response("query_addresses", e),
    };
    match state.orders.addresses_by_ids(&ids).await {
        Ok(addresses) => Json(addresses).into_response(),
        Err(e) => error_response("query_addresses", e),
    }
}

pub async fn query_payments(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Response {
    let ids = match state.admin.filter_payment_ids(&request).await {
        Ok(ids) => ids,
        Err(e) => return error_response("query_payments", e),
    };
    match state.orders.payments_by_ids(&ids).await {
        Ok(payments) => Json(payments).into_response(),
        Err(e) => error_response("query_payments", e),
    }
}

#[derive(Deserialize)]
pub struct OrderIdsRequest {
    pub order_ids: Vec<ModelId>,
}

#[derive(Serialize)]
struct BulkActionResponse {
    updated: u64,
}

/// Bulk-grant the selected refund requests.
pub async fn accept_refunds(
    State(state): State<AppState>,
    Json(request): Json<OrderIdsRequest>,
) -> Response {
    tracing::info!(
        order_ids = ?request.order_ids,
        "Granting refunds for {} orders",
        request.order_ids.len()
    );
    match state.orders.accept_refunds(&request.order_ids).await {
        Ok(updated) => Json(BulkActionResponse { updated }).into_response(),
        Err(e) => error_response("accept_refunds", e),
    }
}

pub async fn mark_delivered(
    State(state): State<AppState>,
    Json(request): Json<OrderIdsRequest>,
) -> Response {
    match state.orders.mark_delivered(&request.order_ids).await {
        Ok(updated) => Json(BulkActionResponse { updated }).into_response(),
        Err(e) => error_response("mark_delivered", e),
    }
}

#[derive(Deserialize)]
pub struct ItemIdsRequest {
    pub item_ids: Vec<ModelId>,
}

pub async fn copy_items(
    State(state): State<AppState>,
    Json(request): Json<ItemIdsRequest>,
) -> Response {
    match state.catalog.copy_items(&request.item_ids).await {
        Ok(copies) => (StatusCode::CREATED, Json(copies)).into_response(),
        Err(e) => error_response("copy_items", e),
    }
}

#[derive(Serialize)]
struct StockAlertsResponse {
    low_stock: Vec<StockAlert>,
    unsold: Vec<StaleItem>,
}

/// The restock warnings the original item list screen surfaced.
pub async fn stock_alerts(State(state): State<AppState>) -> Response {
    let cutoff = (Utc::now() - Duration::days(state.admin_config.stale_after_days)).naive_utc();
    match state
        .catalog
        .stock_alerts(state.admin_config.low_stock_threshold, cutoff)
        .await
    {
        Ok((low_stock, unsold)) => Json(StockAlertsResponse { low_stock, unsold }).into_response(),
        Err(e) => error_response("stock_alerts", e),
    }
}

pub async fn create_item(State(state): State<AppState>, Json(item): Json<NewItem>) -> Response {
    match state.catalog.create_item(&item).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response("create_item", e),
    }
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(category): Json<NewCategory>,
) -> Response {
    match state.catalog.create_category(&category).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response("create_category", e),
    }
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(coupon): Json<NewCoupon>,
) -> Response {
    if !valid_coupon_code(&coupon.code) {
        return error_response(
            "create_coupon",
            ShopError::invalid_input(format!("malformed coupon code: {}", coupon.code)),
        );
    }
    match state.catalog.create_coupon(&coupon).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response("create_coupon", e),
    }
}

#[derive(Serialize)]
struct RevenueReport {
    daily: Vec<RevenueBucket>,
    monthly: Vec<RevenueBucket>,
    items_monthly: Vec<ItemRevenueBucket>,
}

/// All three aggregate reports, fetched concurrently.
pub async fn revenue_report(State(state): State<AppState>) -> Response {
    let t0 = Instant::now();
    let result = futures::try_join!(
        state.revenue.daily_revenue(),
        state.revenue.monthly_revenue(),
        state.revenue.item_monthly_revenue(),
    );
    match result {
        Ok((daily, monthly, items_monthly)) => {
            histogram!("storefront_revenue_query_seconds").record(t0.elapsed().as_secs_f64());
            Json(RevenueReport {
                daily,
                monthly,
                items_monthly,
            })
            .into_response()
        }
        Err(e) => error_response("revenue_report", e),
    }
}
