use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use common::config::AdminConfig;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

use crate::model::{
    CheckoutRequest, GenericError, ModelId, NewReview, OrderRecord, ProfileRecord, ProfileUpdate,
    RefundRequest, ShopError,
};
use crate::payments::PaymentGateway;
use crate::storage::{
    AdminQuery, CartStorage, CatalogStorage, OrderStorage, ProfileStorage, RevenueStorage,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStorage>,
    pub cart: Arc<dyn CartStorage>,
    pub orders: Arc<dyn OrderStorage>,
    pub profiles: Arc<dyn ProfileStorage>,
    pub revenue: Arc<dyn RevenueStorage>,
    pub admin: Arc<dyn AdminQuery>,
    pub payments: Arc<dyn PaymentGateway>,
    pub admin_config: AdminConfig,
    pub currency: String,
}

/// Storefront routes, mounted at the root.
pub fn storefront_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/items", get(list_items))
        .route("/api/items/{slug}", get(get_item))
        .route("/api/items/{slug}/reviews", get(item_reviews).post(add_review))
        .route("/api/categories", get(list_categories))
        .route("/api/categories/{slug}", get(get_category))
        .route("/api/search", get(search_items))
        .route("/api/cart", get(cart_summary))
        .route("/api/cart/items", post(add_to_cart))
        .route("/api/cart/items/{slug}", delete(remove_from_cart))
        .route("/api/cart/items/{slug}/decrement", post(decrement_cart_item))
        .route("/api/coupon", post(apply_coupon))
        .route("/api/checkout", post(checkout))
        .route("/api/payment/{provider}", post(pay))
        .route("/api/orders/{ref_code}/received", post(confirm_received))
        .route("/api/refunds", post(request_refund))
        .route("/api/profile/{user_id}", get(get_profile).put(update_profile))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

/// Map a storage failure onto a status code; domain errors carry their
/// own, everything else is a 500.
pub(crate) fn error_response(context: &'static str, e: GenericError) -> Response {
    if let Some(shop_error) = e.downcast_ref::<ShopError>() {
        let status = match shop_error {
            ShopError::NotFound { .. } => StatusCode::NOT_FOUND,
            ShopError::OutOfStock { .. } => StatusCode::CONFLICT,
            ShopError::EmptyCart { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ShopError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        };
        tracing::info!(error = %shop_error, context, "Request rejected");
        return (status, shop_error.to_string()).into_response();
    }
    tracing::error!(error = %e, context, "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

#[derive(Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

const DEFAULT_PAGE_SIZE: u64 = 20;

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Response {
    let page = params.page.unwrap_or(0);
    let per_page = params.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    match state.catalog.list_items(page, per_page).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => error_response("list_items", e),
    }
}

pub async fn get_item(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.catalog.get_item(&slug).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => error_response("get_item", e),
    }
}

pub async fn list_categories(State(state): State<AppState>) -> Response {
    match state.catalog.list_categories().await {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => error_response("list_categories", e),
    }
}

#[derive(Serialize)]
struct CategoryResponse {
    category: crate::model::CategoryRecord,
    items: Vec<crate::model::ItemRecord>,
}

pub async fn get_category(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.catalog.get_category(&slug).await {
        Ok((category, items)) => Json(CategoryResponse { category, items }).into_response(),
        Err(e) => error_response("get_category", e),
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

pub async fn search_items(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.catalog.search_items(&params.q).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => error_response("search_items", e),
    }
}

pub async fn item_reviews(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.catalog.item_reviews(&slug).await {
        Ok(reviews) => Json(reviews).into_response(),
        Err(e) => error_response("item_reviews", e),
    }
}

pub async fn add_review(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(review): Json<NewReview>,
) -> Response {
    match state.catalog.add_review(&slug, &review).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response("add_review", e),
    }
}

#[derive(Deserialize)]
pub struct UserParams {
    pub user_id: ModelId,
}

pub async fn cart_summary(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Response {
    match state.cart.cart_summary(params.user_id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response("cart_summary", e),
    }
}

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub user_id: ModelId,
    pub slug: String,
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Json(request): Json<AddToCartRequest>,
) -> Response {
    match state.cart.add_to_cart(request.user_id, &request.slug).await {
        Ok(summary) => {
            tracing::info!(user_id = request.user_id, slug = %request.slug, "Added item to cart");
            Json(summary).into_response()
        }
        Err(e) => error_response("add_to_cart", e),
    }
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<UserParams>,
) -> Response {
    match state.cart.remove_from_cart(params.user_id, &slug).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response("remove_from_cart", e),
    }
}

#[derive(Deserialize)]
pub struct UserBody {
    pub user_id: ModelId,
}

pub async fn decrement_cart_item(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<UserBody>,
) -> Response {
    match state.cart.remove_single_from_cart(body.user_id, &slug).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response("decrement_cart_item", e),
    }
}

#[derive(Deserialize)]
pub struct ApplyCouponRequest {
    pub user_id: ModelId,
    pub code: String,
}

pub async fn apply_coupon(
    State(state): State<AppState>,
    Json(request): Json<ApplyCouponRequest>,
) -> Response {
    match state.cart.apply_coupon(request.user_id, &request.code).await {
        Ok(summary) => {
            tracing::info!(user_id = request.user_id, code = %request.code, "Coupon applied");
            Json(summary).into_response()
        }
        Err(e) => error_response("apply_coupon", e),
    }
}

pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Response {
    match state.orders.checkout(&request).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => error_response("checkout", e),
    }
}

#[derive(Deserialize)]
pub struct PaymentSubmission {
    pub user_id: ModelId,
    pub token: String,
}

const PAYMENT_PROVIDERS: &[&str] = &["stripe", "paypal"];

/// Charge the active cart and finalize the order.
pub async fn pay(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(submission): Json<PaymentSubmission>,
) -> Response {
    if !PAYMENT_PROVIDERS.contains(&provider.as_str()) {
        return error_response(
            "pay",
            ShopError::invalid_input(format!("unknown payment provider: {}", provider)),
        );
    }

    let summary = match state.cart.cart_summary(submission.user_id).await {
        Ok(summary) => summary,
        Err(e) => return error_response("pay", e),
    };
    if summary.is_empty() {
        return error_response("pay", ShopError::empty_cart(submission.user_id));
    }

    let amount = summary.total();
    let t0 = Instant::now();
    let charge_id = match state
        .payments
        .charge(amount, &state.currency, &submission.token)
        .await
    {
        Ok(charge_id) => charge_id,
        Err(e) => return error_response("pay", e),
    };

    match state
        .orders
        .record_payment(submission.user_id, &charge_id, amount)
        .await
    {
        Ok(order) => {
            histogram!("storefront_checkout_seconds").record(t0.elapsed().as_secs_f64());
            counter!("storefront_payments_total", "provider" => provider.clone()).increment(1);
            tracing::info!(
                user_id = submission.user_id,
                ref_code = order.ref_code.as_deref().unwrap_or(""),
                amount,
                "Order placed"
            );
            Json(order).into_response()
        }
        Err(e) => error_response("pay", e),
    }
}

pub async fn confirm_received(
    State(state): State<AppState>,
    Path(ref_code): Path<String>,
    Json(body): Json<UserBody>,
) -> Response {
    match state.orders.confirm_received(body.user_id, &ref_code).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => error_response("confirm_received", e),
    }
}

pub async fn request_refund(
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Response {
    match state.orders.request_refund(&request).await {
        Ok(refund) => {
            tracing::info!(ref_code = %request.ref_code, "Refund requested");
            (StatusCode::CREATED, Json(refund)).into_response()
        }
        Err(e) => error_response("request_refund", e),
    }
}

#[derive(Serialize)]
struct ProfileResponse {
    profile: ProfileRecord,
    orders: Vec<OrderRecord>,
}

pub async fn get_profile(State(state): State<AppState>, Path(user_id): Path<ModelId>) -> Response {
    let profile = match state.profiles.get_profile(user_id).await {
        Ok(profile) => profile,
        Err(e) => return error_response("get_profile", e),
    };
    match state.orders.user_orders(user_id).await {
        Ok(orders) => Json(ProfileResponse { profile, orders }).into_response(),
        Err(e) => error_response("get_profile", e),
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<ModelId>,
    Json(update): Json<ProfileUpdate>,
) -> Response {
    match state.profiles.update_profile(user_id, &update).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => error_response("update_profile", e),
    }
}
