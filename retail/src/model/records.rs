use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{ItemLabel, ModelId};

/// Catalog item as returned to clients and admin screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ModelId,
    pub title: String,
    pub slug: String,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub category_id: ModelId,
    pub label: String,
    pub stock_no: i32,
    pub description_short: String,
    pub description_long: String,
    pub image_url: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_purchased_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: ModelId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub image_url: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ModelId,
    pub item_id: ModelId,
    pub user_id: Option<ModelId>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: ModelId,
    pub user_id: ModelId,
    pub street_address: String,
    pub apartment_address: String,
    pub country: String,
    pub zip: String,
    pub address_type: String,
    pub is_default: bool,
}

/// Order header with its lifecycle flags and linked records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: ModelId,
    pub user_id: ModelId,
    pub ref_code: Option<String>,
    pub start_date: NaiveDateTime,
    pub ordered_date: Option<NaiveDateTime>,
    pub ordered: bool,
    pub being_delivered: bool,
    pub received: bool,
    pub refund_requested: bool,
    pub refund_granted: bool,
    pub shipping_address_id: Option<ModelId>,
    pub billing_address_id: Option<ModelId>,
    pub payment_id: Option<ModelId>,
    pub coupon_id: Option<ModelId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: ModelId,
    pub charge_id: String,
    pub user_id: Option<ModelId>,
    pub amount: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponRecord {
    pub id: ModelId,
    pub code: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: ModelId,
    pub order_id: ModelId,
    pub reason: String,
    pub email: String,
    pub accepted: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: ModelId,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub bio: String,
}

/// Input for creating a catalog item. The slug is derived from the
/// title when omitted, matching the admin prefill behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub discount_price: Option<f64>,
    pub category_id: ModelId,
    pub label: ItemLabel,
    pub stock_no: i32,
    pub description_short: String,
    pub description_long: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    #[serde(default)]
    pub user_id: Option<ModelId>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAddress {
    pub street_address: String,
    pub apartment_address: String,
    pub country: String,
    pub zip: String,
    #[serde(default)]
    pub set_default: bool,
}

/// Checkout submission: where to ship and bill the active cart.
///
/// Mirrors the original checkout form: either a fresh address or the
/// stored default per side, with billing optionally mirroring shipping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: ModelId,
    #[serde(default)]
    pub shipping: Option<NewAddress>,
    #[serde(default)]
    pub use_default_shipping: bool,
    #[serde(default)]
    pub billing: Option<NewAddress>,
    #[serde(default)]
    pub use_default_billing: bool,
    #[serde(default)]
    pub same_billing_address: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub ref_code: String,
    pub reason: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}
