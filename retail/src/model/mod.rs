use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use std::error::Error;
use strum_macros::{Display as EnumDisplay, EnumString};

pub type ModelId = i64;

pub type GenericError = Box<dyn Error + Send + Sync>;

// Submodules for the records passed across the storage seam
pub mod cart;
pub mod records;

pub use cart::{CartLine, CartSummary};
pub use records::*;

/// Merchandising label shown on catalog tiles.
///
/// Stored as a single-character code; the enum is the API-facing form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
pub enum ItemLabel {
    Sale,
    New,
    Promotion,
}

impl ItemLabel {
    pub fn code(&self) -> &'static str {
        match self {
            ItemLabel::Sale => "S",
            ItemLabel::New => "N",
            ItemLabel::Promotion => "P",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(ItemLabel::Sale),
            "N" => Some(ItemLabel::New),
            "P" => Some(ItemLabel::Promotion),
            _ => None,
        }
    }
}

/// Whether a stored address is used for billing or shipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay, EnumString)]
pub enum AddressKind {
    Billing,
    Shipping,
}

impl AddressKind {
    pub fn code(&self) -> &'static str {
        match self {
            AddressKind::Billing => "B",
            AddressKind::Shipping => "S",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B" => Some(AddressKind::Billing),
            "S" => Some(AddressKind::Shipping),
            _ => None,
        }
    }
}

/// Domain failures the HTTP layer must tell apart from plain storage
/// errors. Storage methods still return [`GenericError`]; handlers
/// downcast to pick the status code.
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("insufficient stock for {item}: requested {requested}, available {available}")]
    OutOfStock {
        item: String,
        requested: i32,
        available: i32,
    },

    #[error("no active cart for user {user_id}")]
    EmptyCart { user_id: ModelId },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ShopError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> GenericError {
        Box::new(ShopError::NotFound {
            entity,
            key: key.into(),
        })
    }

    pub fn out_of_stock(item: impl Into<String>, requested: i32, available: i32) -> GenericError {
        Box::new(ShopError::OutOfStock {
            item: item.into(),
            requested,
            available,
        })
    }

    pub fn empty_cart(user_id: ModelId) -> GenericError {
        Box::new(ShopError::EmptyCart { user_id })
    }

    pub fn invalid_input(message: impl Into<String>) -> GenericError {
        Box::new(ShopError::InvalidInput(message.into()))
    }
}

/// One row of an aggregate revenue report. `bucket` is the truncated
/// period rendered as text so the shape is identical across backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct RevenueBucket {
    pub bucket: String,
    pub total_revenue: f64,
}

/// Monthly revenue broken down per item title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct ItemRevenueBucket {
    pub bucket: String,
    pub item_title: String,
    pub total_revenue: f64,
}

/// Item whose stock dropped below the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    pub item_id: ModelId,
    pub title: String,
    pub stock_no: i32,
}

/// Item nobody purchased within the configured window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleItem {
    pub item_id: ModelId,
    pub title: String,
    pub last_purchased_at: Option<chrono::NaiveDateTime>,
}

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    static ref COUPON_CODE: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,15}$").unwrap();
}

/// Derive a URL slug from a title, the way the admin screens prefill it.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub fn valid_coupon_code(code: &str) -> bool {
    COUPON_CODE.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_codes_round_trip() {
        for label in [ItemLabel::Sale, ItemLabel::New, ItemLabel::Promotion] {
            assert_eq!(ItemLabel::from_code(label.code()), Some(label));
        }
        assert_eq!(ItemLabel::from_code("X"), None);
    }

    #[test]
    fn address_kind_codes_round_trip() {
        assert_eq!(AddressKind::from_code("B"), Some(AddressKind::Billing));
        assert_eq!(AddressKind::from_code("S"), Some(AddressKind::Shipping));
        assert_eq!(AddressKind::from_code("Q"), None);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Wool Jumper"), "wool-jumper");
        assert_eq!(slugify("  Café -- Table!  "), "caf-table");
        assert_eq!(slugify("ALREADY-slugged"), "already-slugged");
    }

    #[test]
    fn coupon_codes_validated() {
        assert!(valid_coupon_code("WELCOME10"));
        assert!(valid_coupon_code("spring_sale"));
        assert!(!valid_coupon_code(""));
        assert!(!valid_coupon_code("way-too-long-coupon-code"));
        assert!(!valid_coupon_code("no spaces"));
    }

    #[test]
    fn shop_error_downcasts_from_generic() {
        let err = ShopError::not_found("item", "wool-jumper");
        let shop_error = err.downcast_ref::<ShopError>().unwrap();
        assert!(matches!(shop_error, ShopError::NotFound { .. }));
        assert_eq!(shop_error.to_string(), "item not found: wool-jumper");
    }
}
