use serde::{Deserialize, Serialize};

use super::records::CouponRecord;
use super::ModelId;

/// One line of the active cart, denormalized with the item fields the
/// storefront needs to price it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub order_item_id: ModelId,
    pub item_id: ModelId,
    pub title: String,
    pub slug: String,
    pub quantity: i32,
    pub price: f64,
    pub discount_price: Option<f64>,
}

impl CartLine {
    pub fn total_item_price(&self) -> f64 {
        self.quantity as f64 * self.price
    }

    pub fn total_discount_item_price(&self) -> Option<f64> {
        self.discount_price.map(|p| self.quantity as f64 * p)
    }

    pub fn amount_saved(&self) -> f64 {
        match self.total_discount_item_price() {
            Some(discounted) => self.total_item_price() - discounted,
            None => 0.0,
        }
    }

    /// Discount price overrides the list price when present.
    pub fn final_price(&self) -> f64 {
        self.total_discount_item_price()
            .unwrap_or_else(|| self.total_item_price())
    }
}

/// The user's draft order with its lines and any applied coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    pub order_id: ModelId,
    pub user_id: ModelId,
    pub ref_code: Option<String>,
    pub lines: Vec<CartLine>,
    pub coupon: Option<CouponRecord>,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_total(&self) -> f64 {
        self.lines.iter().map(CartLine::final_price).sum()
    }

    pub fn amount_saved(&self) -> f64 {
        self.lines.iter().map(CartLine::amount_saved).sum()
    }

    /// Grand total after the coupon. Never negative: a coupon larger
    /// than the cart clamps to zero.
    pub fn total(&self) -> f64 {
        let coupon_amount = self.coupon.as_ref().map(|c| c.amount).unwrap_or(0.0);
        (self.item_total() - coupon_amount).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, price: f64, discount_price: Option<f64>) -> CartLine {
        CartLine {
            order_item_id: 1,
            item_id: 1,
            title: "Wool Jumper".to_string(),
            slug: "wool-jumper".to_string(),
            quantity,
            price,
            discount_price,
        }
    }

    fn summary(lines: Vec<CartLine>, coupon: Option<CouponRecord>) -> CartSummary {
        CartSummary {
            order_id: 1,
            user_id: 1,
            ref_code: None,
            lines,
            coupon,
        }
    }

    #[test]
    fn line_total_uses_list_price() {
        let line = line(3, 20.0, None);
        assert_eq!(line.total_item_price(), 60.0);
        assert_eq!(line.final_price(), 60.0);
        assert_eq!(line.amount_saved(), 0.0);
    }

    #[test]
    fn discount_price_overrides_list_price() {
        let line = line(2, 50.0, Some(40.0));
        assert_eq!(line.final_price(), 80.0);
        assert_eq!(line.amount_saved(), 20.0);
    }

    #[test]
    fn summary_totals_sum_lines() {
        let cart = summary(vec![line(1, 10.0, None), line(2, 30.0, Some(25.0))], None);
        assert_eq!(cart.item_total(), 60.0);
        assert_eq!(cart.amount_saved(), 10.0);
        assert_eq!(cart.total(), 60.0);
    }

    #[test]
    fn coupon_reduces_total_by_its_amount() {
        let coupon = CouponRecord {
            id: 7,
            code: "WELCOME10".to_string(),
            amount: 10.0,
        };
        let cart = summary(vec![line(1, 45.0, None)], Some(coupon));
        assert_eq!(cart.total(), 35.0);
    }

    #[test]
    fn total_clamps_at_zero() {
        let coupon = CouponRecord {
            id: 7,
            code: "BIG".to_string(),
            amount: 100.0,
        };
        let cart = summary(vec![line(1, 15.0, None)], Some(coupon));
        assert_eq!(cart.total(), 0.0);
    }

    #[test]
    fn empty_cart_reports_empty() {
        let cart = summary(vec![], None);
        assert!(cart.is_empty());
        assert_eq!(cart.total(), 0.0);
    }
}
