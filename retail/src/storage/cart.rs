use crate::model::{CartSummary, GenericError, ModelId};
use async_trait::async_trait;

/// Mutations and reads of the user's draft order.
///
/// The cart is the single order row with `ordered = false`; every method
/// returns the refreshed summary so handlers render the result of the
/// mutation they just made.
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Add one unit of the item: creates the draft order and line on
    /// first contact, increments the quantity afterwards.
    async fn add_to_cart(&self, user_id: ModelId, slug: &str) -> Result<CartSummary, GenericError>;

    /// Drop the whole line for the item.
    async fn remove_from_cart(
        &self,
        user_id: ModelId,
        slug: &str,
    ) -> Result<CartSummary, GenericError>;

    /// Decrement the line by one; at quantity 1 the line is removed.
    async fn remove_single_from_cart(
        &self,
        user_id: ModelId,
        slug: &str,
    ) -> Result<CartSummary, GenericError>;

    async fn cart_summary(&self, user_id: ModelId) -> Result<CartSummary, GenericError>;

    /// Attach a coupon to the draft order by code.
    async fn apply_coupon(&self, user_id: ModelId, code: &str)
        -> Result<CartSummary, GenericError>;
}
