use crate::model::{
    AddressRecord, CheckoutRequest, GenericError, ModelId, OrderRecord, PaymentRecord,
    RefundRecord, RefundRequest,
};
use async_trait::async_trait;

/// Order lifecycle: checkout, payment, delivery, receipt, refunds.
#[async_trait]
pub trait OrderStorage: Send + Sync {
    /// Record shipping/billing addresses against the active cart.
    /// Fails when the cart is empty or a requested default is missing.
    async fn checkout(&self, request: &CheckoutRequest) -> Result<OrderRecord, GenericError>;

    /// Finalize the active cart after a successful charge: insert the
    /// payment, assign a ref code, flip `ordered`, decrement stock
    /// atomically and stamp each item's last purchase date. The whole
    /// operation is one database transaction.
    async fn record_payment(
        &self,
        user_id: ModelId,
        charge_id: &str,
        amount: f64,
    ) -> Result<OrderRecord, GenericError>;

    /// Customer confirms receipt of a delivered order.
    async fn confirm_received(
        &self,
        user_id: ModelId,
        ref_code: &str,
    ) -> Result<OrderRecord, GenericError>;

    /// Customer asks for a refund on a placed order.
    async fn request_refund(&self, refund: &RefundRequest) -> Result<RefundRecord, GenericError>;

    /// Admin bulk action: grant the requested refunds and restore the
    /// decremented stock. Returns how many orders were updated.
    async fn accept_refunds(&self, order_ids: &[ModelId]) -> Result<u64, GenericError>;

    /// Admin bulk action: flag orders as out for delivery.
    async fn mark_delivered(&self, order_ids: &[ModelId]) -> Result<u64, GenericError>;

    async fn orders_by_ids(&self, ids: &[ModelId]) -> Result<Vec<OrderRecord>, GenericError>;

    /// Placed orders for a user, newest first.
    async fn user_orders(&self, user_id: ModelId) -> Result<Vec<OrderRecord>, GenericError>;

    async fn addresses_by_ids(&self, ids: &[ModelId])
        -> Result<Vec<AddressRecord>, GenericError>;

    async fn payments_by_ids(&self, ids: &[ModelId])
        -> Result<Vec<PaymentRecord>, GenericError>;
}
