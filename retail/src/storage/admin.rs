use crate::model::{GenericError, ModelId};
use crate::ui_model::FilterRequest;
use async_trait::async_trait;

/// Declarative list/filter/search queries for the admin screens.
///
/// Implementations compile the request with the workspace query builder
/// and return matching root ids; callers hydrate them through the
/// regular storage traits.
#[async_trait]
pub trait AdminQuery: Send + Sync {
    async fn filter_order_ids(&self, request: &FilterRequest)
        -> Result<Vec<ModelId>, GenericError>;

    async fn filter_item_ids(&self, request: &FilterRequest) -> Result<Vec<ModelId>, GenericError>;

    async fn filter_address_ids(
        &self,
        request: &FilterRequest,
    ) -> Result<Vec<ModelId>, GenericError>;

    async fn filter_payment_ids(
        &self,
        request: &FilterRequest,
    ) -> Result<Vec<ModelId>, GenericError>;
}
