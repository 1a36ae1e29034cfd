use crate::model::{GenericError, ItemRevenueBucket, RevenueBucket};
use async_trait::async_trait;

/// Aggregate revenue reports over placed orders. All three are single
/// GROUP BY statements; sums use the item's list price.
#[async_trait]
pub trait RevenueStorage: Send + Sync {
    async fn daily_revenue(&self) -> Result<Vec<RevenueBucket>, GenericError>;

    async fn monthly_revenue(&self) -> Result<Vec<RevenueBucket>, GenericError>;

    async fn item_monthly_revenue(&self) -> Result<Vec<ItemRevenueBucket>, GenericError>;
}
