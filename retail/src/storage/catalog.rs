use crate::model::{
    CategoryRecord, GenericError, ItemRecord, ModelId, NewCategory, NewCoupon, NewItem, NewReview,
    ReviewRecord, StaleItem, StockAlert,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Catalog reads plus the merchandising writes the admin surface needs.
#[async_trait]
pub trait CatalogStorage: Send + Sync {
    /// Active items, newest first. Pages are zero-based.
    async fn list_items(&self, page: u64, per_page: u64) -> Result<Vec<ItemRecord>, GenericError>;

    /// Item by slug; inactive items are not visible here.
    async fn get_item(&self, slug: &str) -> Result<ItemRecord, GenericError>;

    async fn items_by_ids(&self, ids: &[ModelId]) -> Result<Vec<ItemRecord>, GenericError>;

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, GenericError>;

    /// Category by slug together with its active items.
    async fn get_category(
        &self,
        slug: &str,
    ) -> Result<(CategoryRecord, Vec<ItemRecord>), GenericError>;

    /// Substring search over title and both descriptions.
    async fn search_items(&self, query: &str) -> Result<Vec<ItemRecord>, GenericError>;

    async fn create_item(&self, item: &NewItem) -> Result<ItemRecord, GenericError>;

    async fn create_category(&self, category: &NewCategory)
        -> Result<CategoryRecord, GenericError>;

    async fn create_coupon(
        &self,
        coupon: &NewCoupon,
    ) -> Result<crate::model::CouponRecord, GenericError>;

    /// Duplicate the given items under fresh ids.
    async fn copy_items(&self, item_ids: &[ModelId]) -> Result<Vec<ItemRecord>, GenericError>;

    /// Items below the stock threshold, and items with no purchase since
    /// the cutoff.
    async fn stock_alerts(
        &self,
        low_stock_threshold: i32,
        stale_cutoff: NaiveDateTime,
    ) -> Result<(Vec<StockAlert>, Vec<StaleItem>), GenericError>;

    async fn add_review(&self, slug: &str, review: &NewReview)
        -> Result<ReviewRecord, GenericError>;

    /// Reviews for an item, newest first.
    async fn item_reviews(&self, slug: &str) -> Result<Vec<ReviewRecord>, GenericError>;
}
