use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::Row;
use tracing::debug;

use crate::registry::{AddressRows, ItemRows, OrderRows, PaymentRows};
use retail::model::{GenericError, ModelId};
use retail::storage::AdminQuery;
use retail::ui_model::{build_query, FilterRequest};

/// Admin filter queries over a raw sqlx pool.
///
/// The compiled statements use PostgreSQL placeholders and arrays, so
/// this storage is Postgres-only; deployments share the database with
/// [`crate::shop_storage::ProdShopStorage`].
pub struct AdminQueryStorage {
    pub pool: sqlx::PgPool,
}

impl AdminQueryStorage {
    pub async fn new(database_url: &str) -> Result<Self, GenericError> {
        let pool = sqlx::PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    async fn fetch_ids(
        &self,
        query: String,
        args: PgArguments,
    ) -> Result<Vec<ModelId>, GenericError> {
        debug!("Executing filter query: {}", query);

        sqlx::query_with(&query, args)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| Ok(row.try_get(0)?))
            .collect::<Result<Vec<_>, GenericError>>()
    }
}

#[async_trait]
impl AdminQuery for AdminQueryStorage {
    async fn filter_order_ids(
        &self,
        request: &FilterRequest,
    ) -> Result<Vec<ModelId>, GenericError> {
        let (query, args) = build_query::<OrderRows>(request)?;
        self.fetch_ids(query, args).await
    }

    async fn filter_item_ids(&self, request: &FilterRequest) -> Result<Vec<ModelId>, GenericError> {
        let (query, args) = build_query::<ItemRows>(request)?;
        self.fetch_ids(query, args).await
    }

    async fn filter_address_ids(
        &self,
        request: &FilterRequest,
    ) -> Result<Vec<ModelId>, GenericError> {
        let (query, args) = build_query::<AddressRows>(request)?;
        self.fetch_ids(query, args).await
    }

    async fn filter_payment_ids(
        &self,
        request: &FilterRequest,
    ) -> Result<Vec<ModelId>, GenericError> {
        let (query, args) = build_query::<PaymentRows>(request)?;
        self.fetch_ids(query, args).await
    }
}
