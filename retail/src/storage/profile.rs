use crate::model::{GenericError, ModelId, ProfileRecord, ProfileUpdate};
use async_trait::async_trait;

#[async_trait]
pub trait ProfileStorage: Send + Sync {
    async fn get_profile(&self, user_id: ModelId) -> Result<ProfileRecord, GenericError>;

    /// Upsert the profile row; absent fields keep their value.
    async fn update_profile(
        &self,
        user_id: ModelId,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, GenericError>;
}
