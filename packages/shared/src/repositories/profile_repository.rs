use async_trait::async_trait;
use aws_sdk_dynamodb::Client;

use crate::models::ranked::RankedProfile;
use crate::repositories::dynamo::{self, string_key, Item};
use crate::repositories::errors::RepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the identity already has a profile.
    async fn create_profile(&self, profile: &RankedProfile) -> Result<(), RepositoryError>;

    async fn get_profile(&self, identity: &str) -> Result<Option<RankedProfile>, RepositoryError>;

    async fn update_profile(
        &self,
        profile: &RankedProfile,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;

    /// Highest rated profiles first.
    async fn top_profiles(&self, limit: usize) -> Result<Vec<RankedProfile>, RepositoryError>;
}

pub struct DynamoDbProfileRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbProfileRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl ProfileRepository for DynamoDbProfileRepository {
    async fn create_profile(&self, profile: &RankedProfile) -> Result<(), RepositoryError> {
        dynamo::put_new(&self.client, &self.table_name, "identity", profile).await
    }

    async fn get_profile(&self, identity: &str) -> Result<Option<RankedProfile>, RepositoryError> {
        let key: Item = [("identity".to_string(), string_key(identity))].into();
        dynamo::get(&self.client, &self.table_name, key).await
    }

    async fn update_profile(
        &self,
        profile: &RankedProfile,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        dynamo::put_versioned(&self.client, &self.table_name, profile, expected_version).await
    }

    async fn top_profiles(&self, limit: usize) -> Result<Vec<RankedProfile>, RepositoryError> {
        // ToDo: move to a rating-sorted index once the profile table outgrows a scan
        let mut profiles: Vec<RankedProfile> = dynamo::scan(&self.client, &self.table_name).await?;
        profiles.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.created_at.cmp(&b.created_at)));
        profiles.truncate(limit);
        Ok(profiles)
    }
}
