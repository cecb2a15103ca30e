use async_trait::async_trait;
use aws_sdk_dynamodb::Client;

use crate::models::ranked::RankedQueueEntry;
use crate::repositories::dynamo::{self, string_key, Item};
use crate::repositories::errors::RepositoryError;

#[cfg(test)]
use mockall::automock;

/// One entry per identity. `GSI_QueueByStatus` (partition `status`) lists
/// waiting entries for the pairing sweep.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn get_entry(&self, identity: &str) -> Result<Option<RankedQueueEntry>, RepositoryError>;

    /// Unconditional upsert, used for fresh waiting entries.
    async fn put_entry(&self, entry: &RankedQueueEntry) -> Result<(), RepositoryError>;

    /// Stores `entry` if the persisted copy is still at `expected_version`.
    async fn update_entry(
        &self,
        entry: &RankedQueueEntry,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;

    async fn delete_entry(&self, identity: &str) -> Result<(), RepositoryError>;

    async fn list_waiting(&self) -> Result<Vec<RankedQueueEntry>, RepositoryError>;
}

pub struct DynamoDbQueueRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbQueueRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    fn key(identity: &str) -> Item {
        [("identity".to_string(), string_key(identity))].into()
    }
}

#[async_trait]
impl QueueRepository for DynamoDbQueueRepository {
    async fn get_entry(&self, identity: &str) -> Result<Option<RankedQueueEntry>, RepositoryError> {
        dynamo::get(&self.client, &self.table_name, Self::key(identity)).await
    }

    async fn put_entry(&self, entry: &RankedQueueEntry) -> Result<(), RepositoryError> {
        dynamo::put(&self.client, &self.table_name, entry).await
    }

    async fn update_entry(
        &self,
        entry: &RankedQueueEntry,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        dynamo::put_versioned(&self.client, &self.table_name, entry, expected_version).await
    }

    async fn delete_entry(&self, identity: &str) -> Result<(), RepositoryError> {
        dynamo::delete(&self.client, &self.table_name, Self::key(identity)).await
    }

    async fn list_waiting(&self) -> Result<Vec<RankedQueueEntry>, RepositoryError> {
        dynamo::query_eq(
            &self.client,
            &self.table_name,
            Some("GSI_QueueByStatus"),
            "status",
            "waiting",
        )
        .await
    }
}
