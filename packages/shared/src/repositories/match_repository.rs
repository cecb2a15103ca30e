use async_trait::async_trait;
use aws_sdk_dynamodb::Client;

use crate::models::game_match::Match;
use crate::repositories::dynamo::{self, string_key, Item};
use crate::repositories::errors::RepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn create_match(&self, game_match: &Match) -> Result<(), RepositoryError>;

    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, RepositoryError>;

    /// Stores `game_match` if the persisted copy is still at `expected_version`.
    async fn update_match(
        &self,
        game_match: &Match,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;
}

pub struct DynamoDbMatchRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMatchRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl MatchRepository for DynamoDbMatchRepository {
    async fn create_match(&self, game_match: &Match) -> Result<(), RepositoryError> {
        dynamo::put_new(&self.client, &self.table_name, "match_id", game_match).await
    }

    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, RepositoryError> {
        let key: Item = [("match_id".to_string(), string_key(match_id))].into();
        dynamo::get(&self.client, &self.table_name, key).await
    }

    async fn update_match(
        &self,
        game_match: &Match,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        dynamo::put_versioned(&self.client, &self.table_name, game_match, expected_version).await
    }
}
