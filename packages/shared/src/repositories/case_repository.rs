use async_trait::async_trait;
use aws_sdk_dynamodb::Client;

use crate::models::case::StoredCase;
use crate::repositories::dynamo::{self, string_key, Item};
use crate::repositories::errors::RepositoryError;

/// Generated case content, public and private halves together. Never read
/// straight into a response; projections decide what leaves the engine.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn put_case(&self, case: &StoredCase) -> Result<(), RepositoryError>;

    async fn get_case(&self, case_id: &str) -> Result<Option<StoredCase>, RepositoryError>;
}

pub struct DynamoDbCaseRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbCaseRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl CaseRepository for DynamoDbCaseRepository {
    async fn put_case(&self, case: &StoredCase) -> Result<(), RepositoryError> {
        dynamo::put_new(&self.client, &self.table_name, "case_id", case).await
    }

    async fn get_case(&self, case_id: &str) -> Result<Option<StoredCase>, RepositoryError> {
        let key: Item = [("case_id".to_string(), string_key(case_id))].into();
        dynamo::get(&self.client, &self.table_name, key).await
    }
}
