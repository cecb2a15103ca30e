use async_trait::async_trait;
use aws_sdk_dynamodb::Client;

use crate::models::membership::Membership;
use crate::repositories::dynamo;
use crate::repositories::errors::RepositoryError;

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Idempotent: recording the same (identity, record) twice keeps one row.
    async fn record_membership(&self, membership: &Membership) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list_memberships(&self, identity: &str) -> Result<Vec<Membership>, RepositoryError>;
}

pub struct DynamoDbMembershipRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMembershipRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl MembershipRepository for DynamoDbMembershipRepository {
    async fn record_membership(&self, membership: &Membership) -> Result<(), RepositoryError> {
        dynamo::put(&self.client, &self.table_name, membership).await
    }

    async fn list_memberships(&self, identity: &str) -> Result<Vec<Membership>, RepositoryError> {
        let mut memberships: Vec<Membership> =
            dynamo::query_eq(&self.client, &self.table_name, None, "identity", identity).await?;
        memberships.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(memberships)
    }
}
