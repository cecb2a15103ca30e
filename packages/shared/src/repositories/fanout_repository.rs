use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::error::SdkError;
use aws_sdk_apigatewaymanagement::{primitives::Blob, Client as ApiGatewayClient};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

pub fn room_channel(room_id: &str) -> String {
    format!("room:{}", room_id)
}

pub fn match_channel(match_id: &str) -> String {
    format!("match:{}", match_id)
}

pub fn player_channel(identity: &str) -> String {
    format!("player:{}", identity)
}

/// Push side of the real-time fan-out. Best effort: callers log failures and
/// carry on, the persisted record stays the only source of truth.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        channel_key: &str,
        event_name: &str,
        payload: &Value,
    ) -> Result<(), PublishError>;
}

/// Sends events to every WebSocket connection subscribed to a channel.
/// Subscriptions live in the connections table: partition `channel_key`,
/// sort `connection_id`.
pub struct ApiGatewayEventPublisher {
    dynamodb_client: DynamoDbClient,
    api_gateway_client: ApiGatewayClient,
    table_name: String,
}

impl ApiGatewayEventPublisher {
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        dynamodb_client: DynamoDbClient,
        table_name: &str,
        endpoint: &str,
    ) -> Self {
        let api_gateway_config = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config)
            .endpoint_url(endpoint)
            .build();

        Self {
            dynamodb_client,
            api_gateway_client: ApiGatewayClient::from_conf(api_gateway_config),
            table_name: table_name.to_string(),
        }
    }

    async fn connection_ids(&self, channel_key: &str) -> Result<Vec<String>, PublishError> {
        let result = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("channel_key = :channel_key")
            .expression_attribute_values(":channel_key", AttributeValue::S(channel_key.to_string()))
            .send()
            .await?;

        let ids = result
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| match item.get("connection_id") {
                Some(AttributeValue::S(connection_id)) => Some(connection_id.clone()),
                _ => None,
            })
            .collect();

        Ok(ids)
    }

    async fn remove_connection(&self, channel_key: &str, connection_id: &str) -> Result<(), PublishError> {
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .key("channel_key", AttributeValue::S(channel_key.to_string()))
            .key("connection_id", AttributeValue::S(connection_id.to_string()))
            .send()
            .await?;

        info!("Pruned stale connection {} from {}", connection_id, channel_key);
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for ApiGatewayEventPublisher {
    async fn publish(
        &self,
        channel_key: &str,
        event_name: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        let message = json!({
            "channel": channel_key,
            "event": event_name,
            "payload": payload,
        })
        .to_string();

        for connection_id in self.connection_ids(channel_key).await? {
            let result = self
                .api_gateway_client
                .post_to_connection()
                .connection_id(&connection_id)
                .data(Blob::new(message.as_bytes()))
                .send()
                .await;

            match result {
                Ok(_) => debug!("Sent {} to connection {}", event_name, connection_id),
                Err(SdkError::ServiceError(service_err)) if service_err.err().is_gone_exception() => {
                    self.remove_connection(channel_key, &connection_id).await?;
                }
                Err(e) => warn!("Failed to post {} to {}: {}", event_name, connection_id, e),
            }
        }

        Ok(())
    }
}

/// Publisher for local runs without a push channel; events only reach the log.
#[derive(Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(
        &self,
        channel_key: &str,
        event_name: &str,
        _payload: &Value,
    ) -> Result<(), PublishError> {
        debug!("Event {} on {}", event_name, channel_key);
        Ok(())
    }
}
