use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::repositories::fanout_repository::EventPublisher;

/// Fire-and-forget wrapper around the fan-out. The persisted record is the
/// only source of truth, so a failed publish is logged and dropped.
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn EventPublisher>,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Notifier { publisher }
    }

    pub async fn notify<T: Serialize>(&self, channel_key: &str, event_name: &str, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Could not serialize {} for {}: {}", event_name, channel_key, e);
                return;
            }
        };
        if let Err(e) = self.publisher.publish(channel_key, event_name, &payload).await {
            warn!("Publishing {} to {} failed: {}", event_name, channel_key, e);
        }
    }
}
