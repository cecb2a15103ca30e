use std::sync::Arc;

use aws_lambda_events::event::dynamodb::Event;
use lambda_runtime::Error;
use serde_dynamo::aws_sdk_dynamodb_1::from_item;
use shared::models::ranked::{QueueStatus, RankedQueueEntry};
use shared::services::matchmaking_service::MatchmakingService;
use tracing::{debug, error, info, warn};

/// Identity to pair when a stream record shows an entry that has just become
/// waiting: a fresh join, a rejoin after a finished match, or a reservation
/// released by a lost race.
pub fn entered_waiting(
    event_name: &str,
    old: Option<&RankedQueueEntry>,
    new: Option<&RankedQueueEntry>,
) -> Option<String> {
    let new = new.filter(|entry| entry.status == QueueStatus::Waiting)?;
    match event_name {
        "INSERT" => Some(new.identity.clone()),
        "MODIFY" if old.map(|entry| entry.status) != Some(QueueStatus::Waiting) => {
            Some(new.identity.clone())
        }
        _ => None,
    }
}

fn decode(image: serde_dynamo::Item) -> Option<RankedQueueEntry> {
    from_item(image.into()).ok()
}

#[derive(Clone)]
pub struct MatchmakingProcessor {
    matchmaking: Arc<MatchmakingService>,
}

impl MatchmakingProcessor {
    pub fn new(matchmaking: Arc<MatchmakingService>) -> Self {
        Self { matchmaking }
    }

    pub async fn process_event(&self, event: Event) -> Result<(), Error> {
        debug!("Processing {} queue records", event.records.len());

        for record in event.records {
            let event_name = record.event_name.clone();
            let old = decode(record.change.old_image);
            let new = decode(record.change.new_image);

            match entered_waiting(&event_name, old.as_ref(), new.as_ref()) {
                Some(identity) => self.pair(&identity).await,
                None if event_name == "REMOVE" => {
                    if let Some(entry) = old {
                        info!("{} left the ranked queue", entry.identity);
                    }
                }
                None => debug!("Ignoring {} record", event_name),
            }
        }

        Ok(())
    }

    /// Failures stay in the logs; the entry keeps waiting for the next join
    /// to pick it up.
    pub async fn pair(&self, identity: &str) {
        match self.matchmaking.find_and_match_opponent(identity).await {
            Ok(Some(game_match)) => {
                let players: Vec<&str> = game_match
                    .players
                    .iter()
                    .map(|player| player.identity.as_str())
                    .collect();
                info!("Match {} created for {:?}", game_match.match_id, players);
            }
            Ok(None) => {
                info!("No opponent yet for {}, staying in the queue", identity);
            }
            Err(e) => {
                error!("Matchmaking error for {}: {}", identity, e);
            }
        }
    }
}
