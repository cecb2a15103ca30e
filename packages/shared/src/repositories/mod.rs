pub mod case_repository;
pub mod dynamo;
pub mod errors;
pub mod fanout_repository;
pub mod match_repository;
pub mod membership_repository;
pub mod memory_repository;
pub mod profile_repository;
pub mod queue_repository;
pub mod room_repository;

use std::sync::Arc;

use aws_sdk_dynamodb::Client;

use crate::config::AppConfig;
use case_repository::{CaseRepository, DynamoDbCaseRepository};
use match_repository::{DynamoDbMatchRepository, MatchRepository};
use membership_repository::{DynamoDbMembershipRepository, MembershipRepository};
use memory_repository::InMemoryStore;
use profile_repository::{DynamoDbProfileRepository, ProfileRepository};
use queue_repository::{DynamoDbQueueRepository, QueueRepository};
use room_repository::{DynamoDbRoomRepository, RoomRepository};

/// Storage handles injected into the services.
#[derive(Clone)]
pub struct Repositories {
    pub rooms: Arc<dyn RoomRepository>,
    pub matches: Arc<dyn MatchRepository>,
    pub cases: Arc<dyn CaseRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub queue: Arc<dyn QueueRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
}

impl Repositories {
    pub fn dynamodb(client: Client, config: &AppConfig) -> Self {
        Repositories {
            rooms: Arc::new(DynamoDbRoomRepository::new(client.clone(), &config.rooms_table)),
            matches: Arc::new(DynamoDbMatchRepository::new(client.clone(), &config.matches_table)),
            cases: Arc::new(DynamoDbCaseRepository::new(client.clone(), &config.cases_table)),
            profiles: Arc::new(DynamoDbProfileRepository::new(client.clone(), &config.profiles_table)),
            queue: Arc::new(DynamoDbQueueRepository::new(client.clone(), &config.queue_table)),
            memberships: Arc::new(DynamoDbMembershipRepository::new(
                client,
                &config.memberships_table,
            )),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Repositories {
            rooms: store.clone(),
            matches: store.clone(),
            cases: store.clone(),
            profiles: store.clone(),
            queue: store.clone(),
            memberships: store,
        }
    }
}
