use async_trait::async_trait;
use aws_sdk_dynamodb::Client;

use crate::models::room::Room;
use crate::repositories::dynamo::{self, string_key, Item};
use crate::repositories::errors::RepositoryError;

/// Rooms keyed by their short code; `GSI_RoomById` resolves ids.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the room key is taken.
    async fn create_room(&self, room: &Room) -> Result<(), RepositoryError>;

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, RepositoryError>;

    async fn get_room_by_key(&self, room_key: &str) -> Result<Option<Room>, RepositoryError>;

    /// Stores `room` if the persisted copy is still at `expected_version`.
    async fn update_room(&self, room: &Room, expected_version: u64)
        -> Result<(), RepositoryError>;
}

pub struct DynamoDbRoomRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbRoomRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl RoomRepository for DynamoDbRoomRepository {
    async fn create_room(&self, room: &Room) -> Result<(), RepositoryError> {
        dynamo::put_new(&self.client, &self.table_name, "room_key", room).await
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, RepositoryError> {
        let rooms: Vec<Room> = dynamo::query_eq(
            &self.client,
            &self.table_name,
            Some("GSI_RoomById"),
            "room_id",
            room_id,
        )
        .await?;

        // The index is eventually consistent, re-read through the primary key.
        match rooms.into_iter().next() {
            Some(room) => self.get_room_by_key(&room.room_key).await,
            None => Ok(None),
        }
    }

    async fn get_room_by_key(&self, room_key: &str) -> Result<Option<Room>, RepositoryError> {
        let key: Item = [("room_key".to_string(), string_key(room_key))].into();
        dynamo::get(&self.client, &self.table_name, key).await
    }

    async fn update_room(
        &self,
        room: &Room,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        dynamo::put_versioned(&self.client, &self.table_name, room, expected_version).await
    }
}
