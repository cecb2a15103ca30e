//! Process-local implementations of every repository trait, with the same
//! conditional-write semantics as the DynamoDB tables. Backs tests and
//! `STORE_BACKEND=memory` runs. Records past their `expires_at` are swept on
//! the next write to the same table, standing in for DynamoDB's TTL reaper.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::models::case::StoredCase;
use crate::models::game_match::Match;
use crate::models::membership::Membership;
use crate::models::ranked::{QueueStatus, RankedProfile, RankedQueueEntry};
use crate::models::room::Room;
use crate::repositories::case_repository::CaseRepository;
use crate::repositories::errors::RepositoryError;
use crate::repositories::fanout_repository::{EventPublisher, PublishError};
use crate::repositories::match_repository::MatchRepository;
use crate::repositories::membership_repository::MembershipRepository;
use crate::repositories::profile_repository::ProfileRepository;
use crate::repositories::queue_repository::QueueRepository;
use crate::repositories::room_repository::RoomRepository;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked writer cannot leave a half-applied document behind: every
    // write is a single insert.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn check_version(stored: Option<u64>, expected: u64) -> Result<(), RepositoryError> {
    match stored {
        None => Err(RepositoryError::NotFound),
        Some(version) if version != expected => Err(RepositoryError::VersionConflict),
        Some(_) => Ok(()),
    }
}

/// Drops every record whose TTL attribute lies in the past.
fn evict_expired<K, T>(records: &mut HashMap<K, T>, expires_at: impl Fn(&T) -> i64) {
    let now = Utc::now().timestamp();
    records.retain(|_, record| expires_at(record) >= now);
}

#[derive(Default)]
pub struct InMemoryStore {
    rooms: Mutex<HashMap<String, Room>>,
    matches: Mutex<HashMap<String, Match>>,
    cases: Mutex<HashMap<String, StoredCase>>,
    profiles: Mutex<HashMap<String, RankedProfile>>,
    queue: Mutex<HashMap<String, RankedQueueEntry>>,
    memberships: Mutex<HashMap<(String, String), Membership>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn create_room(&self, room: &Room) -> Result<(), RepositoryError> {
        let mut rooms = lock(&self.rooms);
        evict_expired(&mut *rooms, |room| room.expires_at);
        if rooms.contains_key(&room.room_key) {
            return Err(RepositoryError::AlreadyExists);
        }
        rooms.insert(room.room_key.clone(), room.clone());
        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, RepositoryError> {
        Ok(lock(&self.rooms)
            .values()
            .find(|room| room.room_id == room_id)
            .cloned())
    }

    async fn get_room_by_key(&self, room_key: &str) -> Result<Option<Room>, RepositoryError> {
        Ok(lock(&self.rooms).get(room_key).cloned())
    }

    async fn update_room(
        &self,
        room: &Room,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut rooms = lock(&self.rooms);
        check_version(rooms.get(&room.room_key).map(|r| r.version), expected_version)?;
        rooms.insert(room.room_key.clone(), room.clone());
        Ok(())
    }
}

#[async_trait]
impl MatchRepository for InMemoryStore {
    async fn create_match(&self, game_match: &Match) -> Result<(), RepositoryError> {
        let mut matches = lock(&self.matches);
        if matches.contains_key(&game_match.match_id) {
            return Err(RepositoryError::AlreadyExists);
        }
        matches.insert(game_match.match_id.clone(), game_match.clone());
        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, RepositoryError> {
        Ok(lock(&self.matches).get(match_id).cloned())
    }

    async fn update_match(
        &self,
        game_match: &Match,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut matches = lock(&self.matches);
        check_version(
            matches.get(&game_match.match_id).map(|m| m.version),
            expected_version,
        )?;
        matches.insert(game_match.match_id.clone(), game_match.clone());
        Ok(())
    }
}

#[async_trait]
impl CaseRepository for InMemoryStore {
    async fn put_case(&self, case: &StoredCase) -> Result<(), RepositoryError> {
        let mut cases = lock(&self.cases);
        evict_expired(&mut *cases, |case| case.expires_at);
        if cases.contains_key(&case.case_id) {
            return Err(RepositoryError::AlreadyExists);
        }
        cases.insert(case.case_id.clone(), case.clone());
        Ok(())
    }

    async fn get_case(&self, case_id: &str) -> Result<Option<StoredCase>, RepositoryError> {
        Ok(lock(&self.cases).get(case_id).cloned())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn create_profile(&self, profile: &RankedProfile) -> Result<(), RepositoryError> {
        let mut profiles = lock(&self.profiles);
        if profiles.contains_key(&profile.identity) {
            return Err(RepositoryError::AlreadyExists);
        }
        profiles.insert(profile.identity.clone(), profile.clone());
        Ok(())
    }

    async fn get_profile(&self, identity: &str) -> Result<Option<RankedProfile>, RepositoryError> {
        Ok(lock(&self.profiles).get(identity).cloned())
    }

    async fn update_profile(
        &self,
        profile: &RankedProfile,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut profiles = lock(&self.profiles);
        check_version(
            profiles.get(&profile.identity).map(|p| p.version),
            expected_version,
        )?;
        profiles.insert(profile.identity.clone(), profile.clone());
        Ok(())
    }

    async fn top_profiles(&self, limit: usize) -> Result<Vec<RankedProfile>, RepositoryError> {
        let mut profiles: Vec<RankedProfile> = lock(&self.profiles).values().cloned().collect();
        profiles.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.created_at.cmp(&b.created_at)));
        profiles.truncate(limit);
        Ok(profiles)
    }
}

#[async_trait]
impl QueueRepository for InMemoryStore {
    async fn get_entry(&self, identity: &str) -> Result<Option<RankedQueueEntry>, RepositoryError> {
        Ok(lock(&self.queue).get(identity).cloned())
    }

    async fn put_entry(&self, entry: &RankedQueueEntry) -> Result<(), RepositoryError> {
        let mut queue = lock(&self.queue);
        evict_expired(&mut *queue, |entry| entry.expires_at);
        queue.insert(entry.identity.clone(), entry.clone());
        Ok(())
    }

    async fn update_entry(
        &self,
        entry: &RankedQueueEntry,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut queue = lock(&self.queue);
        check_version(queue.get(&entry.identity).map(|e| e.version), expected_version)?;
        queue.insert(entry.identity.clone(), entry.clone());
        Ok(())
    }

    async fn delete_entry(&self, identity: &str) -> Result<(), RepositoryError> {
        lock(&self.queue).remove(identity);
        Ok(())
    }

    async fn list_waiting(&self) -> Result<Vec<RankedQueueEntry>, RepositoryError> {
        Ok(lock(&self.queue)
            .values()
            .filter(|entry| entry.status == QueueStatus::Waiting)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn record_membership(&self, membership: &Membership) -> Result<(), RepositoryError> {
        lock(&self.memberships).insert(
            (membership.identity.clone(), membership.record_key.clone()),
            membership.clone(),
        );
        Ok(())
    }

    async fn list_memberships(&self, identity: &str) -> Result<Vec<Membership>, RepositoryError> {
        let mut memberships: Vec<Membership> = lock(&self.memberships)
            .values()
            .filter(|membership| membership.identity == identity)
            .cloned()
            .collect();
        memberships.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(memberships)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub channel_key: String,
    pub event_name: String,
    pub payload: Value,
}

/// Keeps every published event so tests can assert on the fan-out.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<PublishedEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        lock(&self.events).clone()
    }

    pub fn events_named(&self, event_name: &str) -> Vec<PublishedEvent> {
        lock(&self.events)
            .iter()
            .filter(|event| event.event_name == event_name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        channel_key: &str,
        event_name: &str,
        payload: &Value,
    ) -> Result<(), PublishError> {
        lock(&self.events).push(PublishedEvent {
            channel_key: channel_key.to_string(),
            event_name: event_name.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::room::RoomSettings;
    use chrono::Utc;

    #[tokio::test]
    async fn test_room_key_uniqueness() {
        let store = InMemoryStore::new();
        let room = Room::new("KEY234", "host", RoomSettings::default(), Utc::now());
        store.create_room(&room).await.unwrap();

        let clash = Room::new("KEY234", "other", RoomSettings::default(), Utc::now());
        assert_eq!(
            store.create_room(&clash).await,
            Err(RepositoryError::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = InMemoryStore::new();
        let mut room = Room::new("KEY234", "host", RoomSettings::default(), Utc::now());
        store.create_room(&room).await.unwrap();

        room.version = 1;
        store.update_room(&room, 0).await.unwrap();

        // A second writer still holding version 0 loses.
        assert_eq!(
            store.update_room(&room, 0).await,
            Err(RepositoryError::VersionConflict)
        );
        let fetched = store.get_room(&room.room_id).await.unwrap().unwrap();
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn test_update_of_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let room = Room::new("KEY234", "host", RoomSettings::default(), Utc::now());
        assert_eq!(
            store.update_room(&room, 0).await,
            Err(RepositoryError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_expired_records_are_swept_on_write() {
        let store = InMemoryStore::new();
        let mut abandoned = Room::new("OLD234", "host", RoomSettings::default(), Utc::now());
        abandoned.expires_at = Utc::now().timestamp() - 1;
        store.create_room(&abandoned).await.unwrap();
        let live = Room::new("NEW234", "host", RoomSettings::default(), Utc::now());
        store.create_room(&live).await.unwrap();

        assert!(store.get_room_by_key("OLD234").await.unwrap().is_none());
        assert!(store.get_room_by_key("NEW234").await.unwrap().is_some());

        // The code of an expired room can be handed out again.
        let reused = Room::new("OLD234", "other", RoomSettings::default(), Utc::now());
        store.create_room(&reused).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_queue_entries_are_swept_on_write() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let mut gone = RankedQueueEntry::new(&RankedProfile::new("gone", now), now);
        gone.expires_at = now.timestamp() - 1;
        store.put_entry(&gone).await.unwrap();
        let fresh = RankedQueueEntry::new(&RankedProfile::new("fresh", now), now);
        store.put_entry(&fresh).await.unwrap();

        let waiting = store.list_waiting().await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].identity, "fresh");
    }

    #[tokio::test]
    async fn test_recording_publisher_filters_by_name() {
        let publisher = RecordingEventPublisher::new();
        publisher
            .publish("room:1", "ready_changed", &Value::Null)
            .await
            .unwrap();
        publisher
            .publish("room:1", "participants_changed", &Value::Null)
            .await
            .unwrap();
        assert_eq!(publisher.events().len(), 2);
        assert_eq!(publisher.events_named("ready_changed").len(), 1);
    }
}
