use std::sync::Arc;

use tracing::{info, warn};

use crate::models::game_match::{Match, PlayerResult};
use crate::models::ranked::{QueueStatus, RankedQueueEntry};
use crate::models::views::QueueView;
use crate::repositories::errors::RepositoryError;
use crate::repositories::fanout_repository::player_channel;
use crate::repositories::Repositories;
use crate::services::clock::Clock;
use crate::services::errors::GameError;
use crate::services::match_service::MatchService;
use crate::services::notifier::Notifier;
use crate::services::projection;
use crate::services::ranked_service::RankedService;
use crate::services::rating::ranked_params;
use crate::services::session_service::issue_token;

/// Nearest rating first; among equals, whoever has waited longest.
pub fn select_best_opponent<'a>(
    candidates: &'a [RankedQueueEntry],
    rating: i32,
) -> Option<&'a RankedQueueEntry> {
    candidates
        .iter()
        .min_by_key(|candidate| ((candidate.rating - rating).abs(), candidate.joined_at))
}

#[derive(Clone)]
pub struct MatchmakingService {
    repositories: Repositories,
    ranked: Arc<RankedService>,
    matches: Arc<MatchService>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl MatchmakingService {
    pub fn new(
        repositories: Repositories,
        ranked: Arc<RankedService>,
        matches: Arc<MatchService>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        MatchmakingService {
            repositories,
            ranked,
            matches,
            notifier,
            clock,
        }
    }

    /// Puts `identity` in the ranked queue. Re-joining while waiting or
    /// already matched returns the current entry unchanged.
    pub async fn join_queue(&self, identity: &str) -> Result<QueueView, GameError> {
        let profile = self.ranked.get_or_create_profile(identity).await?;
        let now = self.clock.now();

        if let Some(entry) = self.repositories.queue.get_entry(identity).await? {
            match entry.status {
                QueueStatus::Matched => return self.matched_view(&entry).await,
                QueueStatus::Waiting if !entry.is_stale(now) => {
                    return Ok(projection::queue_view(&entry, None));
                }
                _ => {}
            }
        }

        let entry = RankedQueueEntry::new(&profile, now);
        self.repositories.queue.put_entry(&entry).await?;
        info!("{} joined the ranked queue at {}", identity, entry.rating);
        Ok(projection::queue_view(&entry, None))
    }

    pub async fn leave_queue(&self, identity: &str) -> Result<(), GameError> {
        let entry = self
            .repositories
            .queue
            .get_entry(identity)
            .await?
            .ok_or_else(|| GameError::NotFound("Queue entry".to_string()))?;
        if entry.status == QueueStatus::Matched {
            return Err(GameError::InvalidState(
                "already matched, finish the match instead".to_string(),
            ));
        }
        self.repositories.queue.delete_entry(identity).await?;
        info!("{} left the ranked queue", identity);
        Ok(())
    }

    pub async fn queue_status(&self, identity: &str) -> Result<QueueView, GameError> {
        let entry = self
            .repositories
            .queue
            .get_entry(identity)
            .await?
            .filter(|entry| entry.status != QueueStatus::Waiting || !entry.is_stale(self.clock.now()))
            .ok_or_else(|| GameError::NotFound("Queue entry".to_string()))?;
        match entry.status {
            QueueStatus::Matched => self.matched_view(&entry).await,
            _ => Ok(projection::queue_view(&entry, None)),
        }
    }

    /// Pairs a waiting player with the closest-rated waiting opponent. Both
    /// entries are claimed with conditional writes, so concurrent sweeps
    /// never seat one player twice.
    pub async fn find_and_match_opponent(&self, identity: &str) -> Result<Option<Match>, GameError> {
        let now = self.clock.now();
        let Some(entry) = self.repositories.queue.get_entry(identity).await? else {
            return Ok(None);
        };
        if !entry.is_waiting(now) {
            return Ok(None);
        }

        let mut candidates: Vec<RankedQueueEntry> = self
            .repositories
            .queue
            .list_waiting()
            .await?
            .into_iter()
            .filter(|candidate| candidate.identity != identity && candidate.is_waiting(now))
            .collect();

        while let Some(opponent) = select_best_opponent(&candidates, entry.rating).cloned() {
            candidates.retain(|candidate| candidate.identity != opponent.identity);
            let match_id = uuid::Uuid::new_v4().to_string();

            let Some(reserved_opponent) = self.reserve(&opponent, &match_id).await? else {
                continue;
            };
            let Some(reserved_self) = self.reserve(&entry, &match_id).await? else {
                self.release(&reserved_opponent).await;
                return Ok(None);
            };

            let game_match = self.create_match(&match_id, &reserved_self, &reserved_opponent).await?;
            return Ok(Some(game_match));
        }
        Ok(None)
    }

    async fn create_match(
        &self,
        match_id: &str,
        first: &RankedQueueEntry,
        second: &RankedQueueEntry,
    ) -> Result<Match, GameError> {
        let players = [first, second]
            .iter()
            .map(|entry| {
                let mut player = PlayerResult::new(&entry.identity, &entry.alias, None, &issue_token());
                player.rating_before = Some(entry.rating);
                player
            })
            .collect();
        let params = ranked_params(first.rating, second.rating);
        let game_match = Match::ranked(match_id, players, params, self.clock.now());
        self.matches.register_match(&game_match).await?;
        info!(
            "Paired {} ({}) with {} ({}) in match {}",
            first.identity, first.rating, second.identity, second.rating, match_id
        );

        for entry in [first, second] {
            self.notifier
                .notify(
                    &player_channel(&entry.identity),
                    "queue_matched",
                    &serde_json::json!({ "match_id": match_id }),
                )
                .await;
        }

        match self.matches.run_generation(match_id).await {
            Ok(game_match) => Ok(game_match),
            Err(e) => {
                warn!("Match {} is waiting for a case: {}", match_id, e);
                Ok(game_match)
            }
        }
    }

    /// Claims a waiting entry for `match_id`. `None` when someone else got
    /// there first.
    async fn reserve(&self, entry: &RankedQueueEntry, match_id: &str) -> Result<Option<RankedQueueEntry>, GameError> {
        let mut reserved = entry.clone();
        reserved.status = QueueStatus::Matched;
        reserved.match_id = Some(match_id.to_string());
        reserved.version = entry.version + 1;
        match self.repositories.queue.update_entry(&reserved, entry.version).await {
            Ok(()) => Ok(Some(reserved)),
            Err(RepositoryError::VersionConflict) | Err(RepositoryError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn release(&self, reserved: &RankedQueueEntry) {
        let mut released = reserved.clone();
        released.status = QueueStatus::Waiting;
        released.match_id = None;
        released.version = reserved.version + 1;
        if let Err(e) = self.repositories.queue.update_entry(&released, reserved.version).await {
            warn!("Could not release queue entry of {}: {}", reserved.identity, e);
        }
    }

    async fn matched_view(&self, entry: &RankedQueueEntry) -> Result<QueueView, GameError> {
        let token = match entry.match_id.as_deref() {
            Some(match_id) => self
                .repositories
                .matches
                .get_match(match_id)
                .await?
                .and_then(|game_match| {
                    game_match
                        .player(&entry.identity)
                        .map(|player| player.session_token.clone())
                }),
            None => None,
        };
        Ok(projection::queue_view(entry, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COUNTDOWN_MS, QUEUE_TTL_SECS};
    use crate::models::game_match::{MatchMode, MatchStatus};
    use crate::models::ranked::{RankedProfile, Tier};
    use crate::services::test_support::Harness;
    use chrono::{Duration, Utc};

    fn entry(identity: &str, rating: i32, waited_secs: i64) -> RankedQueueEntry {
        let now = Utc::now();
        let mut entry = RankedQueueEntry::new(&RankedProfile::new(identity, now), now);
        entry.rating = rating;
        entry.joined_at = now - Duration::seconds(waited_secs);
        entry
    }

    #[test]
    fn test_nearest_rating_then_longest_wait() {
        let candidates = vec![
            entry("far", 1500, 600),
            entry("close-new", 1250, 10),
            entry("close-old", 1150, 90),
        ];
        let best = select_best_opponent(&candidates, 1200).unwrap();
        assert_eq!(best.identity, "close-old");
        assert!(select_best_opponent(&[], 1200).is_none());
    }

    #[tokio::test]
    async fn test_join_queue_is_idempotent() {
        let harness = Harness::new();
        let matchmaking = &harness.services.matchmaking;

        let first = matchmaking.join_queue("alice").await.unwrap();
        assert_eq!(first.status, QueueStatus::Waiting);
        assert_eq!(first.rating, 1200);
        assert_eq!(first.tier, Tier::Silver);
        assert!(first.session_token.is_none());

        harness.advance_ms(1_000);
        let again = matchmaking.join_queue("alice").await.unwrap();
        assert_eq!(again, first);
        assert_eq!(matchmaking.queue_status("alice").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_leave_queue() {
        let harness = Harness::new();
        let matchmaking = &harness.services.matchmaking;
        matchmaking.join_queue("alice").await.unwrap();

        matchmaking.leave_queue("alice").await.unwrap();
        let status = matchmaking.queue_status("alice").await;
        assert_eq!(status, Err(GameError::NotFound("Queue entry".to_string())));
        let again = matchmaking.leave_queue("alice").await;
        assert!(matches!(again, Err(GameError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lonely_or_stale_entries_are_not_paired() {
        let harness = Harness::new();
        let matchmaking = &harness.services.matchmaking;
        matchmaking.join_queue("alice").await.unwrap();
        assert!(matchmaking.find_and_match_opponent("alice").await.unwrap().is_none());
        assert!(matchmaking.find_and_match_opponent("nobody").await.unwrap().is_none());

        harness.advance_ms((QUEUE_TTL_SECS + 1) * 1000);
        matchmaking.join_queue("bob").await.unwrap();
        assert!(matchmaking.find_and_match_opponent("bob").await.unwrap().is_none());
        assert!(matches!(
            matchmaking.queue_status("alice").await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pairing_creates_a_ranked_match() {
        let harness = Harness::new();
        let matchmaking = &harness.services.matchmaking;
        matchmaking.join_queue("alice").await.unwrap();
        matchmaking.join_queue("bob").await.unwrap();

        let game_match = matchmaking
            .find_and_match_opponent("bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(game_match.mode, MatchMode::Ranked);
        assert_eq!(game_match.status, MatchStatus::Countdown);
        assert!(game_match.room_id.is_none());
        assert!(game_match
            .players
            .iter()
            .all(|player| player.rating_before == Some(1200)));
        assert_eq!(harness.publisher.events_named("queue_matched").len(), 2);

        let status = matchmaking.queue_status("alice").await.unwrap();
        assert_eq!(status.status, QueueStatus::Matched);
        assert_eq!(status.match_id.as_deref(), Some(game_match.match_id.as_str()));
        let token = &game_match.player("alice").unwrap().session_token;
        assert_eq!(status.session_token.as_ref(), Some(token));

        // Re-joining while matched hands back the same seat.
        assert_eq!(matchmaking.join_queue("alice").await.unwrap(), status);
        let leave = matchmaking.leave_queue("alice").await;
        assert!(matches!(leave, Err(GameError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_pair_once() {
        let harness = Harness::contended();
        let matchmaking = harness.services.matchmaking.clone();
        matchmaking.join_queue("alice").await.unwrap();
        matchmaking.join_queue("bob").await.unwrap();

        let (first, second) = tokio::join!(
            matchmaking.find_and_match_opponent("alice"),
            matchmaking.find_and_match_opponent("bob"),
        );
        let created = [first.unwrap(), second.unwrap()]
            .into_iter()
            .flatten()
            .count();
        // Both sweeps may lose a reservation and release; never both win.
        assert!(created <= 1);

        let retry = matchmaking.find_and_match_opponent("alice").await.unwrap();
        assert_eq!(created + usize::from(retry.is_some()), 1);

        let alice = matchmaking.queue_status("alice").await.unwrap();
        let bob = matchmaking.queue_status("bob").await.unwrap();
        assert_eq!(alice.status, QueueStatus::Matched);
        assert!(alice.match_id.is_some());
        assert_eq!(alice.match_id, bob.match_id);
    }

    #[tokio::test]
    async fn test_finished_ranked_match_rates_players_and_closes_entries() {
        let harness = Harness::new();
        let matchmaking = &harness.services.matchmaking;
        matchmaking.join_queue("alice").await.unwrap();
        matchmaking.join_queue("bob").await.unwrap();
        let game_match = matchmaking
            .find_and_match_opponent("alice")
            .await
            .unwrap()
            .unwrap();

        harness.advance_ms(COUNTDOWN_MS + 10_000);
        let matches = &harness.services.matches;
        matches.submit_guess(&game_match.match_id, "alice", "mi", None).await.unwrap();
        harness.advance_ms(10_000);
        let outcome = matches
            .submit_guess(&game_match.match_id, "bob", "heart attack", None)
            .await
            .unwrap();
        assert_eq!(outcome.match_status, MatchStatus::Ended);

        let view = matches.get_match_view(&game_match.match_id, "alice", None).await.unwrap();
        let changes = view.rating_changes.unwrap();
        assert_eq!(changes.len(), 2);

        let alice = harness.services.ranked.get_profile("alice").await.unwrap();
        assert_eq!(alice.rating, 1212);
        assert_eq!(alice.wins, 1);
        let bob = harness.services.ranked.get_profile("bob").await.unwrap();
        assert_eq!(bob.rating, 1188);
        assert_eq!(bob.tier, Tier::Bronze);
        assert_eq!(bob.losses, 1);

        assert_eq!(
            matchmaking.queue_status("bob").await.unwrap().status,
            QueueStatus::Ended
        );
        assert_eq!(harness.publisher.events_named("queue_ended").len(), 2);

        // A fresh join starts from the new rating.
        let rejoined = matchmaking.join_queue("alice").await.unwrap();
        assert_eq!(rejoined.status, QueueStatus::Waiting);
        assert_eq!(rejoined.rating, 1212);
    }
}
