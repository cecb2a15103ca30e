use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_LEADERBOARD_SIZE, MAX_UPDATE_ATTEMPTS};
use crate::models::game_match::{Match, RatedResult, RatingChange};
use crate::models::ranked::{RankedProfile, Tier};
use crate::models::views::LeaderboardEntry;
use crate::repositories::errors::RepositoryError;
use crate::repositories::profile_repository::ProfileRepository;
use crate::services::clock::Clock;
use crate::services::errors::GameError;
use crate::services::projection;
use crate::services::rating::apply_delta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Win,
    Loss,
    Draw,
}

fn outcome(change: &RatingChange, changes: &[RatingChange]) -> Outcome {
    let same_result = changes
        .iter()
        .filter(|other| other.identity != change.identity)
        .all(|other| other.result == change.result);
    match change.result {
        _ if same_result => Outcome::Draw,
        RatedResult::Win => Outcome::Win,
        RatedResult::Loss => Outcome::Loss,
    }
}

fn record_outcome(profile: &mut RankedProfile, match_id: &str, delta: i32, outcome: Outcome, now: DateTime<Utc>) {
    profile.rating = apply_delta(profile.rating, delta);
    profile.tier = Tier::from_rating(profile.rating);
    match outcome {
        Outcome::Win => {
            profile.wins += 1;
            profile.current_streak += 1;
            profile.best_streak = profile.best_streak.max(profile.current_streak);
        }
        Outcome::Loss => {
            profile.losses += 1;
            profile.current_streak = 0;
        }
        Outcome::Draw => {
            profile.draws += 1;
            profile.current_streak = 0;
        }
    }
    profile.remember_rated(match_id);
    profile.updated_at = now;
}

#[derive(Clone)]
pub struct RankedService {
    profiles: Arc<dyn ProfileRepository>,
    clock: Arc<dyn Clock>,
}

impl RankedService {
    pub fn new(profiles: Arc<dyn ProfileRepository>, clock: Arc<dyn Clock>) -> Self {
        RankedService { profiles, clock }
    }

    pub async fn get_or_create_profile(&self, identity: &str) -> Result<RankedProfile, GameError> {
        if let Some(profile) = self.profiles.get_profile(identity).await? {
            return Ok(profile);
        }
        let profile = RankedProfile::new(identity, self.clock.now());
        match self.profiles.create_profile(&profile).await {
            Ok(()) => {
                info!("Created ranked profile for {} as {}", identity, profile.alias);
                Ok(profile)
            }
            // Lost a creation race; the winner's profile is the real one.
            Err(RepositoryError::AlreadyExists) => self
                .profiles
                .get_profile(identity)
                .await?
                .ok_or_else(|| GameError::NotFound("Profile".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_profile(&self, identity: &str) -> Result<RankedProfile, GameError> {
        self.profiles
            .get_profile(identity)
            .await?
            .ok_or_else(|| GameError::NotFound("Profile".to_string()))
    }

    pub async fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>, GameError> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_SIZE).clamp(1, DEFAULT_LEADERBOARD_SIZE * 2);
        let profiles = self.profiles.top_profiles(limit).await?;
        Ok(projection::leaderboard(&profiles))
    }

    /// Applies a ranked match's frozen rating changes to both profiles.
    /// Safe to call again for the same match: a profile already stamped with
    /// this match id among its remembered ones is left alone.
    pub async fn apply_rating_changes(&self, game_match: &Match) -> Result<(), GameError> {
        let Some(changes) = game_match.rating_changes.as_ref() else {
            return Ok(());
        };
        for change in changes {
            let outcome = outcome(change, changes);
            self.apply_change(&game_match.match_id, change, outcome).await?;
        }
        Ok(())
    }

    async fn apply_change(&self, match_id: &str, change: &RatingChange, outcome: Outcome) -> Result<(), GameError> {
        let identity = change.identity.as_str();
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.get_or_create_profile(identity).await?;
            if current.has_rated(match_id) {
                debug!("Profile {} already rated for match {}", identity, match_id);
                return Ok(());
            }

            let mut next = current.clone();
            record_outcome(&mut next, match_id, change.delta, outcome, self.clock.now());
            next.version = current.version + 1;

            match self.profiles.update_profile(&next, current.version).await {
                Ok(()) => {
                    info!(
                        "Rated {} for match {}: {} -> {} ({:?})",
                        identity, match_id, current.rating, next.rating, outcome
                    );
                    return Ok(());
                }
                Err(RepositoryError::VersionConflict) => {
                    warn!("Profile {} changed during rating attempt {}", identity, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(GameError::Conflict(format!("profile {}", identity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game_match::PlayerResult;
    use crate::repositories::memory_repository::InMemoryStore;
    use crate::repositories::profile_repository::MockProfileRepository;
    use crate::services::clock::ManualClock;
    use crate::services::rating::{ranked_params, rating_changes};
    use chrono::Duration;

    fn service() -> (RankedService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (RankedService::new(store.clone(), clock), store)
    }

    fn ended_ranked_match(match_id: &str, a_solves: Option<i64>, b_solves: Option<i64>) -> Match {
        let start = Utc::now();
        let mut players = Vec::new();
        for (name, solve) in [("a", a_solves), ("b", b_solves)] {
            let mut player = PlayerResult::new(name, name, None, "tok");
            player.rating_before = Some(1200);
            player.finished = true;
            player.solved_at = solve.map(|s| start + Duration::seconds(s));
            players.push(player);
        }
        let mut game_match = Match::ranked(match_id, players, ranked_params(1200, 1200), start);
        game_match.started_at = Some(start);
        game_match.rating_changes = Some(rating_changes(&game_match));
        game_match
    }

    #[tokio::test]
    async fn test_get_or_create_defaults_to_silver_1200() {
        let (service, _) = service();
        let profile = service.get_or_create_profile("newbie").await.unwrap();
        assert_eq!(profile.rating, 1200);
        assert_eq!(profile.tier, Tier::Silver);

        let again = service.get_or_create_profile("newbie").await.unwrap();
        assert_eq!(again.alias, profile.alias);
    }

    #[tokio::test]
    async fn test_rating_pass_updates_record_and_streaks() {
        let (service, store) = service();
        let game_match = ended_ranked_match("m-1", Some(30), None);
        service.apply_rating_changes(&game_match).await.unwrap();

        let winner = store.get_profile("a").await.unwrap().unwrap();
        let loser = store.get_profile("b").await.unwrap().unwrap();
        assert_eq!(winner.rating, 1212);
        assert_eq!((winner.wins, winner.current_streak, winner.best_streak), (1, 1, 1));
        assert_eq!(loser.rating, 1188);
        assert_eq!((loser.losses, loser.current_streak), (1, 0));
        assert_eq!(loser.tier, Tier::Bronze);
    }

    #[tokio::test]
    async fn test_rating_pass_is_applied_once_per_match() {
        let (service, store) = service();
        let game_match = ended_ranked_match("m-1", Some(30), None);
        service.apply_rating_changes(&game_match).await.unwrap();
        service.apply_rating_changes(&game_match).await.unwrap();

        let winner = store.get_profile("a").await.unwrap().unwrap();
        assert_eq!(winner.rating, 1212);
        assert_eq!(winner.wins, 1);
    }

    #[tokio::test]
    async fn test_older_match_is_not_rated_again_after_a_newer_one() {
        let (service, store) = service();
        let first = ended_ranked_match("m-a", Some(30), None);
        let second = ended_ranked_match("m-b", Some(20), None);
        service.apply_rating_changes(&first).await.unwrap();
        service.apply_rating_changes(&second).await.unwrap();
        service.apply_rating_changes(&first).await.unwrap();

        let winner = store.get_profile("a").await.unwrap().unwrap();
        assert_eq!(winner.wins, 2);
        assert_eq!(winner.rating, 1224);
        assert_eq!(winner.rated_match_ids, vec!["m-a".to_string(), "m-b".to_string()]);
        let loser = store.get_profile("b").await.unwrap().unwrap();
        assert_eq!(loser.losses, 2);
    }

    #[tokio::test]
    async fn test_simultaneous_solves_count_as_draw() {
        let (service, store) = service();
        let game_match = ended_ranked_match("m-2", Some(30), Some(30));
        service.apply_rating_changes(&game_match).await.unwrap();

        for identity in ["a", "b"] {
            let profile = store.get_profile(identity).await.unwrap().unwrap();
            assert_eq!(profile.draws, 1);
            assert_eq!(profile.wins, 0);
        }
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_rating() {
        let (service, store) = service();
        for (identity, rating) in [("low", 900), ("high", 2200), ("mid", 1500)] {
            let mut profile = RankedProfile::new(identity, Utc::now());
            profile.rating = rating;
            profile.tier = Tier::from_rating(rating);
            store.create_profile(&profile).await.unwrap();
        }

        let board = service.leaderboard(Some(2)).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].rating, 2200);
        assert_eq!(board[0].tier, Tier::Master);
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[1].rating, 1500);
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let mut profiles = MockProfileRepository::new();
        profiles.expect_get_profile().returning(|_| Ok(None));
        let service = RankedService::new(Arc::new(profiles), Arc::new(ManualClock::new(Utc::now())));

        let result = service.get_profile("ghost").await;
        assert_eq!(result.unwrap_err().kind(), "not_found");
    }
}
