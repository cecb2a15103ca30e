//! Optimistic read-modify-write loops over versioned documents. Every
//! mutation re-reads the record, re-applies its checks to the fresh copy and
//! writes conditionally on the version it read.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::constants::MAX_UPDATE_ATTEMPTS;
use crate::models::game_match::{Match, MatchStatus};
use crate::models::room::Room;
use crate::repositories::errors::RepositoryError;
use crate::repositories::match_repository::MatchRepository;
use crate::repositories::room_repository::RoomRepository;
use crate::services::clock::Clock;
use crate::services::errors::GameError;

pub struct MatchUpdate<T> {
    pub game_match: Match,
    pub value: T,
    /// The countdown elapsed and this write persisted the switch to active.
    pub activated: bool,
}

/// Applies `apply` to the latest copy of a match. Countdown activation is
/// folded into the same write.
pub async fn update_match<T, F>(
    matches: &dyn MatchRepository,
    clock: &dyn Clock,
    match_id: &str,
    mut apply: F,
) -> Result<MatchUpdate<T>, GameError>
where
    F: FnMut(&mut Match, DateTime<Utc>) -> Result<T, GameError>,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let current = matches
            .get_match(match_id)
            .await?
            .ok_or_else(|| GameError::NotFound("Match".to_string()))?;

        let now = clock.now();
        let mut next = current.clone();
        next.activate_if_due(now);
        let value = apply(&mut next, now)?;
        next.version = current.version + 1;

        match matches.update_match(&next, current.version).await {
            Ok(()) => {
                let activated =
                    current.status == MatchStatus::Countdown && next.status > MatchStatus::Countdown;
                return Ok(MatchUpdate {
                    game_match: next,
                    value,
                    activated,
                });
            }
            Err(RepositoryError::VersionConflict) => {
                debug!("Match {} changed underneath attempt {}, retrying", match_id, attempt);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(GameError::Conflict(format!("match {}", match_id)))
}

/// Same loop for rooms, addressed by room code (the table key).
pub async fn update_room<T, F>(
    rooms: &dyn RoomRepository,
    clock: &dyn Clock,
    room_key: &str,
    mut apply: F,
) -> Result<(Room, T), GameError>
where
    F: FnMut(&mut Room, DateTime<Utc>) -> Result<T, GameError>,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let current = rooms
            .get_room_by_key(room_key)
            .await?
            .ok_or_else(|| GameError::NotFound("Room".to_string()))?;

        let now = clock.now();
        let mut next = current.clone();
        let value = apply(&mut next, now)?;
        next.version = current.version + 1;
        next.touch(now);

        match rooms.update_room(&next, current.version).await {
            Ok(()) => return Ok((next, value)),
            Err(RepositoryError::VersionConflict) => {
                debug!("Room {} changed underneath attempt {}, retrying", room_key, attempt);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(GameError::Conflict(format!("room {}", room_key)))
}
