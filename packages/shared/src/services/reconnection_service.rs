use std::sync::Arc;

use tracing::{debug, info};

use crate::models::game_match::{Match, MatchMode, MatchStatus};
use crate::models::membership::MembershipKind;
use crate::models::room::{Room, RoomStatus};
use crate::models::views::SessionSnapshot;
use crate::repositories::Repositories;
use crate::services::clock::Clock;
use crate::services::errors::GameError;
use crate::services::match_service::MatchService;
use crate::services::projection;
use crate::services::session_service::verify_token;
use crate::services::versioned::{update_match, update_room};

fn is_live_match(game_match: &Match) -> bool {
    match game_match.status {
        MatchStatus::Countdown | MatchStatus::Active | MatchStatus::Resolution => true,
        // Ranked matches have no room to fall back on while the case is made.
        MatchStatus::Generating => game_match.mode == MatchMode::Ranked,
        MatchStatus::Ended => false,
    }
}

fn is_open_room(room: &Room) -> bool {
    matches!(
        room.status,
        RoomStatus::Lobby | RoomStatus::Generating | RoomStatus::Countdown
    )
}

#[derive(Clone)]
pub struct ReconnectionService {
    repositories: Repositories,
    matches: Arc<MatchService>,
    clock: Arc<dyn Clock>,
}

impl ReconnectionService {
    pub fn new(repositories: Repositories, matches: Arc<MatchService>, clock: Arc<dyn Clock>) -> Self {
        ReconnectionService {
            repositories,
            matches,
            clock,
        }
    }

    /// Finds where `identity` belongs, in priority order: a live match, an
    /// open room, the latest ended match. A presented token must match the
    /// seat it resolves to, and marks that seat connected.
    pub async fn resolve_session(&self, identity: &str, token: Option<&str>) -> Result<SessionSnapshot, GameError> {
        let memberships = self.repositories.memberships.list_memberships(identity).await?;

        let mut matches = Vec::new();
        for membership in memberships.iter().filter(|m| m.kind == MembershipKind::Match) {
            match self.matches.load_match(&membership.record_id).await {
                Ok(game_match) => matches.push(game_match),
                Err(GameError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        if let Some(game_match) = matches.iter().find(|m| is_live_match(m)) {
            let game_match = self.claim_match_seat(game_match, identity, token).await?;
            info!("{} reconnected to match {}", identity, game_match.match_id);
            return Ok(SessionSnapshot::ActiveMatch {
                game_match: self.matches.view_for(&game_match, identity).await?,
            });
        }

        let now = self.clock.now();
        for membership in memberships.iter().filter(|m| m.kind == MembershipKind::Room) {
            let Some(room) = self.repositories.rooms.get_room(&membership.record_id).await? else {
                continue;
            };
            if !is_open_room(&room) || room.is_expired(now) || room.participant(identity).is_none() {
                continue;
            }
            let room = self.claim_room_seat(&room, identity, token).await?;
            info!("{} reconnected to room {}", identity, room.room_key);
            return Ok(SessionSnapshot::Room {
                room: projection::room_view(&room),
            });
        }

        if let Some(game_match) = matches.iter().find(|m| m.status == MatchStatus::Ended) {
            debug!("{} has no live session, returning match {}", identity, game_match.match_id);
            return Ok(SessionSnapshot::EndedMatch {
                game_match: self.matches.view_for(game_match, identity).await?,
            });
        }

        Ok(SessionSnapshot::NoActiveSession)
    }

    /// Clears the connected flag on every live seat of `identity`, e.g. when
    /// its push connection drops.
    pub async fn mark_disconnected(&self, identity: &str) -> Result<(), GameError> {
        let memberships = self.repositories.memberships.list_memberships(identity).await?;
        for membership in memberships.iter().filter(|m| m.kind == MembershipKind::Match) {
            let Some(game_match) = self.repositories.matches.get_match(&membership.record_id).await? else {
                continue;
            };
            let seated = game_match.player(identity).is_some_and(|player| player.connected);
            if !is_live_match(&game_match) || !seated {
                continue;
            }
            update_match(
                self.repositories.matches.as_ref(),
                self.clock.as_ref(),
                &game_match.match_id,
                |game_match, _| {
                    if let Some(player) = game_match.player_mut(identity) {
                        player.connected = false;
                    }
                    Ok(())
                },
            )
            .await?;
            debug!("{} disconnected from match {}", identity, game_match.match_id);
        }

        let now = self.clock.now();
        for membership in memberships.iter().filter(|m| m.kind == MembershipKind::Room) {
            let Some(room) = self.repositories.rooms.get_room(&membership.record_id).await? else {
                continue;
            };
            let seated = room.participant(identity).is_some_and(|p| p.connected);
            if !is_open_room(&room) || room.is_expired(now) || !seated {
                continue;
            }
            update_room(
                self.repositories.rooms.as_ref(),
                self.clock.as_ref(),
                &room.room_key,
                |room, _| {
                    if let Some(participant) = room.participant_mut(identity) {
                        participant.connected = false;
                    }
                    Ok(())
                },
            )
            .await?;
            debug!("{} disconnected from room {}", identity, room.room_key);
        }
        Ok(())
    }

    async fn claim_match_seat(&self, game_match: &Match, identity: &str, token: Option<&str>) -> Result<Match, GameError> {
        let player = game_match
            .player(identity)
            .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
        verify_token(&player.session_token, token)?;
        if token.is_none() || player.connected {
            return Ok(game_match.clone());
        }

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            &game_match.match_id,
            |game_match, _| {
                let player = game_match
                    .player_mut(identity)
                    .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
                verify_token(&player.session_token, token)?;
                player.connected = true;
                Ok(())
            },
        )
        .await?;
        if update.activated {
            self.matches.on_activated(&update.game_match).await;
        }
        Ok(update.game_match)
    }

    async fn claim_room_seat(&self, room: &Room, identity: &str, token: Option<&str>) -> Result<Room, GameError> {
        let participant = room
            .participant(identity)
            .ok_or_else(|| GameError::Forbidden("not a participant".to_string()))?;
        verify_token(&participant.session_token, token)?;
        if token.is_none() || participant.connected {
            return Ok(room.clone());
        }

        let (room, ()) = update_room(
            self.repositories.rooms.as_ref(),
            self.clock.as_ref(),
            &room.room_key,
            |room, _| {
                let participant = room
                    .participant_mut(identity)
                    .ok_or_else(|| GameError::Forbidden("not a participant".to_string()))?;
                verify_token(&participant.session_token, token)?;
                participant.connected = true;
                Ok(())
            },
        )
        .await?;
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::room::RoomSettings;
    use crate::services::test_support::Harness;

    #[tokio::test]
    async fn test_nothing_to_resume() {
        let harness = Harness::new();
        let snapshot = harness
            .services
            .reconnection
            .resolve_session("alice", None)
            .await
            .unwrap();
        assert_eq!(snapshot, SessionSnapshot::NoActiveSession);
    }

    #[tokio::test]
    async fn test_open_room_is_resumed() {
        let harness = Harness::new();
        let host = harness
            .services
            .lobby
            .create_room("alice", "Alice", None)
            .await
            .unwrap();

        let snapshot = harness
            .services
            .reconnection
            .resolve_session("alice", Some(&host.session_token))
            .await
            .unwrap();
        match snapshot {
            SessionSnapshot::Room { room } => assert_eq!(room.room_id, host.room_id),
            other => panic!("expected room, got {:?}", other),
        }

        let mismatch = harness
            .services
            .reconnection
            .resolve_session("alice", Some("stale-token"))
            .await;
        assert_eq!(mismatch, Err(GameError::SessionMismatch));
    }

    #[tokio::test]
    async fn test_live_match_wins_over_its_room() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;

        let snapshot = harness
            .services
            .reconnection
            .resolve_session("bob", Some(&active.guest.session_token))
            .await
            .unwrap();
        match snapshot {
            SessionSnapshot::ActiveMatch { game_match } => {
                assert_eq!(game_match.match_id, active.match_id);
                assert_eq!(game_match.status, MatchStatus::Active);
                assert_eq!(game_match.me.unwrap().identity, "bob");
            }
            other => panic!("expected active match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ended_match_is_the_fallback() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let matches = &harness.services.matches;
        matches.submit_guess(&active.match_id, "alice", "mi", None).await.unwrap();
        matches.submit_guess(&active.match_id, "bob", "mi", None).await.unwrap();

        let snapshot = harness
            .services
            .reconnection
            .resolve_session("alice", None)
            .await
            .unwrap();
        match snapshot {
            SessionSnapshot::EndedMatch { game_match } => {
                assert_eq!(game_match.status, MatchStatus::Ended);
                assert!(game_match.breakdown.is_some());
            }
            other => panic!("expected ended match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_then_reconnect_with_token() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let reconnection = &harness.services.reconnection;
        // Settle the countdown so the match counts as live and active.
        harness.services.matches.load_match(&active.match_id).await.unwrap();

        reconnection.mark_disconnected("alice").await.unwrap();
        let game_match = harness.services.matches.load_match(&active.match_id).await.unwrap();
        assert!(!game_match.player("alice").unwrap().connected);
        assert!(game_match.player("bob").unwrap().connected);

        // Resolving without a token reads but does not claim the seat.
        reconnection.resolve_session("alice", None).await.unwrap();
        let game_match = harness.services.matches.load_match(&active.match_id).await.unwrap();
        assert!(!game_match.player("alice").unwrap().connected);

        reconnection
            .resolve_session("alice", Some(&active.host.session_token))
            .await
            .unwrap();
        let game_match = harness.services.matches.load_match(&active.match_id).await.unwrap();
        assert!(game_match.player("alice").unwrap().connected);
    }

    #[tokio::test]
    async fn test_disconnect_in_lobby() {
        let harness = Harness::new();
        let lobby = &harness.services.lobby;
        let host = lobby.create_room("alice", "Alice", None).await.unwrap();

        harness.services.reconnection.mark_disconnected("alice").await.unwrap();
        let view = lobby.get_room_view(&host.room_id, "alice").await.unwrap();
        assert!(!view.participants[0].connected);

        let rejoined = lobby
            .join_room(&host.room_key, "alice", "Alice", Some(&host.session_token))
            .await
            .unwrap();
        assert!(rejoined.rejoined);
        let view = lobby.get_room_view(&host.room_id, "alice").await.unwrap();
        assert!(view.participants[0].connected);
    }
}
