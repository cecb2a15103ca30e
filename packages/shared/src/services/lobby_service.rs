use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use crate::constants::{ROOM_KEY_ALPHABET, ROOM_KEY_ATTEMPTS, ROOM_KEY_LENGTH};
use crate::models::game_match::{Match, MatchStatus};
use crate::models::membership::{Membership, MembershipKind};
use crate::models::room::{Participant, Room, RoomSettings, RoomStatus};
use crate::models::views::{JoinOutcome, MatchView, RoomView};
use crate::repositories::errors::RepositoryError;
use crate::repositories::fanout_repository::{match_channel, room_channel};
use crate::repositories::Repositories;
use crate::services::clock::Clock;
use crate::services::errors::GameError;
use crate::services::match_service::MatchService;
use crate::services::notifier::Notifier;
use crate::services::projection;
use crate::services::session_service::{issue_token, verify_token};
use crate::services::versioned::{update_match, update_room};

fn draw_room_key() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_KEY_LENGTH)
        .map(|_| ROOM_KEY_ALPHABET[rng.gen_range(0..ROOM_KEY_ALPHABET.len())] as char)
        .collect()
}

fn normalize_room_key(room_key: &str) -> String {
    room_key.trim().to_uppercase()
}

fn require_lobby(room: &Room) -> Result<(), GameError> {
    if room.status != RoomStatus::Lobby {
        return Err(GameError::InvalidState(format!(
            "room is {:?}, no longer open",
            room.status
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LobbyService {
    repositories: Repositories,
    matches: Arc<MatchService>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl LobbyService {
    pub fn new(
        repositories: Repositories,
        matches: Arc<MatchService>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        LobbyService {
            repositories,
            matches,
            notifier,
            clock,
        }
    }

    /// Opens a room with the host seated. Room codes are drawn at random and
    /// claimed with a conditional insert; a clash draws again.
    pub async fn create_room(
        &self,
        host_identity: &str,
        display_name: &str,
        settings: Option<RoomSettings>,
    ) -> Result<JoinOutcome, GameError> {
        let settings = settings.unwrap_or_default();
        settings.validate().map_err(GameError::ValidationError)?;

        let now = self.clock.now();
        let session_token = issue_token();
        for attempt in 1..=ROOM_KEY_ATTEMPTS {
            let mut room = Room::new(&draw_room_key(), host_identity, settings.clone(), now);
            let team_id = room.next_team_id();
            room.participants.push(Participant {
                identity: host_identity.to_string(),
                display_name: display_name.to_string(),
                team_id,
                ready: false,
                connected: true,
                joined_at: now,
                session_token: session_token.clone(),
            });

            match self.repositories.rooms.create_room(&room).await {
                Ok(()) => {
                    self.record_membership(host_identity, &room.room_id).await?;
                    info!("Room {} ({}) created by {}", room.room_key, room.room_id, host_identity);
                    return Ok(JoinOutcome {
                        room_id: room.room_id,
                        room_key: room.room_key,
                        session_token,
                        rejoined: false,
                    });
                }
                Err(RepositoryError::AlreadyExists) => {
                    warn!("Room code {} taken on attempt {}", room.room_key, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(GameError::Capacity(
            "could not allocate a free room code".to_string(),
        ))
    }

    /// Seats `identity` in the room behind `room_key`. Joining again returns
    /// the existing seat and token; a presented token must match it.
    pub async fn join_room(
        &self,
        room_key: &str,
        identity: &str,
        display_name: &str,
        token: Option<&str>,
    ) -> Result<JoinOutcome, GameError> {
        let room_key = normalize_room_key(room_key);
        let existing = self
            .repositories
            .rooms
            .get_room_by_key(&room_key)
            .await?
            .filter(|room| !room.is_expired(self.clock.now()))
            .ok_or_else(|| GameError::NotFound("Room".to_string()))?;

        let fresh_token = issue_token();
        let (room, (session_token, rejoined)) = update_room(
            self.repositories.rooms.as_ref(),
            self.clock.as_ref(),
            &existing.room_key,
            |room, now| {
                if let Some(participant) = room.participant_mut(identity) {
                    verify_token(&participant.session_token, token)?;
                    participant.connected = true;
                    return Ok((participant.session_token.clone(), true));
                }
                require_lobby(room)?;
                if room.is_full() {
                    return Err(GameError::Capacity(format!(
                        "room holds {} players",
                        room.capacity()
                    )));
                }
                let team_id = room.next_team_id();
                room.participants.push(Participant {
                    identity: identity.to_string(),
                    display_name: display_name.to_string(),
                    team_id,
                    ready: false,
                    connected: true,
                    joined_at: now,
                    session_token: fresh_token.clone(),
                });
                Ok((fresh_token.clone(), false))
            },
        )
        .await?;

        if !rejoined {
            self.record_membership(identity, &room.room_id).await?;
            info!("{} joined room {}", identity, room.room_key);
        }
        self.notifier
            .notify(
                &room_channel(&room.room_id),
                "participants_changed",
                &projection::room_view(&room),
            )
            .await;

        Ok(JoinOutcome {
            room_id: room.room_id,
            room_key: room.room_key,
            session_token,
            rejoined,
        })
    }

    /// Leaves a lobby. The host role passes to the longest-seated player;
    /// the last player out closes the room.
    pub async fn leave_room(&self, room_id: &str, identity: &str) -> Result<RoomView, GameError> {
        let room = self.find_room(room_id).await?;
        let (room, ()) = update_room(
            self.repositories.rooms.as_ref(),
            self.clock.as_ref(),
            &room.room_key,
            |room, _| {
                require_lobby(room)?;
                if room.participant(identity).is_none() {
                    return Err(GameError::Forbidden("not a participant".to_string()));
                }
                room.participants.retain(|p| p.identity != identity);
                match room.participants.first() {
                    Some(next_host) if room.host_identity == identity => {
                        room.host_identity = next_host.identity.clone();
                    }
                    None => {
                        room.advance_status(RoomStatus::Ended);
                    }
                    _ => {}
                }
                Ok(())
            },
        )
        .await?;

        info!("{} left room {}", identity, room.room_key);
        let view = projection::room_view(&room);
        self.notifier
            .notify(&room_channel(&room.room_id), "participants_changed", &view)
            .await;
        Ok(view)
    }

    pub async fn toggle_ready(&self, room_id: &str, identity: &str, token: Option<&str>) -> Result<RoomView, GameError> {
        let room = self.find_room(room_id).await?;
        let (room, ready) = update_room(
            self.repositories.rooms.as_ref(),
            self.clock.as_ref(),
            &room.room_key,
            |room, _| {
                let lobby = require_lobby(room);
                let participant = room
                    .participant_mut(identity)
                    .ok_or_else(|| GameError::Forbidden("not a participant".to_string()))?;
                verify_token(&participant.session_token, token)?;
                lobby?;
                participant.ready = !participant.ready;
                Ok(participant.ready)
            },
        )
        .await?;

        info!("{} is {} in room {}", identity, if ready { "ready" } else { "not ready" }, room.room_key);
        let view = projection::room_view(&room);
        self.notifier
            .notify(&room_channel(&room.room_id), "ready_changed", &view)
            .await;
        Ok(view)
    }

    /// Host-only. Seats every participant in a new match and asks for a
    /// case. A failed generation leaves the match in `generating` for a
    /// retry or an abort.
    pub async fn start_match(&self, room_id: &str, identity: &str) -> Result<MatchView, GameError> {
        let room = self.find_room(room_id).await?;
        let (room, game_match) = update_room(
            self.repositories.rooms.as_ref(),
            self.clock.as_ref(),
            &room.room_key,
            |room, now| {
                if room.host_identity != identity {
                    return Err(GameError::Forbidden("only the host can start".to_string()));
                }
                require_lobby(room)?;
                if room.participants.len() < 2 {
                    return Err(GameError::InvalidState(
                        "at least two players are needed".to_string(),
                    ));
                }
                if !room.all_ready() {
                    return Err(GameError::InvalidState(
                        "every participant must be ready".to_string(),
                    ));
                }
                let game_match = Match::for_room(room, now);
                room.current_match_id = Some(game_match.match_id.clone());
                room.advance_status(RoomStatus::Generating);
                Ok(game_match)
            },
        )
        .await?;

        self.matches.register_match(&game_match).await?;
        self.notifier
            .notify(
                &room_channel(&room.room_id),
                "room_status_changed",
                &projection::room_view(&room),
            )
            .await;

        let game_match = self.matches.run_generation(&game_match.match_id).await?;
        self.matches.view_for(&game_match, identity).await
    }

    /// Host-only escape hatch for a room whose match never got going. Ends
    /// room and match without scoring or rating anything.
    pub async fn abort_room(&self, room_id: &str, identity: &str) -> Result<RoomView, GameError> {
        let room = self.find_room(room_id).await?;
        if room.host_identity != identity {
            return Err(GameError::Forbidden("only the host can abort".to_string()));
        }
        if room.status >= RoomStatus::Active {
            return Err(GameError::InvalidState(
                "a running match can only end by finishing".to_string(),
            ));
        }

        if let Some(match_id) = room.current_match_id.as_deref() {
            let result = update_match(
                self.repositories.matches.as_ref(),
                self.clock.as_ref(),
                match_id,
                |game_match, now| {
                    if game_match.status >= MatchStatus::Active {
                        return Err(GameError::InvalidState(
                            "match already started".to_string(),
                        ));
                    }
                    game_match.status = MatchStatus::Ended;
                    game_match.aborted = true;
                    game_match.ended_at = Some(now);
                    game_match.record(now, identity, "aborted by host");
                    Ok(())
                },
            )
            .await;
            match result {
                Ok(update) => {
                    self.notifier
                        .notify(
                            &match_channel(match_id),
                            "match_ended",
                            &projection::match_view(&update.game_match, None, None),
                        )
                        .await;
                }
                // The room was claimed but its match never got written.
                Err(GameError::NotFound(_)) => warn!("Room {} points at a missing match", room_id),
                Err(e) => return Err(e),
            }
        }

        let (room, ()) = update_room(
            self.repositories.rooms.as_ref(),
            self.clock.as_ref(),
            &room.room_key,
            |room, _| {
                room.advance_status(RoomStatus::Ended);
                Ok(())
            },
        )
        .await?;

        info!("Room {} aborted by {}", room.room_key, identity);
        let view = projection::room_view(&room);
        self.notifier
            .notify(&room_channel(&room.room_id), "room_status_changed", &view)
            .await;
        Ok(view)
    }

    /// Polling fallback: the same snapshot the fan-out pushes.
    pub async fn get_room_view(&self, room_id: &str, identity: &str) -> Result<RoomView, GameError> {
        let mut room = self.find_room(room_id).await?;
        if room.participant(identity).is_none() {
            return Err(GameError::Forbidden("not a participant".to_string()));
        }
        if room.status == RoomStatus::Countdown {
            if let Some(match_id) = room.current_match_id.clone() {
                // Settles an elapsed countdown and drags the room along.
                self.matches.load_match(&match_id).await?;
                room = self.find_room(room_id).await?;
            }
        }
        Ok(projection::room_view(&room))
    }

    pub async fn find_room(&self, room_id: &str) -> Result<Room, GameError> {
        let room = self
            .repositories
            .rooms
            .get_room(room_id)
            .await?
            .ok_or_else(|| GameError::NotFound("Room".to_string()))?;
        if room.is_expired(self.clock.now()) {
            return Err(GameError::NotFound("Room".to_string()));
        }
        Ok(room)
    }

    async fn record_membership(&self, identity: &str, room_id: &str) -> Result<(), GameError> {
        let membership = Membership::new(identity, MembershipKind::Room, room_id, self.clock.now());
        self.repositories.memberships.record_membership(&membership).await?;
        Ok(())
    }
}
