use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{MAX_SABOTAGES_PER_PLAYER, MAX_TEAM_SIZE, ROOM_TTL_SECS};
use crate::models::case::GenerationParams;

/// Lobby lifecycle. Ordering follows the lifecycle, so a status only ever
/// moves to a greater value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Lobby,
    Generating,
    Countdown,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    #[default]
    Race,
    Efficiency,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SabotagePolicy {
    pub enabled: bool,
    pub mechanism_check: bool,
    pub max_per_player: u32,
}

impl Default for SabotagePolicy {
    fn default() -> Self {
        SabotagePolicy {
            enabled: true,
            mechanism_check: true,
            max_per_player: MAX_SABOTAGES_PER_PLAYER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSettings {
    pub team_size: u32,
    #[serde(default)]
    pub scoring_mode: ScoringMode,
    #[serde(default)]
    pub sabotage: SabotagePolicy,
    #[serde(default)]
    pub generation: GenerationParams,
}

impl Default for RoomSettings {
    fn default() -> Self {
        RoomSettings {
            team_size: 1,
            scoring_mode: ScoringMode::Race,
            sabotage: SabotagePolicy::default(),
            generation: GenerationParams::default(),
        }
    }
}

impl RoomSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.team_size == 0 || self.team_size > MAX_TEAM_SIZE {
            return Err(format!(
                "team_size must be between 1 and {}",
                MAX_TEAM_SIZE
            ));
        }
        if self.sabotage.max_per_player > MAX_SABOTAGES_PER_PLAYER {
            return Err(format!(
                "sabotage cap cannot exceed {}",
                MAX_SABOTAGES_PER_PLAYER
            ));
        }
        self.generation.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub identity: String,
    pub display_name: String,
    pub team_id: Option<u8>,
    pub ready: bool,
    pub connected: bool,
    pub joined_at: DateTime<Utc>,
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub room_key: String,
    pub host_identity: String,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub participants: Vec<Participant>,
    pub current_match_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Epoch seconds, DynamoDB TTL attribute. Pushed forward on every write.
    pub expires_at: i64,
    pub version: u64,
}

impl Room {
    pub fn new(room_key: &str, host_identity: &str, settings: RoomSettings, now: DateTime<Utc>) -> Self {
        Room {
            room_id: Uuid::new_v4().to_string(),
            room_key: room_key.to_string(),
            host_identity: host_identity.to_string(),
            status: RoomStatus::Lobby,
            settings,
            participants: Vec::new(),
            current_match_id: None,
            created_at: now,
            updated_at: now,
            expires_at: now.timestamp() + ROOM_TTL_SECS,
            version: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.settings.team_size * 2) as usize
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity()
    }

    pub fn participant(&self, identity: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.identity == identity)
    }

    pub fn participant_mut(&mut self, identity: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.identity == identity)
    }

    pub fn all_ready(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.ready)
    }

    /// Team for the next joiner: the smaller team, ties going to team 1.
    /// Solo rooms have no teams.
    pub fn next_team_id(&self) -> Option<u8> {
        if self.settings.team_size <= 1 {
            return None;
        }
        let first = self
            .participants
            .iter()
            .filter(|p| p.team_id == Some(1))
            .count();
        let second = self
            .participants
            .iter()
            .filter(|p| p.team_id == Some(2))
            .count();
        if second < first {
            Some(2)
        } else {
            Some(1)
        }
    }

    /// Moves the status forward. Returns false, leaving the room untouched,
    /// when `next` is not ahead of the current status.
    pub fn advance_status(&mut self, next: RoomStatus) -> bool {
        if next > self.status {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.expires_at = now.timestamp() + ROOM_TTL_SECS;
    }

    /// Unconsumed lobbies expire once idle past their TTL.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == RoomStatus::Lobby && now.timestamp() > self.expires_at
    }
}
